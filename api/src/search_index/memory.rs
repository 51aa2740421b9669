use super::SearchIndex;
use crate::error::IndexError;
use crate::search::SearchParams;
use async_trait::async_trait;
use rental_common::RentableListing;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

/// Process-local index used for development runs and as the reference model
/// in tests.
///
/// Ranking: every query token must occur (case-insensitive substring) in at
/// least one `query_by` field. Each token scores the weight of the first
/// field it hits, earlier fields weighing more. Ties break on ascending id,
/// so the order is total and stable across calls.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    documents: RwLock<BTreeMap<String, RentableListing>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<RentableListing> {
        self.read().get(id).cloned()
    }

    /// Snapshot of every stored document, ordered by id.
    pub fn documents(&self) -> Vec<RentableListing> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, RentableListing>> {
        // A poisoned lock only means a writer panicked mid-insert; the map itself is intact.
        self.documents.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, RentableListing>> {
        self.documents.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn text_field<'a>(listing: &'a RentableListing, field: &str) -> Option<&'a str> {
    match field {
        "name" => Some(&listing.name),
        "manufacturer" => Some(&listing.manufacturer),
        "type" => Some(&listing.car_type),
        "transmissionType" => Some(&listing.transmission_type),
        "fuelType" => Some(&listing.fuel_type),
        "description" => Some(&listing.description),
        _ => None,
    }
}

/// Score of `listing` for `tokens`, or `None` when some token matches nothing.
fn text_score(listing: &RentableListing, tokens: &[String], query_by: &[&str]) -> Option<usize> {
    let fields: Vec<String> = query_by
        .iter()
        .map(|f| text_field(listing, f).unwrap_or_default().to_lowercase())
        .collect();

    let mut score = 0;
    for token in tokens {
        let hit = fields.iter().position(|value| value.contains(token.as_str()))?;
        score += query_by.len() - hit;
    }
    Some(score)
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    async fn upsert(&self, listing: &RentableListing) -> Result<(), IndexError> {
        self.write().insert(listing.id.clone(), listing.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), IndexError> {
        self.write().remove(id);
        Ok(())
    }

    async fn document_ids(&self) -> Result<BTreeSet<String>, IndexError> {
        Ok(self.read().keys().cloned().collect())
    }

    async fn search(&self, params: &SearchParams) -> Result<Vec<RentableListing>, IndexError> {
        let tokens: Vec<String> = params
            .text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let documents = self.read();
        let mut scored: Vec<(usize, &RentableListing)> = documents
            .values()
            .filter(|listing| params.matches_filters(listing))
            .filter_map(|listing| {
                text_score(listing, &tokens, params.query_by).map(|score| (score, listing))
            })
            .collect();

        // BTreeMap iteration is already id-ascending; a stable sort keeps that as the tie-break.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().map(|(_, l)| l.clone()).collect())
    }
}
