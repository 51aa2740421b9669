mod memory;
mod typesense;

pub use memory::InMemoryIndex;
pub use typesense::TypesenseIndex;

use crate::error::IndexError;
use crate::search::SearchParams;
use async_trait::async_trait;
use rental_common::RentableListing;
use std::collections::BTreeSet;

/// Document store holding one [`RentableListing`] per id.
///
/// Writes are insert-or-replace keyed by `id`; a write never merges with the
/// previous document.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, listing: &RentableListing) -> Result<(), IndexError>;

    /// Writes several listings in one request.
    ///
    /// The outer error means the request as a whole failed. Otherwise the
    /// result holds one outcome per input listing, in input order.
    async fn upsert_batch(
        &self,
        listings: &[RentableListing],
    ) -> Result<Vec<Result<(), IndexError>>, IndexError> {
        let mut outcomes = Vec::with_capacity(listings.len());
        for listing in listings {
            outcomes.push(self.upsert(listing).await);
        }
        Ok(outcomes)
    }

    /// Removes a document. Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<(), IndexError>;

    async fn document_ids(&self) -> Result<BTreeSet<String>, IndexError>;

    /// All matching documents, ordered by the backend's ranking.
    async fn search(&self, params: &SearchParams) -> Result<Vec<RentableListing>, IndexError>;
}
