use crate::error::{FailureReason, IndexError, RecordFailure, SyncError};
use crate::graphql_client::GraphqlClient;
use crate::search_index::SearchIndex;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use rental_common::{ProjectionError, RentableCar, RentableListing};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How upserts of one snapshot are issued. Every strategy converges to the
/// same document set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// One request per listing, awaited in input order.
    Sequential,
    /// A single bulk import request for the whole snapshot.
    Bulk,
    /// One request per listing with at most `max_in_flight` outstanding.
    Concurrent { max_in_flight: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Synced {
        id: String,
        name: String,
    },
    Failed {
        id: String,
        name: String,
        error: String,
        #[serde(skip)]
        failure: RecordFailure,
    },
}

impl RecordOutcome {
    fn failed(failure: RecordFailure) -> Self {
        RecordOutcome::Failed {
            id: failure.id.clone(),
            name: failure.name.clone(),
            error: failure.reason.to_string(),
            failure,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RecordOutcome::Synced { id, .. } | RecordOutcome::Failed { id, .. } => id,
        }
    }
}

/// Result of one synchronizer run, with outcomes in snapshot order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub outcomes: Vec<RecordOutcome>,
    /// Stale ids removed from the index.
    pub deleted: Vec<String>,
    /// Stale ids whose removal failed.
    pub undeleted: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile_error: Option<String>,
    #[serde(skip)]
    reconcile_failure: Option<IndexError>,
}

impl SyncReport {
    pub fn synced_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Synced { .. }))
            .count()
    }

    pub fn failures(&self) -> Vec<&RecordFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RecordOutcome::Failed { failure, .. } => Some(failure),
                RecordOutcome::Synced { .. } => None,
            })
            .collect()
    }

    /// True when every record was synced and reconciliation fully succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures().is_empty() && self.undeleted.is_empty() && self.reconcile_failure.is_none()
    }

    pub fn into_result(self) -> Result<SyncReport, SyncError> {
        let failed: Vec<RecordFailure> = self.failures().into_iter().cloned().collect();
        if !failed.is_empty() || !self.undeleted.is_empty() {
            return Err(SyncError::Incomplete {
                synced: self.synced_count(),
                failed,
                undeleted: self.undeleted,
                reconcile_error: self.reconcile_failure,
            });
        }
        if let Some(err) = self.reconcile_failure {
            return Err(SyncError::Reconcile(err));
        }
        Ok(self)
    }
}

/// One snapshot row on its way into the index.
struct Candidate {
    id: String,
    name: String,
    listing: Result<RentableListing, ProjectionError>,
}

impl Candidate {
    fn from_record(record: &RentableCar) -> Self {
        Self {
            id: record.id.clone(),
            name: record.car.name.clone(),
            listing: RentableListing::try_from(record),
        }
    }

    /// Keeps whatever id and name the row carries, so an undecodable row can
    /// still be named in the report and is not pruned.
    fn from_row(row: &Value) -> Self {
        let text = |pointer: &str| {
            row.pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let listing = serde_json::from_value::<RentableCar>(row.clone())
            .map_err(|e| ProjectionError::Undecodable(e.to_string()))
            .and_then(|record| RentableListing::try_from(&record));
        Self {
            id: text("/id"),
            name: text("/car/name"),
            listing,
        }
    }
}

/// Projects rentable-car snapshots into the search index.
pub struct IndexSynchronizer {
    index: Arc<dyn SearchIndex>,
    strategy: SyncStrategy,
    prune: bool,
}

impl IndexSynchronizer {
    pub fn new(index: Arc<dyn SearchIndex>, strategy: SyncStrategy) -> Self {
        Self {
            index,
            strategy,
            prune: true,
        }
    }

    /// Whether documents missing from the snapshot are deleted after upserting.
    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    /// Upserts every record of one coherent snapshot.
    ///
    /// A failing record does not stop the run and does not undo earlier
    /// upserts; it is reported in the returned outcomes.
    pub async fn sync(&self, records: &[RentableCar]) -> SyncReport {
        let candidates = records.iter().map(Candidate::from_record).collect();
        self.sync_candidates(candidates).await
    }

    /// Same as [`sync`](Self::sync) for rows exactly as the backend returned
    /// them. A row that does not decode fails alone.
    pub async fn sync_rows(&self, rows: &[Value]) -> SyncReport {
        let candidates = rows.iter().map(Candidate::from_row).collect();
        self.sync_candidates(candidates).await
    }

    async fn sync_candidates(&self, candidates: Vec<Candidate>) -> SyncReport {
        // Malformed rows still count as present so a bad update never drops the last good document.
        let snapshot_ids: BTreeSet<String> = candidates.iter().map(|c| c.id.clone()).collect();

        let mut outcomes: Vec<Option<RecordOutcome>> = vec![None; candidates.len()];
        let mut positions = Vec::with_capacity(candidates.len());
        let mut listings = Vec::with_capacity(candidates.len());

        for (pos, candidate) in candidates.into_iter().enumerate() {
            match candidate.listing {
                Ok(listing) => {
                    positions.push(pos);
                    listings.push(listing);
                }
                Err(e) => {
                    outcomes[pos] = Some(RecordOutcome::failed(RecordFailure {
                        id: candidate.id,
                        name: candidate.name,
                        reason: FailureReason::Malformed(e),
                    }));
                }
            }
        }

        let results = self.upsert_all(&listings).await;
        for ((pos, listing), result) in positions.into_iter().zip(listings).zip(results) {
            outcomes[pos] = Some(match result {
                Ok(()) => RecordOutcome::Synced {
                    id: listing.id,
                    name: listing.name,
                },
                Err(e) => RecordOutcome::failed(RecordFailure {
                    id: listing.id,
                    name: listing.name,
                    reason: FailureReason::Index(e),
                }),
            });
        }

        let mut report = SyncReport {
            outcomes: outcomes.into_iter().flatten().collect(),
            ..Default::default()
        };

        for failure in report.failures() {
            tracing::warn!("{}", failure);
        }

        if self.prune {
            self.remove_stale(&snapshot_ids, &mut report).await;
        }

        tracing::info!(
            "Index sync finished: {} synced, {} failed, {} deleted",
            report.synced_count(),
            report.failures().len(),
            report.deleted.len()
        );
        report
    }

    async fn upsert_all(&self, listings: &[RentableListing]) -> Vec<Result<(), IndexError>> {
        match self.strategy {
            SyncStrategy::Sequential => {
                let mut results = Vec::with_capacity(listings.len());
                for listing in listings {
                    results.push(self.index.upsert(listing).await);
                }
                results
            }
            SyncStrategy::Bulk => match self.index.upsert_batch(listings).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!("Bulk import of {} listings failed: {}", listings.len(), e);
                    vec![Err(e); listings.len()]
                }
            },
            SyncStrategy::Concurrent { max_in_flight } => {
                let index = &self.index;
                let pending: Vec<_> = listings
                    .iter()
                    .enumerate()
                    .map(|(pos, listing)| async move { (pos, index.upsert(listing).await) })
                    .collect();
                let mut results: Vec<(usize, Result<(), IndexError>)> =
                    stream::iter(pending)
                        .buffer_unordered(max_in_flight.max(1))
                        .collect()
                        .await;
                results.sort_by_key(|(pos, _)| *pos);
                results.into_iter().map(|(_, r)| r).collect()
            }
        }
    }

    async fn remove_stale(&self, snapshot_ids: &BTreeSet<String>, report: &mut SyncReport) {
        let indexed = match self.index.document_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Skipping stale document cleanup: {}", e);
                report.reconcile_error = Some(e.to_string());
                report.reconcile_failure = Some(e);
                return;
            }
        };

        for id in indexed
            .into_iter()
            .filter(|id| !snapshot_ids.contains(id))
        {
            match self.index.delete(&id).await {
                Ok(()) => {
                    tracing::debug!("Deleted stale listing {}", id);
                    report.deleted.push(id);
                }
                Err(e) => {
                    tracing::warn!("Failed to delete stale listing {}: {}", id, e);
                    report.undeleted.push(id);
                }
            }
        }
    }
}

/// Fetches snapshots from the backend and feeds them to the synchronizer.
pub struct SyncService {
    store: Arc<GraphqlClient>,
    synchronizer: IndexSynchronizer,
    interval: Duration,
    run_lock: Mutex<()>,
}

impl SyncService {
    pub fn new(store: Arc<GraphqlClient>, synchronizer: IndexSynchronizer, interval: Duration) -> Self {
        Self {
            store,
            synchronizer,
            interval,
            run_lock: Mutex::new(()),
        }
    }

    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;
            match self.sync_once().await {
                Ok(report) if report.is_clean() => {}
                Ok(report) => {
                    if let Err(e) = report.into_result() {
                        tracing::error!("{}", e);
                    }
                }
                Err(e) => tracing::error!("Sync failed: {:#}", e),
            }
        }
    }

    /// Fetches one snapshot and syncs it. Fetch errors abort before any
    /// index write; per-record failures are in the report.
    ///
    /// Runs are serialized: a run that fetched an older snapshot must not
    /// prune listings a newer run has just written.
    pub async fn sync_once(&self) -> Result<SyncReport> {
        let _running = self.run_lock.lock().await;
        let rows = self.store.list_rentable_cars().await?;
        tracing::debug!("Syncing snapshot of {} rentable cars", rows.len());
        Ok(self.synchronizer.sync_rows(&rows).await)
    }
}
