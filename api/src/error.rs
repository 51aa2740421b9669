use rental_common::ProjectionError;
use std::fmt;

/// Failure reported by a search index backend.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexError {
    /// The service could not be reached.
    Transport(String),
    /// The service answered with a non-success status.
    Api { status: u16, body: String },
    /// The response body could not be decoded.
    Decode(String),
    /// The service refused one document of a batch.
    Rejected { id: String, reason: String },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Transport(msg) => write!(f, "Index unreachable: {}", msg),
            IndexError::Api { status, body } => write!(f, "Index API error {}: {}", status, body),
            IndexError::Decode(msg) => write!(f, "Failed to decode index response: {}", msg),
            IndexError::Rejected { id, reason } => {
                write!(f, "Index rejected document {}: {}", id, reason)
            }
        }
    }
}

impl std::error::Error for IndexError {}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IndexError::Decode(err.to_string())
        } else {
            IndexError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Decode(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    Malformed(ProjectionError),
    Index(IndexError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Malformed(err) => write!(f, "malformed record: {}", err),
            FailureReason::Index(err) => write!(f, "{}", err),
        }
    }
}

/// One listing that did not make it into the index.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub id: String,
    pub name: String,
    pub reason: FailureReason,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to index listing {} ({}): {}",
            self.name, self.id, self.reason
        )
    }
}

impl std::error::Error for RecordFailure {}

/// Aggregate outcome of a synchronizer run that did not fully succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    Incomplete {
        synced: usize,
        failed: Vec<RecordFailure>,
        /// Stale ids whose deletion failed.
        undeleted: Vec<String>,
        /// Set when listing the index for stale documents failed as well.
        reconcile_error: Option<IndexError>,
    },
    /// The stale-document check itself failed; upserts may have succeeded.
    Reconcile(IndexError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Incomplete {
                synced,
                failed,
                undeleted,
                reconcile_error,
            } => {
                write!(f, "Sync incomplete: {} synced, {} failed", synced, failed.len())?;
                if !failed.is_empty() {
                    let culprits: Vec<String> = failed
                        .iter()
                        .map(|r| format!("{} ({})", r.name, r.id))
                        .collect();
                    write!(f, " [{}]", culprits.join(", "))?;
                }
                if !undeleted.is_empty() {
                    write!(f, "; stale documents not deleted: {}", undeleted.join(", "))?;
                }
                if let Some(err) = reconcile_error {
                    write!(f, "; stale document check failed: {}", err)?;
                }
                Ok(())
            }
            SyncError::Reconcile(err) => write!(f, "Failed to reconcile stale documents: {}", err),
        }
    }
}

impl std::error::Error for SyncError {}

/// Search could not be answered; no partial results are returned.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFailure(pub IndexError);

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Search failed: {}", self.0)
    }
}

impl std::error::Error for QueryFailure {}

impl From<IndexError> for QueryFailure {
    fn from(err: IndexError) -> Self {
        QueryFailure(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_names_culprits() {
        let err = SyncError::Incomplete {
            synced: 2,
            failed: vec![RecordFailure {
                id: "B".to_string(),
                name: "Accord".to_string(),
                reason: FailureReason::Index(IndexError::Api {
                    status: 500,
                    body: "boom".to_string(),
                }),
            }],
            undeleted: vec![],
            reconcile_error: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("2 synced, 1 failed"));
        assert!(msg.contains("Accord (B)"));
        assert!(!msg.contains("stale document check"));
    }

    #[test]
    fn test_incomplete_sync_keeps_reconcile_error() {
        let err = SyncError::Incomplete {
            synced: 0,
            failed: vec![RecordFailure {
                id: "A".to_string(),
                name: "Civic".to_string(),
                reason: FailureReason::Malformed(ProjectionError::EmptyId),
            }],
            undeleted: vec![],
            reconcile_error: Some(IndexError::Transport("timeout".to_string())),
        };
        assert!(err
            .to_string()
            .ends_with("; stale document check failed: Index unreachable: timeout"));
    }

    #[test]
    fn test_record_failure_display() {
        let failure = RecordFailure {
            id: "A".to_string(),
            name: "Civic".to_string(),
            reason: FailureReason::Malformed(ProjectionError::InvalidPrice(-1.0)),
        };
        assert_eq!(
            failure.to_string(),
            "Failed to index listing Civic (A): malformed record: pricePerDay must be a positive number, got -1"
        );
    }

    #[test]
    fn test_query_failure_wraps_index_error() {
        let failure: QueryFailure = IndexError::Transport("connection refused".to_string()).into();
        assert_eq!(
            failure.to_string(),
            "Search failed: Index unreachable: connection refused"
        );
    }
}
