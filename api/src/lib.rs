pub mod config;
pub mod error;
pub mod graphql_client;
pub mod http;
pub mod search;
pub mod search_index;
pub mod sync_service;

use anyhow::Result;
use config::{Config, IndexBackend};
use search_index::{InMemoryIndex, SearchIndex, TypesenseIndex};
use std::sync::Arc;

/// Builds the configured index backend, creating the Typesense collection
/// when it does not exist yet.
pub async fn connect_index(config: &Config) -> Result<Arc<dyn SearchIndex>> {
    match (config.backend, &config.typesense) {
        (IndexBackend::Typesense, Some(ts)) => {
            let index = TypesenseIndex::from_config(ts);
            index
                .ensure_collection()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to prepare collection {}: {}", ts.collection, e))?;
            tracing::info!("Using Typesense collection {} at {}", ts.collection, ts.url);
            Ok(Arc::new(index))
        }
        (IndexBackend::Typesense, None) => anyhow::bail!("Typesense backend selected without settings"),
        (IndexBackend::Memory, _) => {
            tracing::warn!("Using in-memory index; documents are lost on exit");
            Ok(Arc::new(InMemoryIndex::new()))
        }
    }
}
