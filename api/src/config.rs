use crate::sync_service::SyncStrategy;
use anyhow::{bail, Context, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_TYPESENSE_URL: &str = "http://localhost:8108";
const DEFAULT_COLLECTION: &str = "rentable_cars";
const DEFAULT_SYNC_CONCURRENCY: usize = 8;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBackend {
    Typesense,
    Memory,
}

impl FromStr for IndexBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typesense" => Ok(IndexBackend::Typesense),
            "memory" => Ok(IndexBackend::Memory),
            other => Err(format!(
                "unknown index backend '{}' (expected typesense or memory)",
                other
            )),
        }
    }
}

/// How the GraphQL client authenticates against the backend.
#[derive(Clone, PartialEq)]
pub enum Credentials {
    Anonymous,
    Token(String),
    Login { email: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::Token(_) => write!(f, "Token(<redacted>)"),
            Credentials::Login { email, .. } => f
                .debug_struct("Login")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct TypesenseConfig {
    pub url: String,
    pub api_key: String,
    pub collection: String,
}

impl fmt::Debug for TypesenseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypesenseConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("collection", &self.collection)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub graphql_url: String,
    pub credentials: Credentials,
    pub backend: IndexBackend,
    /// Present only for the typesense backend.
    pub typesense: Option<TypesenseConfig>,
    pub sync_strategy: SyncStrategy,
    pub sync_prune: bool,
    pub sync_interval: Duration,
    pub port: u16,
}

impl Config {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let graphql_url = var("GRAPHQL_URL").context("GRAPHQL_URL not set")?;

        let credentials = match (var("ADMIN_TOKEN"), var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(token), _, _) => Credentials::Token(token),
            (None, Some(email), Some(password)) => Credentials::Login { email, password },
            (None, Some(_), None) => bail!("ADMIN_PASSWORD must be set together with ADMIN_EMAIL"),
            (None, None, Some(_)) => bail!("ADMIN_EMAIL must be set together with ADMIN_PASSWORD"),
            (None, None, None) => Credentials::Anonymous,
        };

        let backend = parse_or(var("INDEX_BACKEND"), "INDEX_BACKEND", IndexBackend::Typesense)?;

        let typesense = match backend {
            IndexBackend::Typesense => Some(TypesenseConfig {
                url: var("TYPESENSE_URL")
                    .unwrap_or_else(|| DEFAULT_TYPESENSE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                api_key: var("TYPESENSE_API_KEY").context("TYPESENSE_API_KEY not set")?,
                collection: var("TYPESENSE_COLLECTION")
                    .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            }),
            IndexBackend::Memory => None,
        };

        let concurrency: usize = parse_or(
            var("SYNC_CONCURRENCY"),
            "SYNC_CONCURRENCY",
            DEFAULT_SYNC_CONCURRENCY,
        )?;
        if concurrency == 0 {
            bail!("SYNC_CONCURRENCY must be at least 1");
        }
        let sync_strategy = match var("SYNC_STRATEGY")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("sequential") => SyncStrategy::Sequential,
            Some("bulk") => SyncStrategy::Bulk,
            Some("concurrent") => SyncStrategy::Concurrent {
                max_in_flight: concurrency,
            },
            Some(other) => bail!(
                "SYNC_STRATEGY must be sequential, bulk or concurrent, got '{}'",
                other
            ),
        };

        let sync_prune = parse_or(var("SYNC_PRUNE"), "SYNC_PRUNE", true)?;
        let interval_secs: u64 = parse_or(
            var("SYNC_INTERVAL_SECS"),
            "SYNC_INTERVAL_SECS",
            DEFAULT_SYNC_INTERVAL_SECS,
        )?;
        if interval_secs == 0 {
            bail!("SYNC_INTERVAL_SECS must be greater than zero");
        }
        let port = parse_or(var("PORT"), "PORT", DEFAULT_PORT)?;

        Ok(Config {
            graphql_url,
            credentials,
            backend,
            typesense,
            sync_strategy,
            sync_prune,
            sync_interval: Duration::from_secs(interval_secs),
            port,
        })
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", name, value, e)),
    }
}
