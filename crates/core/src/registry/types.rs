//! Run registry trait and data types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata the registry holds for one sequencing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDescriptor {
    pub id: u64,
    pub filename: String,
    /// Expected SHA-256 of the run file, lowercase hex.
    pub sha256: String,
}

/// Errors returned by registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry has no entry for the requested run.
    #[error("run {0} not found in registry")]
    NotFound(u64),

    /// The entry exists but lacks a field required for fetching.
    #[error("registry entry for run {id} is unusable: {reason}")]
    Incomplete { id: u64, reason: String },

    #[error("registry request timed out: {0}")]
    Timeout(String),

    #[error("failed to connect to registry: {0}")]
    Connection(String),

    #[error("unexpected registry response: {0}")]
    Api(String),
}

impl RegistryError {
    /// True for the not-found class of failures (missing entry or fields),
    /// which callers surface as 404 rather than 5xx.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::NotFound(_) | RegistryError::Incomplete { .. }
        )
    }
}

/// Resolves opaque run identifiers to fetchable file metadata.
#[async_trait]
pub trait RunRegistry: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Looks up the descriptor for a run id.
    async fn lookup(&self, id: u64) -> Result<RunDescriptor, RegistryError>;
}

/// Connection settings for the HTTP run registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the registry service, e.g. "http://tracker:9000".
    pub url: String,

    /// Optional bearer token sent with every registry request.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}
