//! Mock run registry for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::registry::{RegistryError, RunDescriptor, RunRegistry};

/// Mock implementation of the RunRegistry trait.
///
/// Serves descriptors from an in-memory map and records every lookup, so
/// tests can assert that failing requests never reach the registry.
///
/// # Example
///
/// ```rust,ignore
/// let registry = MockRunRegistry::new();
/// registry.set_run(RunDescriptor {
///     id: 42,
///     filename: "run42.dat".to_string(),
///     sha256: digest,
/// }).await;
///
/// // ids without an entry resolve to NotFound
/// assert!(registry.lookup(7).await.is_err());
/// assert_eq!(registry.lookups().await, vec![7]);
/// ```
#[derive(Debug)]
pub struct MockRunRegistry {
    runs: Arc<RwLock<HashMap<u64, RunDescriptor>>>,
    /// If set, the next lookup fails with this error.
    next_error: Arc<RwLock<Option<RegistryError>>>,
    /// Recorded lookup ids, in call order.
    lookups: Arc<RwLock<Vec<u64>>>,
}

impl Default for MockRunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunRegistry {
    /// Create a new mock registry with no runs.
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            lookups: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a run descriptor.
    pub async fn set_run(&self, descriptor: RunDescriptor) {
        self.runs.write().await.insert(descriptor.id, descriptor);
    }

    /// Configure the next lookup to fail with the given error.
    pub async fn set_next_error(&self, error: RegistryError) {
        *self.next_error.write().await = Some(error);
    }

    /// All lookup ids seen so far, in call order.
    pub async fn lookups(&self) -> Vec<u64> {
        self.lookups.read().await.clone()
    }

    /// Number of lookups made.
    pub async fn lookup_count(&self) -> usize {
        self.lookups.read().await.len()
    }
}

#[async_trait]
impl RunRegistry for MockRunRegistry {
    fn name(&self) -> &str {
        "mock"
    }

    async fn lookup(&self, id: u64) -> Result<RunDescriptor, RegistryError> {
        self.lookups.write().await.push(id);

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        self.runs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }
}
