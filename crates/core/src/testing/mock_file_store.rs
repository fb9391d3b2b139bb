//! Mock run file store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::transfer::{RunFileStore, TransferError};

/// One scripted transfer outcome.
#[derive(Debug, Clone)]
pub enum MockTransfer {
    /// Write these bytes to the destination and report success.
    Payload(Vec<u8>),
    /// Fail the attempt with a connection error carrying this message.
    Fail(String),
}

#[derive(Debug, Default)]
struct StoreState {
    /// Scripted outcomes per run id, consumed front to back; the last
    /// entry repeats once the script is exhausted.
    plans: HashMap<u64, Vec<MockTransfer>>,
    /// Download attempts per run id.
    counts: HashMap<u64, u32>,
}

/// Mock implementation of the RunFileStore trait.
///
/// Each run id follows a script of transfer outcomes, so tests can model
/// corruption-then-recovery sequences and hard transfer failures.
///
/// # Example
///
/// ```rust,ignore
/// let store = MockRunFileStore::new();
///
/// // First attempt delivers garbage, second delivers the real payload
/// store.set_plan(42, vec![
///     MockTransfer::Payload(b"corrupt".to_vec()),
///     MockTransfer::Payload(good_bytes),
/// ]).await;
///
/// // ... run the code under test ...
///
/// assert_eq!(store.download_count(42).await, 2);
/// ```
#[derive(Debug)]
pub struct MockRunFileStore {
    state: Arc<RwLock<StoreState>>,
}

impl Default for MockRunFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunFileStore {
    /// Create a new mock store with no scripted runs.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Serve the same payload for every download of `id`.
    pub async fn set_payload(&self, id: u64, bytes: Vec<u8>) {
        self.set_plan(id, vec![MockTransfer::Payload(bytes)]).await;
    }

    /// Script the sequence of outcomes for downloads of `id`.
    ///
    /// Outcomes are consumed in order; once the script runs out, the last
    /// entry repeats for every further attempt.
    pub async fn set_plan(&self, id: u64, plan: Vec<MockTransfer>) {
        self.state.write().await.plans.insert(id, plan);
    }

    /// Number of download attempts made for `id`.
    pub async fn download_count(&self, id: u64) -> u32 {
        self.state.read().await.counts.get(&id).copied().unwrap_or(0)
    }

    /// Total download attempts across all run ids.
    pub async fn total_downloads(&self) -> u32 {
        self.state.read().await.counts.values().sum()
    }
}

#[async_trait]
impl RunFileStore for MockRunFileStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn download(&self, id: u64, destination: &Path) -> Result<u64, TransferError> {
        let outcome = {
            let mut state = self.state.write().await;
            let attempt = state.counts.entry(id).or_insert(0);
            *attempt += 1;
            let index = (*attempt - 1) as usize;

            let plan = state
                .plans
                .get(&id)
                .ok_or(TransferError::Status { status: 404 })?;
            plan.get(index)
                .or_else(|| plan.last())
                .cloned()
                .ok_or(TransferError::Status { status: 404 })?
        };

        match outcome {
            MockTransfer::Payload(bytes) => {
                tokio::fs::write(destination, &bytes)
                    .await
                    .map_err(|source| TransferError::Write { source })?;
                Ok(bytes.len() as u64)
            }
            MockTransfer::Fail(message) => Err(TransferError::Connection(message)),
        }
    }
}
