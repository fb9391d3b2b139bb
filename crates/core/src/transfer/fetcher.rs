//! Checksum-verified, retry-bounded run file acquisition.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::types::{FetchError, FetchReport, RunFileStore, TransferError};
use crate::checksum::{self, DEFAULT_BUFFER_SIZE};
use crate::metrics::{FETCH_ATTEMPTS_TOTAL, FETCH_DURATION_SECONDS, FETCH_FAILURES_TOTAL};

/// Tunables for a verified fetch.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Retries allowed after the first attempt; the fetcher makes exactly
    /// `max_retries + 1` attempts before giving up.
    pub max_retries: u32,
    /// Chunk size for digest computation.
    pub buffer_size: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Downloads a run file and verifies its SHA-256 against the registry's
/// expected digest, re-transferring from scratch on any failure.
///
/// Both checksum mismatches and transfer-level failures count toward the
/// same attempt bound. On success exactly one verified file exists at the
/// destination; on exhaustion no file is left behind.
pub struct VerifiedFetcher {
    store: Arc<dyn RunFileStore>,
    policy: FetchPolicy,
}

impl VerifiedFetcher {
    pub fn new(store: Arc<dyn RunFileStore>, policy: FetchPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn fetch(
        &self,
        id: u64,
        expected_sha256: &str,
        destination: &Path,
    ) -> Result<FetchReport, FetchError> {
        let start = Instant::now();
        let result = self.fetch_inner(id, expected_sha256, destination).await;

        let label = if result.is_ok() { "success" } else { "failed" };
        FETCH_DURATION_SECONDS
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn fetch_inner(
        &self,
        id: u64,
        expected_sha256: &str,
        destination: &Path,
    ) -> Result<FetchReport, FetchError> {
        let max_attempts = self.policy.max_retries + 1;
        let mut last_observed: Option<String> = None;
        let mut last_transfer: Option<TransferError> = None;

        for attempt in 1..=max_attempts {
            FETCH_ATTEMPTS_TOTAL.inc();

            match self.store.download(id, destination).await {
                Ok(bytes) => {
                    let observed = checksum::sha256_file(destination, self.policy.buffer_size)
                        .await
                        .map_err(|source| FetchError::Digest {
                            path: destination.to_path_buf(),
                            source,
                        })?;

                    if observed == expected_sha256 {
                        debug!(id, attempt, bytes, "run file verified");
                        return Ok(FetchReport { bytes, attempts: attempt });
                    }

                    warn!(
                        id,
                        attempt,
                        max_attempts,
                        expected = expected_sha256,
                        %observed,
                        "checksum mismatch, discarding transfer"
                    );
                    FETCH_FAILURES_TOTAL.with_label_values(&["integrity"]).inc();
                    last_observed = Some(observed);
                    last_transfer = None;
                }
                Err(e) => {
                    warn!(id, attempt, max_attempts, error = %e, "transfer attempt failed");
                    FETCH_FAILURES_TOTAL.with_label_values(&["transfer"]).inc();
                    last_transfer = Some(e);
                }
            }

            discard(destination).await;
        }

        // The error reflects how the final attempt failed.
        match last_transfer {
            Some(source) => Err(FetchError::TransferExhausted {
                attempts: max_attempts,
                source,
            }),
            None => Err(FetchError::Integrity {
                expected: expected_sha256.to_string(),
                observed: last_observed.unwrap_or_default(),
                attempts: max_attempts,
            }),
        }
    }
}

/// Best-effort removal of a partial or rejected transfer.
async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove discarded transfer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::sha256_bytes;
    use crate::testing::{MockRunFileStore, MockTransfer};
    use tempfile::TempDir;

    fn policy(max_retries: u32) -> FetchPolicy {
        FetchPolicy {
            max_retries,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("run1.dat");
        let payload = b"good signal data".to_vec();
        let expected = sha256_bytes(&payload);

        let store = Arc::new(MockRunFileStore::new());
        store.set_payload(42, payload.clone()).await;

        let fetcher = VerifiedFetcher::new(Arc::clone(&store) as Arc<dyn RunFileStore>, policy(3));
        let report = fetcher.fetch(42, &expected, &dest).await.unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(report.bytes, payload.len() as u64);
        assert_eq!(store.download_count(42).await, 1);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_corrupt_then_good_succeeds_on_second_attempt() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("run1.dat");
        let payload = b"good signal data".to_vec();
        let expected = sha256_bytes(&payload);

        let store = Arc::new(MockRunFileStore::new());
        store
            .set_plan(
                42,
                vec![
                    MockTransfer::Payload(b"corrupted bytes".to_vec()),
                    MockTransfer::Payload(payload.clone()),
                ],
            )
            .await;

        let fetcher = VerifiedFetcher::new(Arc::clone(&store) as Arc<dyn RunFileStore>, policy(3));
        let report = fetcher.fetch(42, &expected, &dest).await.unwrap();

        assert_eq!(report.attempts, 2);
        assert_eq!(store.download_count(42).await, 2);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_always_corrupt_exhausts_exact_attempt_bound() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("run1.dat");
        let corrupt = b"never matches".to_vec();
        let expected = sha256_bytes(b"what we wanted");

        let store = Arc::new(MockRunFileStore::new());
        store.set_payload(42, corrupt.clone()).await;

        let fetcher = VerifiedFetcher::new(Arc::clone(&store) as Arc<dyn RunFileStore>, policy(3));
        let err = fetcher.fetch(42, &expected, &dest).await.unwrap_err();

        // max_retries = 3 means exactly 4 transfers
        assert_eq!(store.download_count(42).await, 4);
        match err {
            FetchError::Integrity {
                expected: e,
                observed,
                attempts,
            } => {
                assert_eq!(e, expected);
                assert_eq!(observed, sha256_bytes(&corrupt));
                assert_eq!(attempts, 4);
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
        // No partial file left after exhaustion
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("run1.dat");

        let store = Arc::new(MockRunFileStore::new());
        store.set_payload(42, b"corrupt".to_vec()).await;

        let fetcher = VerifiedFetcher::new(Arc::clone(&store) as Arc<dyn RunFileStore>, policy(0));
        let err = fetcher
            .fetch(42, &sha256_bytes(b"other"), &dest)
            .await
            .unwrap_err();

        assert_eq!(store.download_count(42).await, 1);
        assert!(matches!(err, FetchError::Integrity { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_transfer_failures_count_toward_bound() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("run1.dat");
        let payload = b"good signal data".to_vec();
        let expected = sha256_bytes(&payload);

        let store = Arc::new(MockRunFileStore::new());
        store
            .set_plan(
                42,
                vec![
                    MockTransfer::Fail("connection reset".to_string()),
                    MockTransfer::Payload(b"corrupt".to_vec()),
                    MockTransfer::Payload(payload.clone()),
                ],
            )
            .await;

        let fetcher = VerifiedFetcher::new(Arc::clone(&store) as Arc<dyn RunFileStore>, policy(3));
        let report = fetcher.fetch(42, &expected, &dest).await.unwrap();

        // One failed transfer + one mismatch + one success
        assert_eq!(report.attempts, 3);
        assert_eq!(store.download_count(42).await, 3);
    }

    #[tokio::test]
    async fn test_always_failing_transfer_surfaces_last_error() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("run1.dat");

        let store = Arc::new(MockRunFileStore::new());
        store
            .set_plan(42, vec![MockTransfer::Fail("connection reset".to_string())])
            .await;

        let fetcher = VerifiedFetcher::new(Arc::clone(&store) as Arc<dyn RunFileStore>, policy(1));
        let err = fetcher
            .fetch(42, &sha256_bytes(b"x"), &dest)
            .await
            .unwrap_err();

        assert_eq!(store.download_count(42).await, 2);
        match err {
            FetchError::TransferExhausted { attempts, source } => {
                assert_eq!(attempts, 2);
                assert!(source.to_string().contains("connection reset"));
            }
            other => panic!("expected transfer exhaustion, got {other:?}"),
        }
        assert!(!dest.exists());
    }
}
