//! Transfer traits and error types for run file acquisition.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A streamable remote source of raw run files.
///
/// The store offers no range or resume semantics: every download starts
/// from byte zero and either completes or fails as a whole.
#[async_trait]
pub trait RunFileStore: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Streams the run file for `id` into `destination`, returning the
    /// number of bytes written.
    async fn download(&self, id: u64, destination: &Path) -> Result<u64, TransferError>;
}

/// A single transfer attempt failed before the file was fully on disk.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to connect to file store: {0}")]
    Connection(String),

    #[error("transfer timed out: {0}")]
    Timeout(String),

    #[error("file store returned status {status}")]
    Status { status: u16 },

    /// The body stream broke mid-transfer.
    #[error("transfer stream interrupted: {0}")]
    Stream(String),

    #[error("failed to write fetched bytes")]
    Write {
        #[source]
        source: std::io::Error,
    },
}

/// Terminal failure of a verified fetch, after all attempts are spent.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every attempt transferred fully but the digest never matched.
    /// Carries the digest observed on the final attempt.
    #[error(
        "checksum mismatch after {attempts} attempts: expected {expected}, observed {observed}"
    )]
    Integrity {
        expected: String,
        observed: String,
        attempts: u32,
    },

    /// The final attempt failed at the transfer level.
    #[error("transfer failed after {attempts} attempts")]
    TransferExhausted {
        attempts: u32,
        #[source]
        source: TransferError,
    },

    /// The transferred file could not be read back for hashing.
    #[error("failed to hash fetched file {path}")]
    Digest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a successful verified fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Bytes written by the final, verified transfer.
    pub bytes: u64,
    /// Attempts used, counting the successful one.
    pub attempts: u32,
}
