//! Types for basecaller sessions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::run_file::ReadRecord;

/// Errors that can occur across a basecall session's lifetime.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to reach basecaller: {0}")]
    Unreachable(String),

    #[error("basecaller rejected the session: {0}")]
    Rejected(String),

    /// The peer sent something outside the session protocol.
    #[error("basecaller protocol violation: {0}")]
    Protocol(String),

    #[error("basecaller connection closed unexpectedly")]
    ConnectionClosed,

    #[error("session is closed")]
    Closed,

    #[error("session I/O failed")]
    Io(#[from] std::io::Error),
}

/// One basecalled read returned by the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalledRead {
    pub read_id: String,
    /// Called nucleotide sequence.
    pub sequence: String,
    /// Per-base quality string, same length as `sequence`.
    pub qstring: String,
    /// Raw samples the caller trimmed from the trace.
    pub trimmed_samples: u64,
}

/// Opens sessions against a basecalling backend.
#[async_trait]
pub trait Basecaller: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Establishes a new exclusively-owned session.
    async fn open_session(&self) -> Result<Box<dyn BasecallSession>, SessionError>;
}

/// An open session with the basecalling peer.
///
/// Lifecycle: submit any number of reads, poll `collect` until as many
/// results have arrived as reads were submitted, then `close` exactly once.
/// The peer may start returning results while submissions are still in
/// flight; results arrive in whatever order the peer finishes them.
#[async_trait]
pub trait BasecallSession: Send {
    /// Sends one read to the peer.
    async fn submit(&mut self, read: &ReadRecord) -> Result<(), SessionError>;

    /// Waits briefly for the next result. `None` means nothing has arrived
    /// yet, never end-of-stream.
    async fn collect(&mut self) -> Result<Option<CalledRead>, SessionError>;

    /// Shuts the session down. Further calls fail with
    /// [`SessionError::Closed`].
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Connection settings for the TCP basecaller backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasecallerConfig {
    pub host: String,
    pub port: u16,

    /// Named model profile requested at session open.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// How long one collect poll waits before reporting nothing, in ms.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Results buffered between the connection reader and collect callers.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Seconds allowed for connect plus handshake.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_profile() -> String {
    "dna_r9.4.1_450bps_hac".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_queue_depth() -> usize {
    512
}

fn default_connect_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basecaller_config_defaults() {
        let config: BasecallerConfig = toml::from_str(
            r#"
            host = "127.0.0.1"
            port = 5555
            "#,
        )
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5555);
        assert_eq!(config.profile, "dna_r9.4.1_450bps_hac");
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.queue_depth, 512);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_called_read_serde_round_trip() {
        let called = CalledRead {
            read_id: "r-1".to_string(),
            sequence: "ACGT".to_string(),
            qstring: "!!);".to_string(),
            trimmed_samples: 120,
        };

        let json = serde_json::to_string(&called).unwrap();
        let back: CalledRead = serde_json::from_str(&json).unwrap();
        assert_eq!(back, called);
    }

    #[test]
    fn test_session_error_messages() {
        assert!(SessionError::Rejected("unknown profile".to_string())
            .to_string()
            .contains("unknown profile"));
        assert_eq!(SessionError::Closed.to_string(), "session is closed");
    }
}
