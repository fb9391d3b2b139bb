//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::checksum::DEFAULT_BUFFER_SIZE;

/// Tunables for pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory receiving finalized FASTQ artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Parent directory for the scoped per-run workspaces.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Retries allowed after the first fetch attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Chunk size for hashing and artifact copies.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Seconds without any collected result before a drain is abandoned.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./fastq")
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_max_retries() -> u32 {
    3
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_drain_timeout_secs() -> u64 {
    60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            work_dir: default_work_dir(),
            max_retries: default_max_retries(),
            buffer_size: default_buffer_size(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}
