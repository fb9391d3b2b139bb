//! Run file data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run-level attributes from the file's header line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHeader {
    pub run_id: String,
    pub sample_id: String,
    pub flow_cell_id: String,
    /// Wall-clock start of the experiment.
    pub exp_start_time: DateTime<Utc>,
    /// Instrument sampling frequency in Hz.
    pub sampling_rate: f64,
}

/// One raw read: identifier, provenance numbers, and its signal trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRecord {
    pub read_id: String,
    pub channel: u32,
    pub read_number: u32,
    /// Offset of the first sample, in samples since experiment start.
    pub start_sample: u64,
    pub signal: Vec<i16>,
}

impl ReadRecord {
    /// Raw samples in this read's trace.
    pub fn total_samples(&self) -> u64 {
        self.signal.len() as u64
    }
}

/// Typed per-read attributes attached to each output record.
///
/// Built by [`super::RunFile::metadata`] after a called read arrives; every
/// field is required, an unknown read id fails the lookup outright.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMetadata {
    pub run_id: String,
    pub channel: u32,
    pub read_number: u32,
    /// Absolute acquisition start of the read.
    pub start_time: DateTime<Utc>,
    pub sample_id: String,
    pub flow_cell_id: String,
}
