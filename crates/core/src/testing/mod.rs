//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all external service traits,
//! allowing comprehensive E2E testing without a real registry, file store,
//! or basecalling peer.
//!
//! # Example
//!
//! ```rust,ignore
//! use pilotfish_core::testing::{MockBasecaller, MockRunFileStore, MockRunRegistry};
//!
//! let registry = MockRunRegistry::new();
//! let store = MockRunFileStore::new();
//! let basecaller = MockBasecaller::new();
//!
//! // Configure mock responses
//! registry.set_run(descriptor).await;
//! store.set_payload(42, run_file_bytes).await;
//! basecaller.set_call_order(vec!["r-2", "r-1"]).await;
//!
//! // Use in a pipeline or AppState...
//! ```

mod mock_basecaller;
mod mock_file_store;
mod mock_registry;

pub use mock_basecaller::MockBasecaller;
pub use mock_file_store::{MockRunFileStore, MockTransfer};
pub use mock_registry::MockRunRegistry;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{TimeZone, Utc};

    use crate::basecaller::CalledRead;
    use crate::checksum::sha256_bytes;
    use crate::registry::RunDescriptor;
    use crate::run_file::{ReadRecord, RunHeader};

    /// Create a test run header with a fixed start time and 4 kHz sampling.
    pub fn run_header(run_id: &str) -> RunHeader {
        RunHeader {
            run_id: run_id.to_string(),
            sample_id: "lambda-01".to_string(),
            flow_cell_id: "FAK12345".to_string(),
            exp_start_time: Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap(),
            sampling_rate: 4000.0,
        }
    }

    /// Create a test read with a deterministic signal trace.
    pub fn read_record(read_id: &str, channel: u32, read_number: u32, samples: usize) -> ReadRecord {
        ReadRecord {
            read_id: read_id.to_string(),
            channel,
            read_number,
            start_sample: 0,
            signal: (0..samples)
                .map(|i| ((i as i32 * 7) % 201 - 100) as i16)
                .collect(),
        }
    }

    /// Serialize a header and reads into run file format.
    pub fn run_file_document(header: &RunHeader, reads: &[ReadRecord]) -> String {
        let mut document = serde_json::to_string(header).expect("header serializes");
        document.push('\n');
        for read in reads {
            document.push_str(&serde_json::to_string(read).expect("read serializes"));
            document.push('\n');
        }
        document
    }

    /// Create a registry descriptor whose digest matches `content`.
    pub fn descriptor(id: u64, filename: &str, content: &str) -> RunDescriptor {
        RunDescriptor {
            id,
            filename: filename.to_string(),
            sha256: sha256_bytes(content.as_bytes()),
        }
    }

    /// Create a called read with a quality string matching the sequence.
    pub fn called_read(read_id: &str, sequence: &str) -> CalledRead {
        CalledRead {
            read_id: read_id.to_string(),
            sequence: sequence.to_string(),
            qstring: "I".repeat(sequence.len()),
            trimmed_samples: 0,
        }
    }
}
