//! Parsed run files: raw reads plus per-read instrument metadata.

mod reader;
mod types;

pub use reader::{RunFile, RunFileError};
pub use types::{ReadRecord, RecordMetadata, RunHeader};
