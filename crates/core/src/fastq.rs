//! FASTQ record assembly.
//!
//! Combines a called read with its run file metadata into the four-line
//! FASTQ block used by downstream tooling: an `@` header carrying provenance
//! as `key=value` tokens, the sequence, a literal `+`, and the quality
//! string.

use std::fmt;

use crate::basecaller::CalledRead;
use crate::run_file::{RecordMetadata, RunFile, RunFileError};

/// One enriched output record.
#[derive(Debug, Clone, PartialEq)]
pub struct FastqRecord {
    pub read_id: String,
    pub metadata: RecordMetadata,
    pub sequence: String,
    pub qstring: String,
}

/// Correlates a called read with its source metadata.
///
/// Fails when the peer hands back an id the run file does not know; that
/// means the submitted and collected sets no longer agree and the run must
/// not be written out.
pub fn enrich(called: &CalledRead, run: &RunFile) -> Result<FastqRecord, RunFileError> {
    let metadata = run.metadata(&called.read_id)?;
    Ok(FastqRecord {
        read_id: called.read_id.clone(),
        metadata,
        sequence: called.sequence.clone(),
        qstring: called.qstring.clone(),
    })
}

impl fmt::Display for FastqRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "@{} runid={} ch={} read={} start_time={} sample_id={} flow_cell_id={}",
            self.read_id,
            self.metadata.run_id,
            self.metadata.channel,
            self.metadata.read_number,
            self.metadata.start_time.format("%Y-%m-%dT%H:%M:%SZ"),
            self.metadata.sample_id,
            self.metadata.flow_cell_id,
        )?;
        writeln!(f, "{}", self.sequence)?;
        writeln!(f, "+")?;
        writeln!(f, "{}", self.qstring)
    }
}
