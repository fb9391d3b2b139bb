//! Run file parsing and per-read metadata lookup.
//!
//! A run file is line-oriented JSON: the first line is the [`RunHeader`],
//! every following non-blank line is one [`ReadRecord`]. The whole file is
//! parsed up front and indexed by read id so results streaming back from the
//! basecaller can be correlated in constant time.

use chrono::Duration;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::types::{ReadRecord, RecordMetadata, RunHeader};

#[derive(Debug, Error)]
pub enum RunFileError {
    #[error("failed to read run file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run file {path} is empty")]
    Empty { path: PathBuf },

    #[error("malformed run header: {reason}")]
    MalformedHeader { reason: String },

    #[error("malformed read record on line {line}: {reason}")]
    MalformedRead { line: usize, reason: String },

    #[error("duplicate read id {read_id} on line {line}")]
    DuplicateReadId { read_id: String, line: usize },

    #[error("read {0} not present in run file")]
    ReadNotFound(String),

    #[error("sampling rate must be positive, got {0}")]
    InvalidSamplingRate(f64),
}

/// A fully parsed run file, indexed by read id.
pub struct RunFile {
    header: RunHeader,
    reads: Vec<ReadRecord>,
    by_id: HashMap<String, usize>,
}

impl RunFile {
    /// Opens and parses a run file.
    pub async fn open(path: &Path) -> Result<Self, RunFileError> {
        let io_err = |source| RunFileError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).await.map_err(io_err)?;
        let mut lines = BufReader::new(file).lines();

        let header_line = lines
            .next_line()
            .await
            .map_err(io_err)?
            .ok_or_else(|| RunFileError::Empty {
                path: path.to_path_buf(),
            })?;

        let header: RunHeader =
            serde_json::from_str(&header_line).map_err(|e| RunFileError::MalformedHeader {
                reason: e.to_string(),
            })?;

        if header.sampling_rate <= 0.0 {
            return Err(RunFileError::InvalidSamplingRate(header.sampling_rate));
        }

        let mut reads = Vec::new();
        let mut by_id = HashMap::new();
        let mut line_number = 1usize;

        while let Some(line) = lines.next_line().await.map_err(io_err)? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let read: ReadRecord =
                serde_json::from_str(&line).map_err(|e| RunFileError::MalformedRead {
                    line: line_number,
                    reason: e.to_string(),
                })?;

            if by_id.contains_key(&read.read_id) {
                return Err(RunFileError::DuplicateReadId {
                    read_id: read.read_id,
                    line: line_number,
                });
            }

            by_id.insert(read.read_id.clone(), reads.len());
            reads.push(read);
        }

        Ok(Self {
            header,
            reads,
            by_id,
        })
    }

    pub fn header(&self) -> &RunHeader {
        &self.header
    }

    pub fn reads(&self) -> &[ReadRecord] {
        &self.reads
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub fn get(&self, read_id: &str) -> Option<&ReadRecord> {
        self.by_id.get(read_id).map(|&idx| &self.reads[idx])
    }

    /// Builds the typed metadata for one read.
    ///
    /// The read's absolute start time is the experiment start plus its
    /// sample offset divided by the sampling frequency. Unknown ids fail
    /// immediately with [`RunFileError::ReadNotFound`].
    pub fn metadata(&self, read_id: &str) -> Result<RecordMetadata, RunFileError> {
        let read = self
            .get(read_id)
            .ok_or_else(|| RunFileError::ReadNotFound(read_id.to_string()))?;

        let offset_ms =
            (read.start_sample as f64 / self.header.sampling_rate * 1000.0).round() as i64;

        Ok(RecordMetadata {
            run_id: self.header.run_id.clone(),
            channel: read.channel,
            read_number: read.read_number,
            start_time: self.header.exp_start_time + Duration::milliseconds(offset_ms),
            sample_id: self.header.sample_id.clone(),
            flow_cell_id: self.header.flow_cell_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;
    use tokio::fs;

    const HEADER: &str = r#"{"run_id":"run-1","sample_id":"s-1","flow_cell_id":"FAK12345","exp_start_time":"2023-05-01T10:00:00Z","sampling_rate":4000.0}"#;

    async fn write_run_file(dir: &TempDir, lines: &[&str]) -> PathBuf {
        let path = dir.path().join("run.jsonl");
        fs::write(&path, lines.join("\n")).await.unwrap();
        path
    }

    fn read_line(read_id: &str, start_sample: u64) -> String {
        format!(
            r#"{{"read_id":"{read_id}","channel":126,"read_number":1207,"start_sample":{start_sample},"signal":[1,2,3,4]}}"#
        )
    }

    #[tokio::test]
    async fn test_open_parses_header_and_reads() {
        let temp = TempDir::new().unwrap();
        let path = write_run_file(
            &temp,
            &[HEADER, &read_line("r-1", 0), &read_line("r-2", 8000)],
        )
        .await;

        let run = RunFile::open(&path).await.unwrap();
        assert_eq!(run.header().run_id, "run-1");
        assert_eq!(run.len(), 2);
        assert_eq!(run.get("r-2").unwrap().start_sample, 8000);
        assert!(run.get("r-3").is_none());
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let temp = TempDir::new().unwrap();
        let path = write_run_file(&temp, &[HEADER, &read_line("r-1", 0), "", ""]).await;

        let run = RunFile::open(&path).await.unwrap();
        assert_eq!(run.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_run_file(&temp, &[]).await;

        let err = RunFile::open(&path).await.unwrap_err();
        assert!(matches!(err, RunFileError::Empty { .. }));
    }

    #[tokio::test]
    async fn test_malformed_header_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_run_file(&temp, &["{not json", &read_line("r-1", 0)]).await;

        let err = RunFile::open(&path).await.unwrap_err();
        assert!(matches!(err, RunFileError::MalformedHeader { .. }));
    }

    #[tokio::test]
    async fn test_malformed_read_reports_line_number() {
        let temp = TempDir::new().unwrap();
        let path = write_run_file(&temp, &[HEADER, &read_line("r-1", 0), "{broken"]).await;

        let err = RunFile::open(&path).await.unwrap_err();
        match err {
            RunFileError::MalformedRead { line, .. } => assert_eq!(line, 3),
            other => panic!("expected malformed read, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_read_id_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_run_file(
            &temp,
            &[HEADER, &read_line("r-1", 0), &read_line("r-1", 100)],
        )
        .await;

        let err = RunFile::open(&path).await.unwrap_err();
        match err {
            RunFileError::DuplicateReadId { read_id, line } => {
                assert_eq!(read_id, "r-1");
                assert_eq!(line, 3);
            }
            other => panic!("expected duplicate id, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_positive_sampling_rate_is_rejected() {
        let temp = TempDir::new().unwrap();
        let header = HEADER.replace("4000.0", "0.0");
        let path = write_run_file(&temp, &[&header, &read_line("r-1", 0)]).await;

        let err = RunFile::open(&path).await.unwrap_err();
        assert!(matches!(err, RunFileError::InvalidSamplingRate(_)));
    }

    #[tokio::test]
    async fn test_metadata_start_time_arithmetic() {
        let temp = TempDir::new().unwrap();
        // 8000 samples at 4000 Hz is exactly 2 seconds after experiment start
        let path = write_run_file(&temp, &[HEADER, &read_line("r-1", 8000)]).await;

        let run = RunFile::open(&path).await.unwrap();
        let metadata = run.metadata("r-1").unwrap();

        assert_eq!(metadata.run_id, "run-1");
        assert_eq!(metadata.channel, 126);
        assert_eq!(metadata.read_number, 1207);
        assert_eq!(metadata.sample_id, "s-1");
        assert_eq!(metadata.flow_cell_id, "FAK12345");
        assert_eq!(
            metadata.start_time,
            Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 2).unwrap()
        );
    }

    #[tokio::test]
    async fn test_metadata_sub_second_offset() {
        let temp = TempDir::new().unwrap();
        // 1000 samples at 4000 Hz is 250 ms
        let path = write_run_file(&temp, &[HEADER, &read_line("r-1", 1000)]).await;

        let run = RunFile::open(&path).await.unwrap();
        let metadata = run.metadata("r-1").unwrap();

        let expected = Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap()
            + Duration::milliseconds(250);
        assert_eq!(metadata.start_time, expected);
    }

    #[tokio::test]
    async fn test_metadata_unknown_read_fails_fast() {
        let temp = TempDir::new().unwrap();
        let path = write_run_file(&temp, &[HEADER, &read_line("r-1", 0)]).await;

        let run = RunFile::open(&path).await.unwrap();
        let err = run.metadata("ghost").unwrap_err();
        assert!(matches!(err, RunFileError::ReadNotFound(id) if id == "ghost"));
    }
}
