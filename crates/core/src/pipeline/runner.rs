//! Pipeline runner: resolve, fetch, basecall, enrich, finalize.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::basecaller::{BasecallSession, Basecaller, SessionError};
use crate::fastq;
use crate::metrics::{
    BASECALL_DURATION_SECONDS, DRAIN_STALLS_TOTAL, FASTQ_BYTES_TOTAL, READS_CALLED_TOTAL,
    READS_SUBMITTED_TOTAL, RUNS_PROCESSED_TOTAL, RUN_DURATION_SECONDS,
};
use crate::registry::{RegistryError, RunRegistry};
use crate::run_file::{RunFile, RunFileError};
use crate::transfer::{FetchError, FetchPolicy, RunFileStore, VerifiedFetcher};

use super::config::PipelineConfig;

/// Error type for pipeline runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("run lookup failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("run file acquisition failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("run file unreadable: {0}")]
    RunFile(#[from] RunFileError),

    #[error("basecall session failed: {0}")]
    Session(#[from] SessionError),

    /// A collected result's id could not be resolved in the run file.
    #[error("metadata missing for collected read {read_id}")]
    MetadataMissing { read_id: String },

    /// The peer returned an id that was never submitted, or returned the
    /// same id twice.
    #[error("collected read {read_id} was not outstanding")]
    UnexpectedRead { read_id: String },

    /// No result arrived within the drain deadline.
    #[error(
        "drain stalled after {waited_secs}s with {} reads outstanding: {}",
        outstanding.len(),
        outstanding.join(", ")
    )]
    DrainStalled {
        outstanding: Vec<String>,
        waited_secs: u64,
    },

    #[error("workspace I/O failed: {context}")]
    Workspace {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// True when the failure means the requested run does not exist, as
    /// opposed to the pipeline breaking.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::Registry(e) if e.is_not_found())
    }
}

/// Result of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: u64,
    /// Finalized artifact path inside the output directory.
    pub fastq_path: PathBuf,
    pub fastq_bytes: u64,
    pub reads: usize,
    /// Raw samples represented by the called output, after trimming.
    pub samples_called: u64,
    pub fetch_attempts: u32,
    pub duration_ms: u64,
}

struct DrainStats {
    samples_called: u64,
}

/// Drives one run id through fetch, verification, basecalling, and
/// enrichment, producing a single FASTQ artifact.
///
/// Records are written in collection order, which is whatever order the
/// basecaller finishes reads in; no re-sort to submission order happens.
/// Every intermediate file lives in a per-run temp directory that is
/// removed on all exit paths, and the session is closed on all exit paths.
pub struct BasecallPipeline {
    config: PipelineConfig,
    registry: Arc<dyn RunRegistry>,
    store: Arc<dyn RunFileStore>,
    basecaller: Arc<dyn Basecaller>,
}

impl BasecallPipeline {
    pub fn new(
        config: PipelineConfig,
        registry: Arc<dyn RunRegistry>,
        store: Arc<dyn RunFileStore>,
        basecaller: Arc<dyn Basecaller>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            basecaller,
        }
    }

    /// Runs the full pipeline for one run id.
    pub async fn process(&self, run_id: u64) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let result = self.process_inner(run_id, started).await;

        let label = if result.is_ok() { "success" } else { "failed" };
        RUNS_PROCESSED_TOTAL.with_label_values(&[label]).inc();
        RUN_DURATION_SECONDS
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    async fn process_inner(
        &self,
        run_id: u64,
        started: Instant,
    ) -> Result<PipelineOutcome, PipelineError> {
        let run_token = Uuid::new_v4();
        info!(run_id, %run_token, "pipeline run starting");

        let descriptor = self.registry.lookup(run_id).await?;
        debug!(run_id, filename = %descriptor.filename, "resolved run descriptor");

        // Registry filenames are treated as opaque basenames so staged
        // files cannot land outside the workspace.
        let source_name = Path::new(&descriptor.filename)
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("run-{run_id}.dat"));

        fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|source| PipelineError::Workspace {
                context: format!("creating work dir {}", self.config.work_dir.display()),
                source,
            })?;
        let workspace = TempDir::with_prefix_in(format!("run-{run_id}-"), &self.config.work_dir)
            .map_err(|source| PipelineError::Workspace {
                context: "creating run workspace".to_string(),
                source,
            })?;

        let raw_path = workspace.path().join(&source_name);
        let fetcher = VerifiedFetcher::new(
            Arc::clone(&self.store),
            FetchPolicy {
                max_retries: self.config.max_retries,
                buffer_size: self.config.buffer_size,
            },
        );
        let report = fetcher.fetch(run_id, &descriptor.sha256, &raw_path).await?;
        info!(
            run_id,
            attempts = report.attempts,
            bytes = report.bytes,
            "run file fetched and verified"
        );

        let run = RunFile::open(&raw_path).await?;
        info!(run_id, reads = run.len(), "run file parsed");

        let fastq_name = artifact_name(&source_name, &descriptor.sha256);
        let staged_path = workspace.path().join(&fastq_name);

        let basecall_started = Instant::now();
        let mut session = self.basecaller.open_session().await?;
        let drain = self.call_reads(session.as_mut(), &run, &staged_path).await;
        let close_result = session.close().await;
        BASECALL_DURATION_SECONDS
            .with_label_values(&[])
            .observe(basecall_started.elapsed().as_secs_f64());

        let stats = match (drain, close_result) {
            (Err(e), close) => {
                if let Err(close_err) = close {
                    warn!(run_id, error = %close_err, "session close failed after pipeline error");
                }
                return Err(e);
            }
            (Ok(_), Err(close_err)) => return Err(PipelineError::Session(close_err)),
            (Ok(stats), Ok(())) => stats,
        };

        fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|source| PipelineError::Workspace {
                context: format!("creating output dir {}", self.config.output_dir.display()),
                source,
            })?;
        let final_path = self.config.output_dir.join(&fastq_name);
        move_artifact(&staged_path, &final_path, self.config.buffer_size).await?;

        let fastq_bytes = fs::metadata(&final_path)
            .await
            .map_err(|source| PipelineError::Workspace {
                context: format!("reading artifact size of {}", final_path.display()),
                source,
            })?
            .len();
        FASTQ_BYTES_TOTAL.inc_by(fastq_bytes);

        info!(
            run_id,
            path = %final_path.display(),
            bytes = fastq_bytes,
            reads = run.len(),
            "pipeline run complete"
        );

        Ok(PipelineOutcome {
            run_id,
            fastq_path: final_path,
            fastq_bytes,
            reads: run.len(),
            samples_called: stats.samples_called,
            fetch_attempts: report.attempts,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Submits every read, then drains results into the staged FASTQ file.
    ///
    /// The drain deadline resets on every collected result; a stretch of
    /// `drain_timeout_secs` with nothing collected abandons the run and
    /// reports every outstanding read id.
    async fn call_reads(
        &self,
        session: &mut dyn BasecallSession,
        run: &RunFile,
        staged_path: &Path,
    ) -> Result<DrainStats, PipelineError> {
        let file = File::create(staged_path)
            .await
            .map_err(|source| PipelineError::Workspace {
                context: format!("creating staged artifact {}", staged_path.display()),
                source,
            })?;
        let mut writer = BufWriter::new(file);

        let mut outstanding: HashSet<String> = HashSet::with_capacity(run.len());
        for read in run.reads() {
            session.submit(read).await?;
            outstanding.insert(read.read_id.clone());
        }
        READS_SUBMITTED_TOTAL.inc_by(run.len() as u64);
        debug!(reads = run.len(), "all reads submitted");

        let deadline = Duration::from_secs(self.config.drain_timeout_secs);
        let mut last_progress = Instant::now();
        let mut collected = 0usize;
        let mut samples_called = 0u64;

        while collected < run.len() {
            match session.collect().await? {
                Some(called) => {
                    if !outstanding.remove(&called.read_id) {
                        return Err(PipelineError::UnexpectedRead {
                            read_id: called.read_id,
                        });
                    }

                    let record = fastq::enrich(&called, run).map_err(|e| match e {
                        RunFileError::ReadNotFound(read_id) => {
                            PipelineError::MetadataMissing { read_id }
                        }
                        other => PipelineError::RunFile(other),
                    })?;

                    writer
                        .write_all(record.to_string().as_bytes())
                        .await
                        .map_err(|source| PipelineError::Workspace {
                            context: format!("appending to {}", staged_path.display()),
                            source,
                        })?;

                    if let Some(read) = run.get(&called.read_id) {
                        samples_called +=
                            read.total_samples().saturating_sub(called.trimmed_samples);
                    }

                    collected += 1;
                    READS_CALLED_TOTAL.inc();
                    last_progress = Instant::now();
                }
                None => {
                    if last_progress.elapsed() >= deadline {
                        DRAIN_STALLS_TOTAL.inc();
                        let mut stalled: Vec<String> = outstanding.iter().cloned().collect();
                        stalled.sort();
                        warn!(
                            outstanding = stalled.len(),
                            collected, "drain deadline exceeded"
                        );
                        return Err(PipelineError::DrainStalled {
                            outstanding: stalled,
                            waited_secs: self.config.drain_timeout_secs,
                        });
                    }
                }
            }
        }

        writer
            .flush()
            .await
            .map_err(|source| PipelineError::Workspace {
                context: format!("flushing {}", staged_path.display()),
                source,
            })?;

        Ok(DrainStats { samples_called })
    }
}

/// Artifact names are derived from the source filename and the verified
/// digest, so reprocessing is idempotent and differently-verified copies of
/// a same-named file never collide.
fn artifact_name(source_filename: &str, sha256: &str) -> String {
    let stem = Path::new(source_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_filename);
    format!("{stem}-{sha256}.fastq")
}

/// Moves the staged artifact into the output directory, falling back to a
/// chunked copy when the rename crosses filesystems.
async fn move_artifact(
    source: &Path,
    destination: &Path,
    buffer_size: usize,
) -> Result<(), PipelineError> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        // Cross-filesystem moves fail with EXDEV (18 on Linux)
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) => {
            copy_artifact(source, destination, buffer_size).await
        }
        Err(source) => Err(PipelineError::Workspace {
            context: format!("moving artifact to {}", destination.display()),
            source,
        }),
    }
}

async fn copy_artifact(
    source: &Path,
    destination: &Path,
    buffer_size: usize,
) -> Result<(), PipelineError> {
    let copy_err = |source: std::io::Error| PipelineError::Workspace {
        context: format!("copying artifact to {}", destination.display()),
        source,
    };

    let source_file = File::open(source).await.map_err(copy_err)?;
    let dest_file = File::create(destination).await.map_err(copy_err)?;

    let mut reader = BufReader::with_capacity(buffer_size, source_file);
    let mut writer = BufWriter::with_capacity(buffer_size, dest_file);
    let mut buffer = vec![0u8; buffer_size];

    loop {
        let bytes_read = reader.read(&mut buffer).await.map_err(copy_err)?;
        if bytes_read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..bytes_read])
            .await
            .map_err(copy_err)?;
    }

    writer.flush().await.map_err(copy_err)
}
