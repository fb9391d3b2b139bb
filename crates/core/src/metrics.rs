//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Verified fetch (attempts, integrity/transfer failures, durations)
//! - Basecall sessions (reads submitted/called, drain stalls)
//! - Pipeline runs (outcomes, durations, artifact bytes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Fetch Metrics
// =============================================================================

/// Transfer attempts total, counting retries.
pub static FETCH_ATTEMPTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pilotfish_fetch_attempts_total",
        "Total run file transfer attempts, including retries",
    )
    .unwrap()
});

/// Failed fetch attempts by kind.
pub static FETCH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pilotfish_fetch_failures_total",
            "Failed fetch attempts by failure kind",
        ),
        &["kind"], // "integrity", "transfer"
    )
    .unwrap()
});

/// Fetch duration in seconds, across all attempts of one fetch.
pub static FETCH_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pilotfish_fetch_duration_seconds",
            "Duration of verified fetches",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Basecall Session Metrics
// =============================================================================

/// Reads submitted to basecall sessions.
pub static READS_SUBMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pilotfish_reads_submitted_total",
        "Total reads submitted to the basecaller",
    )
    .unwrap()
});

/// Called reads collected from basecall sessions.
pub static READS_CALLED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pilotfish_reads_called_total",
        "Total called reads collected from the basecaller",
    )
    .unwrap()
});

/// Drain deadlines exceeded.
pub static DRAIN_STALLS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pilotfish_drain_stalls_total",
        "Total drains abandoned because no result arrived within the deadline",
    )
    .unwrap()
});

/// Submit-to-drain duration per run.
pub static BASECALL_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pilotfish_basecall_duration_seconds",
            "Duration of the submit and drain phases per run",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Pipeline runs total by result.
pub static RUNS_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pilotfish_runs_processed_total", "Total pipeline runs"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Whole-run duration in seconds.
pub static RUN_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pilotfish_run_duration_seconds",
            "End-to-end duration of pipeline runs",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["result"],
    )
    .unwrap()
});

/// FASTQ bytes written to finalized artifacts.
pub static FASTQ_BYTES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pilotfish_fastq_bytes_total",
        "Total bytes written to finalized FASTQ artifacts",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Fetch
        Box::new(FETCH_ATTEMPTS_TOTAL.clone()),
        Box::new(FETCH_FAILURES_TOTAL.clone()),
        Box::new(FETCH_DURATION_SECONDS.clone()),
        // Basecall sessions
        Box::new(READS_SUBMITTED_TOTAL.clone()),
        Box::new(READS_CALLED_TOTAL.clone()),
        Box::new(DRAIN_STALLS_TOTAL.clone()),
        Box::new(BASECALL_DURATION_SECONDS.clone()),
        // Pipeline
        Box::new(RUNS_PROCESSED_TOTAL.clone()),
        Box::new(RUN_DURATION_SECONDS.clone()),
        Box::new(FASTQ_BYTES_TOTAL.clone()),
    ]
}
