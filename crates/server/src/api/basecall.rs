//! Basecall run API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for a completed basecall run
#[derive(Debug, Serialize)]
pub struct BasecallResponse {
    pub basecalled: bool,
    pub fastq: String,
    pub fastq_filesize: u64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct BasecallErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Basecall a run end to end and report the produced FASTQ artifact.
///
/// The run id is parsed by hand so a malformed id is rejected before any
/// registry or transfer traffic happens.
pub async fn basecall_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BasecallResponse>, impl IntoResponse> {
    let run_id: u64 = match id.parse() {
        Ok(run_id) => run_id,
        Err(_) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(BasecallErrorResponse {
                    error: format!("Invalid run id: {}", id),
                }),
            ));
        }
    };

    tracing::info!(run_id, "Basecall requested");

    match state.pipeline().process(run_id).await {
        Ok(outcome) => {
            tracing::info!(
                run_id,
                reads = outcome.reads,
                fastq = %outcome.fastq_path.display(),
                duration_ms = outcome.duration_ms,
                "Basecall complete"
            );
            Ok(Json(BasecallResponse {
                basecalled: true,
                fastq: outcome.fastq_path.display().to_string(),
                fastq_filesize: outcome.fastq_bytes,
            }))
        }
        Err(e) if e.is_not_found() => Err((
            StatusCode::NOT_FOUND,
            Json(BasecallErrorResponse {
                error: format!("Run not found: {}", run_id),
            }),
        )),
        Err(e) => {
            tracing::error!(run_id, error = %e, "Basecall failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BasecallErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
