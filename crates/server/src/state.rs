use std::sync::Arc;

use pilotfish_core::{BasecallPipeline, Config, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    pipeline: Arc<BasecallPipeline>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Arc<BasecallPipeline>) -> Self {
        Self { config, pipeline }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn pipeline(&self) -> &BasecallPipeline {
        self.pipeline.as_ref()
    }
}
