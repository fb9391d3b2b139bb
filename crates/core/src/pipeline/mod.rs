mod config;
mod runner;

pub use config::PipelineConfig;
pub use runner::{BasecallPipeline, PipelineError, PipelineOutcome};
