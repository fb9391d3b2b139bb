use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server and basecaller ports are not 0
/// - Registry URL and basecaller host are not empty
/// - Pipeline buffer size is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Registry validation
    if config.registry.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "registry.url cannot be empty".to_string(),
        ));
    }

    // Basecaller validation
    if config.basecaller.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "basecaller.host cannot be empty".to_string(),
        ));
    }
    if config.basecaller.port == 0 {
        return Err(ConfigError::ValidationError(
            "basecaller.port cannot be 0".to_string(),
        ));
    }

    // Pipeline validation
    if config.pipeline.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.buffer_size cannot be 0".to_string(),
        ));
    }

    Ok(())
}
