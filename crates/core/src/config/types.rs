use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::basecaller::BasecallerConfig;
use crate::pipeline::PipelineConfig;
use crate::registry::RegistryConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub basecaller: BasecallerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8000
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub registry: SanitizedRegistryConfig,
    pub basecaller: BasecallerConfig,
    pub pipeline: PipelineConfig,
}

/// Sanitized registry config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRegistryConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            registry: SanitizedRegistryConfig {
                url: config.registry.url.clone(),
                api_key_configured: config
                    .registry
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
                timeout_secs: config.registry.timeout_secs,
            },
            basecaller: config.basecaller.clone(),
            pipeline: config.pipeline.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[registry]
url = "http://tracker:9000"

[basecaller]
host = "caller.local"
port = 5555
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.registry.url, "http://tracker:9000");
        assert_eq!(config.basecaller.host, "caller.local");
        assert_eq!(config.pipeline.max_retries, 3);
    }

    #[test]
    fn test_deserialize_with_overrides() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[registry]
url = "http://tracker:9000"
api_key = "secret"
timeout_secs = 5

[basecaller]
host = "caller.local"
port = 5555
profile = "dna_r10.4.1_e8.2_400bps_sup"

[pipeline]
max_retries = 1
drain_timeout_secs = 10
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.registry.api_key.as_deref(), Some("secret"));
        assert_eq!(config.basecaller.profile, "dna_r10.4.1_e8.2_400bps_sup");
        assert_eq!(config.pipeline.max_retries, 1);
        assert_eq!(config.pipeline.drain_timeout_secs, 10);
    }

    #[test]
    fn test_deserialize_missing_registry_fails() {
        let toml = r#"
[basecaller]
host = "caller.local"
port = 5555
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.registry.api_key = Some("secret-key".to_string());

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.registry.api_key_configured);
        assert_eq!(sanitized.registry.url, "http://tracker:9000");

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-key"));
    }

    #[test]
    fn test_sanitized_config_without_api_key() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(!sanitized.registry.api_key_configured);
    }
}
