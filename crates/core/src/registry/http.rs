//! HTTP run registry client.
//!
//! Speaks the registry's lookup API: `GET {base}/api/runs/{id}` returning a
//! `{"data": {"filename": ..., "sha256": ...}}` envelope. An absent or empty
//! envelope means the run is unknown.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::types::{RegistryConfig, RegistryError, RunDescriptor, RunRegistry};

static SHA256_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{64}$").unwrap());

/// Registry backend talking to the run tracker over HTTP.
pub struct HttpRunRegistry {
    client: reqwest::Client,
    config: RegistryConfig,
}

impl HttpRunRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RegistryError::Api(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn lookup_url(&self, id: u64) -> String {
        format!("{}/api/runs/{}", self.config.url.trim_end_matches('/'), id)
    }

    fn map_reqwest_error(e: reqwest::Error) -> RegistryError {
        if e.is_timeout() {
            RegistryError::Timeout(e.to_string())
        } else if e.is_connect() {
            RegistryError::Connection(e.to_string())
        } else {
            RegistryError::Api(e.to_string())
        }
    }
}

#[async_trait]
impl RunRegistry for HttpRunRegistry {
    fn name(&self) -> &str {
        "http"
    }

    async fn lookup(&self, id: u64) -> Result<RunDescriptor, RegistryError> {
        let url = self.lookup_url(id);
        debug!(id, %url, "looking up run descriptor");

        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(Self::map_reqwest_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(id));
        }
        if !response.status().is_success() {
            return Err(RegistryError::Api(format!(
                "registry returned status {}",
                response.status()
            )));
        }

        let envelope: LookupResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Api(format!("invalid registry response: {e}")))?;

        descriptor_from_envelope(id, envelope)
    }
}

fn descriptor_from_envelope(
    id: u64,
    envelope: LookupResponse,
) -> Result<RunDescriptor, RegistryError> {
    let data = envelope.data.ok_or(RegistryError::NotFound(id))?;

    let filename = match data.filename {
        Some(f) if !f.is_empty() => f,
        _ => {
            return Err(RegistryError::Incomplete {
                id,
                reason: "filename missing".to_string(),
            })
        }
    };

    let sha256 = match data.sha256 {
        Some(d) if SHA256_HEX.is_match(&d) => d,
        Some(_) => {
            return Err(RegistryError::Incomplete {
                id,
                reason: "sha256 is not a 64-char lowercase hex digest".to_string(),
            })
        }
        None => {
            return Err(RegistryError::Incomplete {
                id,
                reason: "sha256 missing".to_string(),
            })
        }
    };

    Ok(RunDescriptor {
        id,
        filename,
        sha256,
    })
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    data: Option<LookupData>,
}

#[derive(Debug, Deserialize)]
struct LookupData {
    filename: Option<String>,
    sha256: Option<String>,
}
