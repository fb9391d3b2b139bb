//! HTTP run file store client.
//!
//! Streams `GET {base}/api/runs/{id}/file` straight to disk in chunks, never
//! buffering the whole body.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::types::{RunFileStore, TransferError};
use crate::checksum::DEFAULT_BUFFER_SIZE;
use crate::registry::RegistryConfig;

/// File store backend downloading run files from the tracker service.
///
/// Shares the registry's base URL and credentials; the file endpoint lives
/// next to the lookup endpoint.
pub struct HttpRunFileStore {
    client: reqwest::Client,
    config: RegistryConfig,
}

impl HttpRunFileStore {
    pub fn new(config: RegistryConfig) -> Result<Self, TransferError> {
        // A whole-request timeout would cap how large a run file can be, so
        // only the connect phase is bounded.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransferError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn file_url(&self, id: u64) -> String {
        format!(
            "{}/api/runs/{}/file",
            self.config.url.trim_end_matches('/'),
            id
        )
    }

    fn map_reqwest_error(e: reqwest::Error) -> TransferError {
        if e.is_timeout() {
            TransferError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransferError::Connection(e.to_string())
        } else {
            TransferError::Stream(e.to_string())
        }
    }
}

#[async_trait]
impl RunFileStore for HttpRunFileStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn download(&self, id: u64, destination: &Path) -> Result<u64, TransferError> {
        let url = self.file_url(id);
        debug!(id, %url, "starting run file transfer");

        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(Self::map_reqwest_error)?;
        if !response.status().is_success() {
            return Err(TransferError::Status {
                status: response.status().as_u16(),
            });
        }

        let file = File::create(destination)
            .await
            .map_err(|source| TransferError::Write { source })?;
        let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut total_bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransferError::Stream(e.to_string()))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|source| TransferError::Write { source })?;
            total_bytes += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|source| TransferError::Write { source })?;

        debug!(id, total_bytes, "run file transfer complete");
        Ok(total_bytes)
    }
}
