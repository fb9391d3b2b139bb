//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling comprehensive E2E testing
//! without external infrastructure.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use pilotfish_core::{
    testing::{MockBasecaller, MockRunFileStore, MockRunRegistry},
    Basecaller, BasecallerConfig, BasecallPipeline, Config, PipelineConfig, RegistryConfig,
    RunFileStore, RunRegistry, ServerConfig,
};

/// Re-export fixtures for test convenience
pub use pilotfish_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Run registry lookups (MockRunRegistry)
/// - Run file transfers (MockRunFileStore)
/// - Basecall sessions (MockBasecaller)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_basecall_run() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/runs/42/basecall").await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock registry - configure run descriptors
    pub registry: Arc<MockRunRegistry>,
    /// Mock file store - configure run file payloads
    pub store: Arc<MockRunFileStore>,
    /// Mock basecaller - control sessions and results
    pub basecaller: Arc<MockBasecaller>,
    /// FASTQ output directory inside `temp_dir`
    pub output_dir: PathBuf,
    /// Temporary directory for staged files and artifacts
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let output_dir = temp_dir.path().join("fastq");
        let work_dir = temp_dir.path().join("work");

        // Create mocks
        let registry = Arc::new(MockRunRegistry::new());
        let store = Arc::new(MockRunFileStore::new());
        let basecaller = Arc::new(MockBasecaller::new());

        // Create config
        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            registry: RegistryConfig {
                url: "http://registry.test".to_string(),
                api_key: None,
                timeout_secs: 5,
            },
            basecaller: BasecallerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Not used, sessions come from the mock
                profile: "dna_r9.4.1_450bps_hac".to_string(),
                poll_interval_ms: 10,
                queue_depth: 16,
                connect_timeout_secs: 1,
            },
            pipeline: PipelineConfig {
                output_dir: output_dir.clone(),
                work_dir,
                max_retries: 3,
                buffer_size: 64 * 1024,
                drain_timeout_secs: 60,
            },
        };

        // Create pipeline with mocks
        let pipeline = Arc::new(BasecallPipeline::new(
            config.pipeline.clone(),
            Arc::clone(&registry) as Arc<dyn RunRegistry>,
            Arc::clone(&store) as Arc<dyn RunFileStore>,
            Arc::clone(&basecaller) as Arc<dyn Basecaller>,
        ));

        // Create app state
        let state = Arc::new(pilotfish_server::state::AppState::new(config, pipeline));

        // Create router
        let router = pilotfish_server::api::create_router(state);

        Self {
            router,
            registry,
            store,
            basecaller,
            output_dir,
            temp_dir,
        }
    }

    /// Stage a complete run: registry descriptor plus file store payload.
    ///
    /// Returns the staged run file document.
    pub async fn stage_run(
        &self,
        run_id: u64,
        filename: &str,
        reads: &[(&str, u32, u32, usize)],
    ) -> String {
        let header = fixtures::run_header(&format!("seq-run-{}", run_id));
        let reads: Vec<_> = reads
            .iter()
            .map(|(id, channel, number, samples)| {
                fixtures::read_record(id, *channel, *number, *samples)
            })
            .collect();
        let document = fixtures::run_file_document(&header, &reads);

        self.registry
            .set_run(fixtures::descriptor(run_id, filename, &document))
            .await;
        self.store
            .set_payload(run_id, document.clone().into_bytes())
            .await;

        document
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a POST request with an empty body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Fetch the `/metrics` endpoint body as plain text.
    pub async fn get_metrics_text(&self) -> String {
        let request = Request::builder()
            .method("GET")
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), StatusCode::OK);
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        String::from_utf8(body_bytes.to_vec()).expect("Metrics body was not UTF-8")
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
