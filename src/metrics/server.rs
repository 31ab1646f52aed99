//! HTTP server for the Prometheus metrics endpoint.
//!
//! Metrics are refreshed from the live pipeline on every scrape, so no
//! background updater is needed.

use super::{MetricsRegistry, MetricsSnapshot};
use crate::pipeline::FramePipeline;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Creates a config listening on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// State shared by request handlers.
pub struct MetricsState {
    registry: MetricsRegistry,
    pipeline: Arc<FramePipeline>,
}

impl MetricsState {
    /// Pulls fresh counters from the pipeline and encodes them.
    fn scrape(&self) -> Result<String, super::MetricsError> {
        self.registry
            .update(&MetricsSnapshot::from_pipeline(&self.pipeline));
        self.registry.encode()
    }
}

/// HTTP server exposing `/metrics` and `/health`.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: Arc<MetricsState>,
}

impl MetricsServer {
    /// Creates a server that scrapes `pipeline` into `registry`.
    pub fn new(
        config: MetricsServerConfig,
        registry: MetricsRegistry,
        pipeline: Arc<FramePipeline>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(MetricsState { registry, pipeline }),
        }
    }

    /// Runs the server until it fails or the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(
            addr = %self.config.bind_addr,
            "Metrics server listening"
        );

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    match state.scrape() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

/// 200 while capture is running, 503 otherwise.
async fn health_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    if state.pipeline.is_running() {
        (StatusCode::OK, "RUNNING")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "STOPPED")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, Frame, MockCamera};

    #[test]
    fn test_config_default() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_scrape_reads_live_pipeline() {
        let pipeline = Arc::new(
            FramePipeline::with_delivery_queue(MockCamera::new(), CaptureConfig::default()).unwrap(),
        );
        let state = MetricsState {
            registry: MetricsRegistry::new().unwrap(),
            pipeline: Arc::clone(&pipeline),
        };

        pipeline.on_frame_captured(Frame::solid(2, 2, [0, 0, 0, 255], 1));
        let output = state.scrape().unwrap();
        assert!(output.contains("frame_pipeline_frames_captured_total 1"));
        assert!(output.contains("frame_pipeline_frames_discarded_total 1"));
    }
}
