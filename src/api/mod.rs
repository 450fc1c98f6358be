//! REST API server for voice-to-task processing.

pub mod error;
pub mod routes;

use crate::config::ServerConfig;
use crate::pipeline::VoicePipeline;
use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::info;

pub struct ApiServer {
    host: String,
    port: u16,
    max_upload_bytes: usize,
    pipeline: Arc<VoicePipeline>,
}

/// Builds the full application router.
pub fn app(pipeline: Arc<VoicePipeline>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/version", get(version))
        .merge(routes::voice::router(pipeline, max_upload_bytes))
        .layer(ServiceBuilder::new())
}

impl ApiServer {
    pub fn new(pipeline: Arc<VoicePipeline>, config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            max_upload_bytes: config.max_upload_bytes,
            pipeline,
        }
    }

    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server to {addr}"))?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until Ctrl+C.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        let app = app(self.pipeline, self.max_upload_bytes);

        info!("API server listening on http://{}", local);
        info!("Endpoints:");
        info!("  GET  /                  - Service info");
        info!("  GET  /version           - Get version info");
        info!("  POST /process-voice     - Transcribe audio and extract a task");
        info!("  POST /api/process-voice - Same as /process-voice");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, shutting down");
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "voice-tasks",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "voice-tasks"
    }))
}
