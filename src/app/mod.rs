use crate::api::ApiServer;
use crate::config::Config;
use crate::pipeline::VoicePipeline;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Loads configuration, fails fast on missing keys, and serves until Ctrl+C.
pub async fn run_service(config_path: Option<&Path>) -> Result<()> {
    info!("Starting voice-tasks service");

    let config = Config::load(config_path)?;
    config
        .validate()
        .context("Configuration is incomplete, refusing to start")?;

    let pipeline = Arc::new(VoicePipeline::from_config(&config)?);
    let server = ApiServer::new(pipeline, &config.server);

    info!("voice-tasks is ready!");
    info!(
        "Test manually: curl -F audio=@note.webm http://{}:{}/process-voice",
        config.server.host, config.server.port
    );

    server.start().await
}
