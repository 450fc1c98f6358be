//! One-shot CLI handlers: `process <FILE>` and `extract <TEXT>`.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::audio::{mime_type_for_extension, AudioRecording};
use crate::cli::args::{ExtractCliArgs, ProcessCliArgs};
use crate::config::Config;
use crate::extraction;
use crate::pipeline::{extractor_from_config, VoicePipeline};

/// Handle the process CLI command.
pub async fn handle_process_command(args: ProcessCliArgs, config_path: Option<&Path>) -> Result<()> {
    let recording = read_recording(&args.file).await?;

    let config = Config::load(config_path)?;
    let mut pipeline = VoicePipeline::from_config(&config)?;
    if let Some(today) = args.today {
        pipeline = pipeline.with_fixed_anchor(today);
    }

    let cancel = cancel_on_ctrl_c();
    let pb = create_spinner();
    pb.set_message(format!("Transcribing {}...", args.file.display()));

    let result = pipeline.process(&recording, &cancel).await;
    pb.finish_and_clear();

    let outcome = result.context("Failed to process recording")?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Handle the extract CLI command.
pub async fn handle_extract_command(args: ExtractCliArgs, config_path: Option<&Path>) -> Result<()> {
    if args.text.trim().is_empty() {
        bail!("Nothing to extract: text is empty");
    }

    let config = Config::load(config_path)?;
    let extractor = extractor_from_config(&config.extraction)?;
    let anchor = args.today.unwrap_or_else(extraction::today);

    let pb = create_spinner();
    pb.set_message("Extracting task...");
    let candidate = extractor.extract_at(&args.text, anchor).await;
    pb.finish_and_clear();

    println!("{}", serde_json::to_string_pretty(&candidate)?);
    Ok(())
}

async fn read_recording(path: &Path) -> Result<AudioRecording> {
    if !path.exists() {
        bail!("File not found: {}", path.display());
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if data.is_empty() {
        bail!("File is empty: {}", path.display());
    }

    info!("Loaded {} bytes from {}", data.len(), path.display());
    Ok(AudioRecording::new(data, mime_type_for_extension(ext)))
}

/// Token that fires on Ctrl+C so an in-flight poll stops cleanly.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

pub(crate) fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
