//! Interactive microphone session driving the recording state machine.

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{AudioCaptureController, AudioRecording};
use crate::cli::process::create_spinner;
use crate::config::Config;
use crate::pipeline::{VoiceOutcome, VoicePipeline};
use crate::session::{RecordingStateMachine, SessionPhase};
use crate::task::TaskCandidate;

enum Preview {
    CreateTask,
    RecordAgain,
    Discard,
}

/// Handle the record CLI command.
pub async fn handle_record_command(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    let pipeline = Arc::new(VoicePipeline::from_config(&config)?);
    let mut machine = RecordingStateMachine::new(AudioCaptureController::microphone(), pipeline);
    let theme = ColorfulTheme::default();

    let result = run_session(&mut machine, &theme).await;
    let transcript = machine.transcript().map(str::to_string);
    machine.dispose();

    if let Some(candidate) = result? {
        let outcome = VoiceOutcome {
            transcript: transcript.unwrap_or_default(),
            parsed_data: candidate,
        };
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Ok(())
}

async fn run_session(
    machine: &mut RecordingStateMachine,
    theme: &ColorfulTheme,
) -> Result<Option<TaskCandidate>> {
    if !Confirm::with_theme(theme)
        .with_prompt("Start recording?")
        .default(true)
        .interact()?
    {
        return Ok(None);
    }

    loop {
        machine
            .start()
            .await
            .context("Could not start recording")?;

        Input::<String>::with_theme(theme)
            .with_prompt("Recording... press Enter to stop")
            .allow_empty(true)
            .interact_text()?;

        let recording = machine.stop().await.context("Recording failed")?;
        eprintln!("{}", describe_recording(recording));

        match prompt_preview(theme)? {
            Preview::RecordAgain => continue,
            Preview::Discard => {
                machine.reset().await;
                eprintln!("Recording discarded.");
                return Ok(None);
            }
            Preview::CreateTask => {}
        }

        match confirm_with_progress(machine).await {
            Ok(candidate) => return Ok(Some(candidate)),
            Err(e) => {
                eprintln!("Failed to create task: {e}");
                let retry = Confirm::with_theme(theme)
                    .with_prompt("Record again?")
                    .default(true)
                    .interact()?;
                if !retry {
                    return Err(e);
                }
                machine.reset().await;
            }
        }
    }
}

fn describe_recording(recording: &AudioRecording) -> String {
    let size = format!("{:.1} KiB {}", recording.len() as f64 / 1024.0, recording.mime_type());
    match recording.duration() {
        Some(length) => format!("Captured {:.1}s of audio ({size})", length.as_secs_f64()),
        None => format!("Captured {size}"),
    }
}

fn prompt_preview(theme: &ColorfulTheme) -> Result<Preview> {
    let options = ["Create task", "Record again", "Discard"];
    let selection = Select::with_theme(theme)
        .with_prompt("What would you like to do with this recording?")
        .items(&options)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => Preview::CreateTask,
        1 => Preview::RecordAgain,
        _ => Preview::Discard,
    })
}

/// Runs `confirm` while a spinner follows the session phase.
async fn confirm_with_progress(machine: &mut RecordingStateMachine) -> Result<TaskCandidate> {
    let status = machine.status();
    let cancel = machine.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let pb = create_spinner();
    let mut ticker = tokio::time::interval(Duration::from_millis(150));
    let confirm = machine.confirm();
    tokio::pin!(confirm);

    let result = loop {
        tokio::select! {
            result = &mut confirm => break result,
            _ = ticker.tick() => {
                let phase = status.get().await.phase;
                if phase.is_busy() {
                    pb.set_message(phase_message(phase));
                }
            }
        }
    };

    pb.finish_and_clear();
    ctrl_c.abort();
    Ok(result?)
}

fn phase_message(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Uploading => "Uploading audio...",
        SessionPhase::Polling => "Waiting for transcript...",
        SessionPhase::Parsing => "Extracting task...",
        _ => "Working...",
    }
}
