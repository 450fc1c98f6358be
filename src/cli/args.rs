use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::extraction::DueDate;

#[derive(Parser, Debug)]
#[command(name = "voice-tasks")]
#[command(about = "Turn spoken requests into structured tasks", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (default: <config dir>/voice-tasks/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the HTTP service (default)
    Serve,
    /// Transcribe an audio file and extract a task from it
    Process(ProcessCliArgs),
    /// Extract a task from text without transcription
    Extract(ExtractCliArgs),
    /// Record from the microphone and turn the recording into a task
    Record,
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct ProcessCliArgs {
    /// Audio file to process (wav, mp3, m4a, ogg, flac, webm)
    pub file: PathBuf,
    /// Anchor date for relative expressions, DD-MM-YYYY (default: today)
    #[arg(long, value_parser = parse_anchor)]
    pub today: Option<NaiveDate>,
}

#[derive(ClapArgs, Debug)]
pub struct ExtractCliArgs {
    /// Transcript text to extract a task from
    pub text: String,
    /// Anchor date for relative expressions, DD-MM-YYYY (default: today)
    #[arg(long, value_parser = parse_anchor)]
    pub today: Option<NaiveDate>,
}

fn parse_anchor(value: &str) -> Result<NaiveDate, String> {
    DueDate::parse(value)
        .map(|d| d.date())
        .map_err(|e| e.to_string())
}
