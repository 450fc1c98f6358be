use anyhow::Result;

pub mod args;
pub mod process;
pub mod record;

pub use args::{Cli, CliCommand, ExtractCliArgs, ProcessCliArgs};
pub use process::{handle_extract_command, handle_process_command};
pub use record::handle_record_command;

pub fn handle_version_command() -> Result<()> {
    println!("voice-tasks {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
