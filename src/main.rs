use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use voice_tasks::{
    app,
    cli::{
        handle_extract_command, handle_process_command, handle_record_command,
        handle_version_command, Cli, CliCommand,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Some(CliCommand::Version) => handle_version_command(),
        Some(CliCommand::Process(args)) => handle_process_command(args, config_path).await,
        Some(CliCommand::Extract(args)) => handle_extract_command(args, config_path).await,
        Some(CliCommand::Record) => handle_record_command(config_path).await,
        Some(CliCommand::Serve) | None => app::run_service(config_path).await,
    }
}
