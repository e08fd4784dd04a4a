use anyhow::Result;
use clap::Parser;
use meter::{
    app,
    cli::{handle_config_command, Cli, CliCommand},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    // Cost lines go to stdout, so logs stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("Meter {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(CliCommand::Config) => {
            handle_config_command()?;
            return Ok(());
        }
        None => {}
    }

    app::run_cli(&cli).await
}
