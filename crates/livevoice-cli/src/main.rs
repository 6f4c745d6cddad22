//! `livevoice` entry point: the composition root.

use clap::{CommandFactory, Parser};
use livevoice_cli::{Cli, Commands, handlers};
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "warn,livevoice=info";

/// Logs go to stderr so stdout stays free for the conversation.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before parsing, so `.env` feeds the LIVEVOICE_* fallbacks.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    tracing::debug!(?command, "Dispatching");
    match command {
        Commands::Url => handlers::url::execute(&cli.gateway)?,
        Commands::Chat => handlers::chat::execute(&cli.gateway).await?,
        #[cfg(feature = "local-audio")]
        Commands::Talk { gate_mic } => handlers::talk::execute(&cli.gateway, gate_mic).await?,
    }
    Ok(())
}
