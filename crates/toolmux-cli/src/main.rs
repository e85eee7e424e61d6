//! toolmux command-line interface
//!
//! Loads a TOML settings file, connects the configured tool servers and
//! exposes listing, calling and supervision commands.

mod args;
mod commands;
mod router;

use anyhow::Result;
use args::Cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = commands::load_settings(&cli.config)?;

    init_logging(&cli, settings.manager.log_level.as_deref());
    router::route(cli, settings).await
}

/// RUST_LOG wins over the settings file, which wins over the default
fn init_logging(cli: &Cli, configured: Option<&str>) {
    let fallback = if cli.verbose {
        "toolmux_core=debug,toolmux=debug"
    } else {
        configured.unwrap_or("warn")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}
