//! Command routing

use crate::args::{Cli, Commands};
use crate::commands;
use anyhow::Result;
use toolmux_core::Settings;

/// Route a parsed command to its handler
pub async fn route(cli: Cli, settings: Settings) -> Result<()> {
    match cli.command {
        Commands::Servers { format } => commands::servers::show_servers(settings, format).await,
        Commands::Tools { server, format } => {
            commands::tools::show_tools(settings, server.as_deref(), format).await
        }
        Commands::Call { name, arguments } => {
            commands::call::call_tool(settings, &name, &arguments).await
        }
        Commands::Test { name } => commands::servers::test_server(settings, &name).await,
        Commands::Watch { interval } => commands::watch::watch(settings, interval).await,
    }
}
