//! Server status and connection test commands

use super::{connect, target};
use crate::args::OutputFormat;
use anyhow::{Result, anyhow};
use colored::Colorize;
use serde_json::json;
use std::sync::Arc;
use toolmux_core::{ConnectionManager, InMemoryConfigStore, Settings};

/// Connect every enabled server and print its status
pub async fn show_servers(settings: Settings, format: OutputFormat) -> Result<()> {
    if settings.servers.is_empty() {
        println!("No servers configured.");
        println!("\nAdd a [[servers]] entry to the settings file, for example:");
        println!("  [[servers]]\n  name = \"calc\"\n  transport = \"http\"\n  url = \"http://localhost:8080/rpc\"");
        return Ok(());
    }

    let manager = connect(settings).await?;
    let servers = manager.get_all_servers().await?;
    let stats = manager.get_all_stats().await;

    if format == OutputFormat::Json {
        let mut entries = Vec::new();
        for server in &servers {
            let conn = manager.get_connection(server.id).await;
            entries.push(json!({
                "id": server.id,
                "name": server.name,
                "transport": server.transport,
                "target": target(server),
                "enabled": server.enabled,
                "connected": conn.as_ref().is_some_and(|c| c.is_connected()),
                "server_info": conn.and_then(|c| c.server_info()),
                "stats": stats.get(&server.name),
                "last_error": server.last_error,
            }));
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("Configured servers:\n");
        for server in &servers {
            let connected = stats.get(&server.name).is_some_and(|s| s.connected);
            let status = if !server.enabled {
                "disabled".dimmed()
            } else if connected {
                "connected".green()
            } else {
                "failed".red()
            };
            println!(
                "  {} ({}) - {} [{}]",
                server.name,
                server.transport,
                target(server),
                status
            );
            if let Some(err) = server.last_error.as_deref().filter(|_| !connected) {
                println!("      last error: {}", err);
            }
        }
    }

    manager.shutdown().await?;
    Ok(())
}

/// Connect to one configured server without registering it
pub async fn test_server(settings: Settings, name: &str) -> Result<()> {
    let config = settings
        .servers
        .iter()
        .find(|s| s.name == name)
        .cloned()
        .ok_or_else(|| anyhow!("no server named '{}' in the settings file", name))?;

    let manager = ConnectionManager::new(Arc::new(InMemoryConfigStore::new()));
    match manager.test_server_connection(&config).await {
        Ok(outcome) => {
            println!(
                "{} {} ({} {}) in {:?}",
                "✓".green(),
                name,
                outcome.server_info.name,
                outcome.server_info.version,
                outcome.elapsed
            );
            let caps = outcome.server_info.capabilities;
            println!(
                "  capabilities: tools={:?} resources={:?} prompts={:?}",
                caps.tools, caps.resources, caps.prompts
            );
            println!("  {} tools:", outcome.tools.len());
            for tool in &outcome.tools {
                println!("    {}", tool.name);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {}: {}", "✗".red(), name, e);
            Err(e.into())
        }
    }
}
