//! Tool listing command

use super::connect;
use crate::args::OutputFormat;
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use toolmux_core::bridge::qualify;
use toolmux_core::{Settings, ToolBridge};

/// List tools, optionally of one server only
pub async fn show_tools(settings: Settings, server: Option<&str>, format: OutputFormat) -> Result<()> {
    let manager = connect(settings).await?;
    let bridge = ToolBridge::new(manager.clone());
    let cancel = CancellationToken::new();

    let mut tools = bridge.to_openai_tools(&cancel).await;
    if let Some(server) = server {
        let names: Vec<String> = manager
            .get_tools_by_server_name(server, &cancel)
            .await?
            .iter()
            .map(|t| qualify(server, &t.name))
            .collect();
        tools.retain(|t| names.contains(&t.function.name));
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tools)?),
        OutputFormat::Text if tools.is_empty() => println!("No tools available."),
        OutputFormat::Text => {
            println!("Available tools:\n");
            for tool in &tools {
                match tool.function.description.as_str() {
                    "" => println!("  {}", tool.function.name),
                    desc => println!("  {} - {}", tool.function.name, desc),
                }
            }
        }
    }

    manager.shutdown().await?;
    Ok(())
}
