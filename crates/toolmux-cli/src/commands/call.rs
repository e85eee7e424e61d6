//! Tool call command

use super::connect;
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use toolmux_core::{Settings, ToolBridge};

/// Call one tool by qualified name and print its output
pub async fn call_tool(settings: Settings, name: &str, arguments: &str) -> Result<()> {
    let manager = connect(settings).await?;
    let bridge = ToolBridge::new(manager.clone());

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let outcome = bridge.execute_by_qualified_name(name, arguments, &cancel).await;
    manager.shutdown().await?;

    let output = outcome?;
    println!("{}", output.content);
    Ok(())
}
