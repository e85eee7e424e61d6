//! CLI command implementations

pub mod call;
pub mod servers;
pub mod tools;
pub mod watch;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use toolmux_core::{ConnectionManager, ServerConfig, Settings, TransportKind};
use tracing::info;

/// Read and validate the settings file
pub(crate) fn load_settings(path: &Path) -> Result<Settings> {
    Settings::load(path).with_context(|| format!("loading settings from '{}'", path.display()))
}

/// Build a manager over the configured servers and connect the enabled ones
pub(crate) async fn connect(settings: Settings) -> Result<ConnectionManager> {
    let manager = ConnectionManager::new(Arc::new(settings.into_store()));
    let connected = manager.initialize().await?;
    info!(connected, "servers connected");
    Ok(manager)
}

/// Command line or URL a server is reached at
pub(crate) fn target(config: &ServerConfig) -> String {
    match config.transport {
        TransportKind::Stdio => {
            let mut line = config.command.clone().unwrap_or_default();
            for arg in &config.args {
                line.push(' ');
                line.push_str(arg);
            }
            line
        }
        _ => config.url.clone().unwrap_or_default(),
    }
}
