//! Settings file loading
//!
//! A TOML file with an optional `[manager]` table and a list of
//! `[[servers]]` entries:
//!
//! ```toml
//! [manager]
//! max_tool_iterations = 8
//!
//! [[servers]]
//! name = "calc"
//! transport = "http"
//! url = "http://localhost:8080/rpc"
//! ```

use crate::bridge::ToolBridge;
use crate::chat::ChatOrchestrator;
use crate::mcp::error::McpError;
use crate::mcp::server_config::ServerConfig;
use crate::store::InMemoryConfigStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings loading errors
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The file could not be read
    #[error("Failed to read settings file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`Settings`]
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// A server entry is invalid
    #[error("Invalid server '{name}': {source}")]
    InvalidServer {
        name: String,
        #[source]
        source: McpError,
    },

    /// Two server entries share a name
    #[error("Duplicate server name '{0}'")]
    DuplicateServer(String),
}

/// Manager-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Iteration budget of the chat-tool loop
    pub max_tool_iterations: i32,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: Option<String>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: 5,
            log_level: None,
        }
    }
}

/// Contents of a settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Manager-wide settings
    pub manager: ManagerSettings,
    /// Configured tool servers
    pub servers: Vec<ServerConfig>,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every server entry and reject duplicate names
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            server
                .validate()
                .map_err(|source| SettingsError::InvalidServer {
                    name: server.name.clone(),
                    source,
                })?;
            if !seen.insert(server.name.as_str()) {
                return Err(SettingsError::DuplicateServer(server.name.clone()));
            }
        }
        Ok(())
    }

    /// Chat orchestrator over `bridge` using the configured iteration budget
    pub fn chat_orchestrator(&self, bridge: ToolBridge) -> ChatOrchestrator {
        ChatOrchestrator::new(bridge).with_default_iterations(self.manager.max_tool_iterations)
    }

    /// Build an in-memory store holding the configured servers
    pub fn into_store(self) -> InMemoryConfigStore {
        InMemoryConfigStore::from_configs(self.servers)
    }
}
