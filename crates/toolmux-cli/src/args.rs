//! CLI argument definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Default settings file name
pub const DEFAULT_CONFIG_FILE: &str = "toolmux.toml";

#[derive(Parser)]
#[command(name = "toolmux")]
#[command(about = "Connect to tool servers and call their tools")]
#[command(
    long_about = r#"Connect to tool servers and call their tools

USAGE:
  toolmux servers                      # Connect and show server status
  toolmux tools                        # List tools as server__tool
  toolmux call calc__add '{"a":2}'     # Call one tool
  toolmux test calc                    # Test one server without registering it
  toolmux watch                        # Keep servers connected, print stats"#
)]
#[command(version)]
pub struct Cli {
    /// Path to the settings file
    #[arg(long, short = 'c', env = "TOOLMUX_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect every enabled server and show its status
    Servers {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the tools of every live server
    Tools {
        /// Only list tools of this server
        #[arg(long)]
        server: Option<String>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Call a tool by its qualified name
    Call {
        /// Qualified tool name (server__tool)
        name: String,

        /// JSON object of arguments
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// Connect to one configured server, list its tools, then disconnect
    Test {
        /// Server name from the settings file
        name: String,
    },

    /// Keep servers connected under heartbeat supervision and print stats
    Watch {
        /// Seconds between stats reports
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
}
