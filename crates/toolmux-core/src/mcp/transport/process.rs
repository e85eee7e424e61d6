//! Standard I/O transport
//!
//! Spawns the server as a child process and exchanges newline-delimited JSON
//! over its stdin/stdout. A reader task routes responses through the
//! correlator; stderr is forwarded to the log.

use super::Transport;
use crate::mcp::correlator::Correlator;
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{McpMessage, McpNotification, McpRequest, McpResponse};
use crate::mcp::server_config::{ServerConfig, TransportKind};
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serde::Serialize;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Child-process transport
pub struct ProcessTransport {
    config: ServerConfig,
    correlator: Correlator,
    connected: Arc<AtomicBool>,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl ProcessTransport {
    /// Create a transport for a stdio server; nothing is spawned yet
    pub fn new(config: &ServerConfig) -> McpResult<Self> {
        if config.command.as_deref().is_none_or(|c| c.trim().is_empty()) {
            return Err(McpError::invalid_request(format!(
                "server '{}' uses stdio transport but has no command",
                config.name
            )));
        }
        Ok(Self {
            config: config.clone(),
            correlator: Correlator::new(),
            connected: Arc::new(AtomicBool::new(false)),
            stdin: Mutex::new(None),
            child: Mutex::new(None),
            tasks: SyncMutex::new(Vec::new()),
        })
    }

    async fn write_line<T: Serialize>(&self, message: &T) -> McpResult<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(McpError::NotConnected)?;
        let write = async {
            stdin.write_all(&line).await?;
            stdin.flush().await
        };
        match tokio::time::timeout(self.config.write_timeout(), write).await {
            Ok(result) => result.map_err(McpError::from),
            Err(_) => Err(McpError::Timeout(self.config.write_timeout())),
        }
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    async fn connect(&self) -> McpResult<()> {
        if self.is_connected() {
            return Err(McpError::AlreadyConnected);
        }
        let command = self.config.command.as_deref().unwrap_or_default();

        let mut cmd = Command::new(command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            McpError::closed(format!("failed to spawn '{}': {}", command, e))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::internal("failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::internal("failed to get stdout handle"))?;
        let stderr = child.stderr.take();

        let server = self.config.name.clone();
        let correlator = self.correlator.clone();
        let connected = Arc::clone(&self.connected);
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<McpMessage>(line) {
                            Ok(message) => {
                                correlator.dispatch(message);
                            }
                            Err(e) => debug!(server = %server, error = %e, "skipping non-protocol stdout line"),
                        }
                    }
                    Ok(None) => {
                        debug!(server = %server, "server process closed stdout");
                        break;
                    }
                    Err(e) => {
                        warn!(server = %server, error = %e, "error reading server stdout");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            correlator.fail_all(McpError::closed("server process exited"));
        });

        let mut tasks = vec![reader];
        if let Some(stderr) = stderr {
            let server = self.config.name.clone();
            tasks.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %server, "stderr: {}", line);
                }
            }));
        }

        *self.stdin.lock().await = Some(stdin);
        *self.child.lock().await = Some(child);
        *self.tasks.lock() = tasks;
        self.connected.store(true, Ordering::SeqCst);
        debug!(server = %self.config.name, command = %command, "spawned server process");
        Ok(())
    }

    async fn request(
        &self,
        request: McpRequest,
        cancel: &CancellationToken,
    ) -> McpResult<McpResponse> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        let slot = self.correlator.register(&request.id)?;
        self.write_line(&request).await?;
        slot.wait(self.config.read_timeout(), cancel).await
    }

    async fn notify(&self, notification: McpNotification) -> McpResult<()> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        self.write_line(&notification).await
    }

    async fn close(&self) -> McpResult<()> {
        self.connected.store(false, Ordering::SeqCst);

        // Closing stdin signals EOF to the server
        self.stdin.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!(server = %self.config.name, %status, "server process exited"),
                Ok(Err(e)) => warn!(server = %self.config.name, error = %e, "failed waiting for server process"),
                Err(_) => {
                    warn!(server = %self.config.name, "server process did not exit, killing");
                    child.kill().await.ok();
                }
            }
        }

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.correlator.fail_all(McpError::closed("connection closed"));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }
}
