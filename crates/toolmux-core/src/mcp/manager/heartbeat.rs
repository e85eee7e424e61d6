//! Heartbeat supervision
//!
//! One supervisor task per heartbeat-enabled server id. It survives reloads
//! of its own server and exits on manager shutdown, explicit removal or
//! disable, or when the server's config disappears.

use super::{ConnectionManager, ManagerInner};
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::server_config::ServerConfig;
use std::sync::Weak;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle of a running supervisor
pub(crate) struct Supervisor {
    token: CancellationToken,
    interval: Duration,
}

impl Supervisor {
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}

impl ConnectionManager {
    /// Start supervision for `config.id` unless an equivalent supervisor runs
    pub(super) fn ensure_supervisor(&self, config: &ServerConfig) {
        let interval = config.heartbeat_interval();
        let mut supervisors = self.inner.supervisors.lock();
        if let Some(existing) = supervisors.get(&config.id) {
            if !existing.token.is_cancelled() && existing.interval == interval {
                return;
            }
            existing.cancel();
        }

        let token = self.inner.shutdown.child_token();
        supervisors.insert(
            config.id,
            Supervisor {
                token: token.clone(),
                interval,
            },
        );
        debug!(server = %config.name, ?interval, "starting heartbeat supervisor");
        tokio::spawn(supervise(
            std::sync::Arc::downgrade(&self.inner),
            config.id,
            config.name.clone(),
            interval,
            token,
        ));
    }

    /// Stop supervision for `id`, if any
    pub(super) fn stop_supervisor(&self, id: i64) {
        if let Some(supervisor) = self.inner.supervisors.lock().remove(&id) {
            supervisor.cancel();
        }
    }

    /// Reload `id` on behalf of its supervisor
    ///
    /// The token is checked again once the membership lock is held, so a
    /// remove or disable that won the lock first is not undone. Returns
    /// whether the reload ran.
    async fn reload_supervised(&self, id: i64, token: &CancellationToken) -> McpResult<bool> {
        let _membership = self.inner.membership.lock().await;
        if token.is_cancelled() {
            return Ok(false);
        }
        self.reload_locked(id).await.map(|()| true)
    }

    /// One heartbeat probe; a missing or disconnected connection fails it
    async fn probe(&self, id: i64, interval: Duration) -> McpResult<()> {
        let conn = self.get_connection(id).await.ok_or(McpError::NotConnected)?;
        if !conn.is_connected() {
            return Err(McpError::NotConnected);
        }
        let timeout = conn.config().read_timeout().min(interval);
        let cancel = self.inner.shutdown.child_token();
        match tokio::time::timeout(timeout, conn.ping(&cancel)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout(timeout)),
        }
    }
}

async fn supervise(
    inner: Weak<ManagerInner>,
    id: i64,
    name: String,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let manager = ConnectionManager { inner };

        let Err(e) = manager.probe(id, interval).await else {
            continue;
        };
        if token.is_cancelled() {
            break;
        }
        warn!(server = %name, id, error = %e, "heartbeat failed, reloading");
        if let Err(store_err) = manager
            .inner
            .store
            .update_connection_error(id, &e.to_string())
            .await
        {
            warn!(server = %name, error = %store_err, "failed to persist heartbeat error");
        }

        match manager.reload_supervised(id, &token).await {
            Ok(true) => info!(server = %name, id, "server reloaded after heartbeat failure"),
            Ok(false) => break,
            Err(McpError::ServerDisabled(_)) | Err(McpError::ServerNotFound(_)) => {
                info!(server = %name, id, "server gone or disabled, stopping supervision");
                token.cancel();
                break;
            }
            Err(e) => warn!(server = %name, id, error = %e, "reload failed, retrying next heartbeat"),
        }
    }
    debug!(server = %name, id, "heartbeat supervisor stopped");
}
