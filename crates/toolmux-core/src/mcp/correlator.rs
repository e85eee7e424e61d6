//! Request/response correlation for asymmetric transports
//!
//! The process, push-stream and duplex-stream transports write a request and
//! read its response on different paths. Each outgoing request registers a
//! one-shot slot under its ID; the transport's reader task is the only writer
//! into those slots.

use super::error::{McpError, McpResult};
use super::protocol::{McpMessage, McpResponse, RequestId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type SlotSender = oneshot::Sender<McpResult<McpResponse>>;

/// Generates `"<server>-<n>"` request IDs
#[derive(Debug)]
pub struct RequestIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl RequestIdGenerator {
    /// Create a generator for one server
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            prefix: server_name.into(),
            next: AtomicU64::new(1),
        }
    }

    /// Next unique ID
    pub fn next_id(&self) -> RequestId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        RequestId::from(format!("{}-{}", self.prefix, n))
    }
}

/// Table of in-flight requests
#[derive(Debug, Clone, Default)]
pub struct Correlator {
    pending: Arc<Mutex<HashMap<String, SlotSender>>>,
}

impl Correlator {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot for `id`; must happen before the request is written
    pub fn register(&self, id: &RequestId) -> McpResult<PendingSlot> {
        let key = id.to_string();
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock();
        if pending.contains_key(&key) {
            return Err(McpError::invalid_request(format!(
                "duplicate request id {}",
                key
            )));
        }
        pending.insert(key.clone(), tx);
        Ok(PendingSlot {
            key,
            receiver: Some(rx),
            pending: Arc::clone(&self.pending),
        })
    }

    /// Route one inbound message; returns whether a waiter received it
    pub fn dispatch(&self, message: McpMessage) -> bool {
        match message {
            McpMessage::Response(response) => self.fulfill(response),
            McpMessage::Notification(notification) => {
                debug!(method = %notification.method, "received notification");
                false
            }
            McpMessage::Request(request) => {
                debug!(method = %request.method, "ignoring server-initiated request");
                false
            }
        }
    }

    /// Deliver a response to its waiter
    pub fn fulfill(&self, response: McpResponse) -> bool {
        let key = response.id.to_string();
        let sender = self.pending.lock().remove(&key);
        match sender {
            Some(sender) => sender.send(Ok(response)).is_ok(),
            None => {
                debug!(id = %key, "dropping response for unknown request");
                false
            }
        }
    }

    /// Fail every in-flight request, typically with `ConnectionClosed`
    pub fn fail_all(&self, error: McpError) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if !drained.is_empty() {
            warn!(count = drained.len(), error = %error, "failing pending requests");
        }
        for (_, sender) in drained {
            let _ = sender.send(Err(error.clone()));
        }
    }

    /// Number of in-flight requests
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// One registered in-flight request
///
/// Dropping the slot removes its table entry, whatever the outcome.
#[derive(Debug)]
pub struct PendingSlot {
    key: String,
    receiver: Option<oneshot::Receiver<McpResult<McpResponse>>>,
    pending: Arc<Mutex<HashMap<String, SlotSender>>>,
}

impl PendingSlot {
    /// Wait for fulfilment, cancellation or timeout
    pub async fn wait(
        mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> McpResult<McpResponse> {
        let Some(receiver) = self.receiver.take() else {
            return Err(McpError::internal("pending slot already consumed"));
        };

        tokio::select! {
            biased;
            outcome = receiver => match outcome {
                Ok(result) => result,
                Err(_) => Err(McpError::closed("response channel dropped")),
            },
            _ = cancel.cancelled() => Err(McpError::Cancelled),
            _ = tokio::time::sleep(timeout) => Err(McpError::Timeout(timeout)),
        }
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
    }
}
