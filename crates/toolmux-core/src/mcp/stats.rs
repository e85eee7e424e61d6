//! Per-connection statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Statistics for one connection
///
/// Every request attempt goes through [`ConnectionStats::record`], so
/// `request_count == success_count + error_count` always holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// When the connection was last established
    pub connected_at: Option<DateTime<Utc>>,
    /// Last request attempt
    pub last_active_at: Option<DateTime<Utc>>,
    /// Total request attempts
    pub request_count: u64,
    /// Successful requests
    pub success_count: u64,
    /// Failed, timed-out or cancelled requests
    pub error_count: u64,
    /// Running latency average
    pub avg_latency: Option<Duration>,
    /// Whether the connection is live
    pub connected: bool,
}

impl ConnectionStats {
    /// Record one request attempt
    pub fn record(&mut self, latency: Duration, success: bool) {
        self.request_count += 1;
        if success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        self.avg_latency = Some(match self.avg_latency {
            Some(avg) => (avg + latency) / 2,
            None => latency,
        });
        self.last_active_at = Some(Utc::now());
    }

    /// Mark the connection established
    pub fn mark_connected(&mut self) {
        self.connected = true;
        self.connected_at = Some(Utc::now());
    }

    /// Mark the connection lost or closed
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    /// Clear counters and latency
    pub fn reset(&mut self) {
        self.request_count = 0;
        self.success_count = 0;
        self.error_count = 0;
        self.avg_latency = None;
    }

    /// Fraction of successful requests, 1.0 when idle
    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            1.0
        } else {
            self.success_count as f64 / self.request_count as f64
        }
    }
}
