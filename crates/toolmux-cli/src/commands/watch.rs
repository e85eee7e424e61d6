//! Long-running supervision command

use super::connect;
use anyhow::Result;
use std::time::Duration;
use toolmux_core::{ConnectionStats, Settings};
use tracing::info;

/// Keep servers connected and print statistics until interrupted
pub async fn watch(settings: Settings, interval_secs: u64) -> Result<()> {
    let manager = connect(settings).await?;
    let period = Duration::from_secs(interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let mut stats: Vec<_> = manager.get_all_stats().await.into_iter().collect();
                stats.sort_by(|a, b| a.0.cmp(&b.0));
                println!("{} of {} servers live", manager.get_active_server_count().await, stats.len());
                for (name, s) in &stats {
                    println!("  {}", format_stats(name, s));
                }
            }
        }
    }

    info!("interrupted, shutting down");
    manager.shutdown().await?;
    Ok(())
}

fn format_stats(name: &str, stats: &ConnectionStats) -> String {
    let latency = stats
        .avg_latency
        .map(|d| format!("{}ms", d.as_millis()))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<16} {:<4} requests={} ok={:.0}% avg={}",
        name,
        if stats.connected { "up" } else { "down" },
        stats.request_count,
        stats.success_rate() * 100.0,
        latency
    )
}
