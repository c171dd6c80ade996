//! Stay-alive mode: no monitoring, just a periodic heartbeat so CI runners
//! that idle out inactive jobs keep the workflow alive.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::info;

use crate::config::KeepAliveConfig;

/// Log a heartbeat every `interval` until `max_duration` elapses.
/// With no limit this only returns when the process is killed.
/// Returns the number of heartbeats logged.
pub async fn keep_alive(interval: Duration, max_duration: Option<Duration>) -> u64 {
    let started = Instant::now();
    let mut beats = 0u64;
    info!(interval_secs = interval.as_secs(), max_secs = ?max_duration.map(|d| d.as_secs()), "keep-alive started");

    loop {
        let elapsed = started.elapsed();
        if let Some(limit) = max_duration {
            if elapsed >= limit {
                break;
            }
        }
        beats += 1;
        info!(elapsed_secs = elapsed.as_secs(), "keep-alive heartbeat");

        let wait = match max_duration {
            Some(limit) => interval.min(limit - elapsed),
            None => interval,
        };
        sleep(wait).await;
    }

    info!(elapsed_secs = started.elapsed().as_secs(), beats, "keep-alive finished");
    beats
}

pub async fn run_from_config(config: &KeepAliveConfig, max_override: Option<u64>) -> u64 {
    let max = max_override
        .or(config.max_duration_secs)
        .map(Duration::from_secs);
    keep_alive(Duration::from_secs(config.interval_secs), max).await
}
