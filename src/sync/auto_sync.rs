//! Periodic "time to sync" signal.
//!
//! The timer does not sync by itself: it sends an [`AutoSyncTick`] and the
//! owner of the live snapshot calls `sync` with it. A tick is dropped when
//! the previous one has not been picked up yet.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Shortest allowed interval, in minutes.
pub const MIN_INTERVAL_MINUTES: u64 = 1;

/// Longest allowed interval, in minutes (one week).
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Interval for a configured number of minutes, clamped to the allowed range.
pub fn interval_for(minutes: u64) -> Duration {
    let minutes = minutes.clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES);
    Duration::from_secs(minutes.saturating_mul(60))
}

/// One auto-sync signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSyncTick {
    /// 1 for the first tick after start.
    pub sequence: u64,
    pub fired_at: DateTime<Utc>,
}

/// Handle to the background interval task.
#[derive(Debug, Default)]
pub struct AutoSyncTimer {
    handle: Option<JoinHandle<()>>,
    interval: Option<Duration>,
}

impl AutoSyncTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval`, replacing a running timer.
    ///
    /// The first tick fires one interval after start. The task ends when
    /// the receiver is dropped or [`stop`](Self::stop) is called.
    pub fn start(&mut self, interval: Duration) -> mpsc::Receiver<AutoSyncTick> {
        self.stop();
        let (tx, rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut sequence = 0u64;
            loop {
                ticker.tick().await;
                sequence += 1;
                let tick = AutoSyncTick {
                    sequence,
                    fired_at: Utc::now(),
                };
                match tx.try_send(tick) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!(sequence, "Previous auto-sync tick still pending, skipping");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        });

        debug!(interval_secs = interval.as_secs(), "Auto-sync started");
        self.handle = Some(handle);
        self.interval = Some(interval);
        rx
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Auto-sync stopped");
        }
        self.interval = None;
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl Drop for AutoSyncTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
