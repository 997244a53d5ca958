//! Status events emitted by the sync manager.
//!
//! Every state change is broadcast on a tokio broadcast channel so any
//! number of subscribers can render progress without polling. Slow
//! subscribers lose old events rather than blocking the manager.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the status channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Type alias for the status event sender.
pub type StatusEventSender = broadcast::Sender<StatusEvent>;

/// Sync manager state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Uploading,
    Downloading,
    Syncing,
    /// A conflict is pending resolution.
    Conflict,
    Error,
}

impl SyncStatus {
    /// Whether an operation is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SyncStatus::Uploading | SyncStatus::Downloading | SyncStatus::Syncing
        )
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Uploading => "uploading",
            SyncStatus::Downloading => "downloading",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// A status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Percent complete, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(status: SyncStatus) -> Self {
        Self {
            status,
            message: None,
            progress: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Current status plus the channel that announces changes to it.
#[derive(Debug)]
pub struct StatusBus {
    tx: StatusEventSender,
    current: Mutex<SyncStatus>,
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

impl StatusBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            current: Mutex::new(SyncStatus::Idle),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> SyncStatus {
        self.current.lock().map(|s| *s).unwrap_or(SyncStatus::Error)
    }

    /// Record and broadcast an event. Having no subscribers is fine.
    pub fn emit(&self, event: StatusEvent) {
        if let Ok(mut current) = self.current.lock() {
            *current = event.status;
        }
        let _ = self.tx.send(event);
    }

    pub fn set(&self, status: SyncStatus) {
        self.emit(StatusEvent::new(status));
    }
}
