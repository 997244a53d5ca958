//! Sync engine: settings, conflict handling and the manager that drives
//! pull, push and bidirectional sync against the active backend.

mod auto_sync;
mod config;
mod events;
mod manager;
mod merge;
mod response;

pub use auto_sync::{interval_for, AutoSyncTick, AutoSyncTimer, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES};
pub use config::{
    ConfigStore, SyncConfig, CONFIG_FILE, DEFAULT_SYNC_INTERVAL_MINUTES, MASTER_PASSWORD_FILE,
};
pub use events::{StatusBus, StatusEvent, StatusEventSender, SyncStatus, EVENT_CHANNEL_CAPACITY};
pub use manager::{Resolution, SyncManager, SyncOutcome, SyncState};
pub use merge::merge_snapshots;
pub use response::{ErrorPayload, SyncResponse};
