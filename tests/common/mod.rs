//! Common test utilities for integration tests.
//!
//! Builders for snapshots and packages, plus a [`Device`] fixture: a
//! [`SyncManager`] with its own data directory, wired to a shared
//! [`InMemoryBackend`] so two devices can sync through one remote.
//!
//! # Example
//!
//! ```ignore
//! let remote = InMemoryBackend::new();
//! let laptop = Device::new(&remote);
//! let desktop = Device::new(&remote);
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use keysync::adapters::{InMemoryBackend, ReqwestHttpClient};
use keysync::backend::BackendType;
use keysync::models::{ApiKeyRecord, ConfigSnapshot, EncryptedPackage};
use keysync::sync::{ConfigStore, SyncManager};
use keysync::transport::{RetryPolicy, RetryingClient};
use tempfile::TempDir;

/// Master password shared by test devices. Strong enough to be accepted.
pub const PASSWORD: &str = "Correct-Horse-9";

/// Provider used by snapshot builders.
pub const PROVIDER: &str = "claude";

/// A device: a manager plus the directory holding its settings.
///
/// Keep the struct alive for the whole test; dropping it removes the
/// directory.
pub struct Device {
    pub dir: TempDir,
    pub manager: SyncManager,
}

impl Device {
    /// Enabled, unlocked device syncing through `remote`.
    pub fn new(remote: &InMemoryBackend) -> Self {
        Self::with_password(remote, PASSWORD)
    }

    pub fn with_password(remote: &InMemoryBackend, password: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let manager = SyncManager::new(ConfigStore::new(dir.path()))
            .unwrap()
            .with_backend(Arc::new(remote.clone()));
        manager.enable_sync().unwrap();
        manager.set_master_password(password).unwrap();
        Self { dir, manager }
    }

    /// Reopen the same directory, as a new process would.
    pub fn reopen(&self, remote: &InMemoryBackend) -> SyncManager {
        SyncManager::new(ConfigStore::new(self.dir.path()))
            .unwrap()
            .with_backend(Arc::new(remote.clone()))
    }
}

/// A record with a predictable secret derived from its alias.
pub fn record(alias: &str) -> ApiKeyRecord {
    ApiKeyRecord::new(alias, format!("sk-{}-secret", alias))
}

/// Snapshot holding `aliases` under [`PROVIDER`], in order.
pub fn snapshot(aliases: &[&str]) -> ConfigSnapshot {
    let mut snapshot = ConfigSnapshot::new();
    for alias in aliases {
        snapshot.provider_mut(PROVIDER).upsert(record(alias));
    }
    snapshot
}

/// Aliases under [`PROVIDER`], in stored order.
pub fn aliases(snapshot: &ConfigSnapshot) -> Vec<String> {
    snapshot
        .provider(PROVIDER)
        .map(|p| p.keys.iter().map(|k| k.alias.clone()).collect())
        .unwrap_or_default()
}

/// A real package for `aliases`, encrypted under [`PASSWORD`].
pub fn package(aliases: &[&str], device_id: &str) -> EncryptedPackage {
    keysync::crypto::encrypt(&snapshot(aliases), PASSWORD, device_id).unwrap()
}

/// Millisecond backoff so retry tests finish quickly.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

/// Retrying client over real HTTP, for tests against a wiremock server.
pub fn http_client(backend: BackendType) -> RetryingClient {
    RetryingClient::new(Arc::new(ReqwestHttpClient::new()), backend).with_policy(fast_retry())
}

/// Let remote timestamps move past the last recorded sync time.
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
