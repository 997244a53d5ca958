//! Sync orchestration.
//!
//! ```text
//!           pull / push / sync / resolve
//! Idle ──▶ Downloading | Uploading | Syncing ──▶ Idle
//!                         │   │
//!                         │   └── diverged, remote newer ──▶ Conflict ──resolve──▶ Idle
//!                         └────── failure ──────────────────▶ Error
//! ```
//!
//! The manager never holds the caller's snapshot: every operation takes
//! the local snapshot as input and any snapshot the caller should adopt
//! comes back in the [`SyncOutcome`]. Operations are not serialized
//! internally; callers run one at a time.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::auto_sync::{interval_for, AutoSyncTick, AutoSyncTimer};
use super::config::{ConfigStore, SyncConfig};
use super::events::{StatusBus, StatusEvent, SyncStatus};
use super::merge::merge_snapshots;
use crate::adapters::ReqwestHttpClient;
use crate::auth::SessionManager;
use crate::backend::{
    create_backend, BackendContext, BackendStatus, BackendType, PullOutcome, SyncBackend,
};
use crate::crypto::{
    self, hash_password, password_strength, verify_password, PasswordHash, PasswordStrength,
};
use crate::error::{
    AuthError, ConfigError, ErrorContext, NetworkError, SyncError, SyncResult, SystemError,
};
use crate::models::{ConfigSnapshot, ConfigVersion, ConflictData, EncryptedPackage};
use crate::traits::{AccessTokenProvider, HttpClient};
use crate::transport::RetryPolicy;

/// How to settle a pending conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Overwrite the remote copy with the local snapshot.
    Local,
    /// Adopt the remote snapshot without writing back.
    Remote,
    /// Merge both and write the result back.
    Merge,
}

impl std::str::FromStr for Resolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Resolution::Local),
            "remote" => Ok(Resolution::Remote),
            "merge" => Ok(Resolution::Merge),
            other => Err(ConfigError::InvalidValue {
                field: "resolution".to_string(),
                message: format!("'{}' is not one of local, remote, merge", other),
            }),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Resolution::Local => "local",
            Resolution::Remote => "remote",
            Resolution::Merge => "merge",
        };
        f.write_str(s)
    }
}

/// Result of a successful sync operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum SyncOutcome {
    /// Nothing stored remotely yet.
    NoRemoteData,
    /// Local and remote checksums match.
    InSync,
    /// Local differs but the remote copy has not changed since the last
    /// sync. Pushing publishes the local changes.
    LocalAhead,
    Pushed { timestamp: String },
    /// Both sides changed. Settle with [`SyncManager::resolve_conflict`].
    Conflict { conflict: ConflictData },
    Resolved {
        resolution: Resolution,
        /// The snapshot the caller should persist.
        snapshot: ConfigSnapshot,
        /// Remote write time, when the resolution pushed.
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
}

impl SyncOutcome {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncOutcome::Conflict { .. })
    }

    /// Snapshot the caller should persist, if the operation produced one.
    pub fn snapshot(&self) -> Option<&ConfigSnapshot> {
        match self {
            SyncOutcome::Resolved { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            SyncOutcome::NoRemoteData => "No remote data",
            SyncOutcome::InSync => "Already in sync",
            SyncOutcome::LocalAhead => "Local changes not yet pushed",
            SyncOutcome::Pushed { .. } => "Pushed",
            SyncOutcome::Conflict { .. } => "Remote changes conflict with local changes",
            SyncOutcome::Resolved { .. } => "Conflict resolved",
        }
    }
}

/// Point-in-time view of the manager for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub status: SyncStatus,
    pub enabled: bool,
    pub backend_type: BackendType,
    pub device_id: String,
    pub device_name: String,
    pub last_sync_time: Option<String>,
    pub master_password_set: bool,
    pub unlocked: bool,
    pub auto_sync_running: bool,
    pub pending_conflict: Option<ConflictData>,
}

enum Comparison {
    InSync,
    LocalAhead,
    Diverged(ConflictData),
}

/// Owns sync settings, the master password and the active backend.
///
/// Construct one per process and call [`shutdown`](Self::shutdown) when
/// done; it stops the auto-sync timer and wipes the master password.
pub struct SyncManager {
    store: ConfigStore,
    config: Mutex<SyncConfig>,
    password_hash: Mutex<Option<PasswordHash>>,
    password: Mutex<Option<Zeroizing<String>>>,
    conflict: Mutex<Option<ConflictData>>,
    status: StatusBus,
    http: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    session: Option<SessionManager>,
    backend: Mutex<Option<Arc<dyn SyncBackend>>>,
    /// Set when the backend was supplied by the caller and must survive
    /// settings changes.
    backend_pinned: bool,
    auto_sync: Mutex<AutoSyncTimer>,
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("dir", &self.store.dir())
            .field("status", &self.status.current())
            .field("backend_pinned", &self.backend_pinned)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whether `remote` is strictly later than the last sync. Never having
/// synced, or an unreadable timestamp on either side, counts as newer.
fn remote_is_newer(remote: &str, last_sync: Option<&str>) -> bool {
    let parse = |s: &str| DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc));
    match (parse(remote), last_sync.map(parse)) {
        (Ok(remote), Some(Ok(last))) => remote > last,
        _ => true,
    }
}

/// The later of two timestamps, preferring `a` when either is unreadable.
fn later_of(a: String, b: &str) -> String {
    let parse = |s: &str| DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc));
    match (parse(&a), parse(b)) {
        (Ok(ta), Ok(tb)) if tb > ta => b.to_string(),
        _ => a,
    }
}

impl SyncManager {
    /// Load settings from `store` and use the default HTTP client.
    pub fn new(store: ConfigStore) -> SyncResult<Self> {
        let config = store.load_config()?;
        let password_hash = store.load_master_password()?;
        Ok(Self {
            store,
            config: Mutex::new(config),
            password_hash: Mutex::new(password_hash),
            password: Mutex::new(None),
            conflict: Mutex::new(None),
            status: StatusBus::default(),
            http: Arc::new(ReqwestHttpClient::new()),
            retry: RetryPolicy::default(),
            session: None,
            backend: Mutex::new(None),
            backend_pinned: false,
            auto_sync: Mutex::new(AutoSyncTimer::new()),
        })
    }

    pub fn with_http(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = http;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Session used by the server backend.
    pub fn with_session(mut self, session: SessionManager) -> Self {
        self.session = Some(session);
        self
    }

    /// Use `backend` instead of building one from the settings.
    pub fn with_backend(mut self, backend: Arc<dyn SyncBackend>) -> Self {
        self.backend = Mutex::new(Some(backend));
        self.backend_pinned = true;
        self
    }

    pub fn session(&self) -> Option<&SessionManager> {
        self.session.as_ref()
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn get_config(&self) -> SyncConfig {
        lock(&self.config).clone()
    }

    /// Validate, persist and apply new settings.
    pub fn save_config(&self, config: SyncConfig) -> SyncResult<()> {
        config.validate()?;
        self.store.save_config(&config)?;

        let backend_changed = {
            let mut current = lock(&self.config);
            let changed = current.backend_type != config.backend_type
                || current.backends != config.backends;
            *current = config;
            changed
        };
        if backend_changed && !self.backend_pinned {
            debug!("Backend settings changed, dropping cached backend");
            *lock(&self.backend) = None;
        }
        Ok(())
    }

    /// Apply `f` to a copy of the settings and save the result.
    pub fn update_config<F>(&self, f: F) -> SyncResult<SyncConfig>
    where
        F: FnOnce(&mut SyncConfig),
    {
        let mut config = self.get_config();
        f(&mut config);
        self.save_config(config.clone())?;
        Ok(config)
    }

    pub fn enable_sync(&self) -> SyncResult<()> {
        self.update_config(|c| c.enabled = true)?;
        info!("Sync enabled");
        Ok(())
    }

    /// Turn sync off, stop timers and forget the master password.
    pub async fn disable_sync(&self) -> SyncResult<()> {
        self.update_config(|c| {
            c.enabled = false;
            c.auto_sync = false;
        })?;
        self.teardown().await;
        info!("Sync disabled");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Master password
    // ------------------------------------------------------------------

    /// Store a verifier for `password` and unlock with it.
    ///
    /// Data already pushed under a previous password can no longer be
    /// decrypted; push again after changing it.
    pub fn set_master_password(&self, password: &str) -> SyncResult<PasswordStrength> {
        let strength = password_strength(password);
        if !strength.valid {
            return Err(AuthError::WeakPassword {
                feedback: strength.feedback.clone(),
            }
            .into());
        }

        let hash = hash_password(password, None);
        self.store.save_master_password(&hash)?;
        *lock(&self.password_hash) = Some(hash);
        *lock(&self.password) = Some(Zeroizing::new(password.to_string()));
        info!(strength = strength.label(), "Master password set");
        Ok(strength)
    }

    /// Check `password` against the stored verifier and unlock on success.
    pub fn verify_master_password(&self, password: &str) -> SyncResult<()> {
        let hash = lock(&self.password_hash)
            .clone()
            .ok_or(AuthError::MasterPasswordNotSet)?;

        if !verify_password(password, &hash.hash, &hash.salt) {
            warn!("Master password verification failed");
            return Err(AuthError::MasterPasswordInvalid.into());
        }

        *lock(&self.password) = Some(Zeroizing::new(password.to_string()));
        debug!("Master password verified");
        Ok(())
    }

    pub fn change_master_password(&self, old: &str, new: &str) -> SyncResult<PasswordStrength> {
        self.verify_master_password(old)?;
        self.set_master_password(new)
    }

    /// Forget the in-memory master password.
    pub fn forget_master_password(&self) {
        *lock(&self.password) = None;
    }

    pub fn has_master_password(&self) -> bool {
        lock(&self.password_hash).is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        lock(&self.password).is_some()
    }

    fn require_password(&self) -> SyncResult<Zeroizing<String>> {
        if let Some(password) = lock(&self.password).clone() {
            return Ok(password);
        }
        if self.has_master_password() {
            Err(AuthError::MasterPasswordRequired.into())
        } else {
            Err(AuthError::MasterPasswordNotSet.into())
        }
    }

    fn require_enabled(&self) -> SyncResult<()> {
        if lock(&self.config).enabled {
            Ok(())
        } else {
            Err(ConfigError::SyncDisabled.into())
        }
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status.subscribe()
    }

    pub fn pending_conflict(&self) -> Option<ConflictData> {
        lock(&self.conflict).clone()
    }

    pub fn status(&self) -> SyncState {
        let config = self.get_config();
        SyncState {
            status: self.status.current(),
            enabled: config.enabled,
            backend_type: self.backend_type(),
            device_id: config.device_id,
            device_name: config.device_name,
            last_sync_time: config.last_sync_time,
            master_password_set: self.has_master_password(),
            unlocked: self.is_unlocked(),
            auto_sync_running: self.is_auto_sync_running(),
            pending_conflict: self.pending_conflict(),
        }
    }

    fn backend_type(&self) -> BackendType {
        match lock(&self.backend).as_ref() {
            Some(backend) => backend.backend_type(),
            None => lock(&self.config).backend_type,
        }
    }

    // ------------------------------------------------------------------
    // Backends
    // ------------------------------------------------------------------

    fn build_backend(&self, backend_type: BackendType) -> SyncResult<Box<dyn SyncBackend>> {
        let config = self.get_config();
        let ctx = BackendContext {
            http: self.http.clone(),
            retry: self.retry,
            device_id: config.device_id.clone(),
            tokens: self
                .session
                .clone()
                .map(|s| Arc::new(s) as Arc<dyn AccessTokenProvider>),
        };
        create_backend(backend_type, &config.backends, &ctx)
    }

    fn backend(&self) -> SyncResult<Arc<dyn SyncBackend>> {
        if let Some(backend) = lock(&self.backend).clone() {
            return Ok(backend);
        }
        let backend_type = lock(&self.config).backend_type;
        let backend: Arc<dyn SyncBackend> = Arc::from(self.build_backend(backend_type)?);
        *lock(&self.backend) = Some(backend.clone());
        Ok(backend)
    }

    /// Connect to a backend and report its remote state.
    ///
    /// Uses the configured backend when `backend_type` is `None`. Does not
    /// need the master password or sync to be enabled.
    pub async fn test_connection(
        &self,
        backend_type: Option<BackendType>,
    ) -> SyncResult<BackendStatus> {
        let target = backend_type.unwrap_or_else(|| self.backend_type());
        let result: SyncResult<BackendStatus> = async {
            let backend = if target == self.backend_type() {
                self.backend()?
            } else {
                Arc::from(self.build_backend(target)?)
            };
            if !backend.connect().await? {
                return Ok(BackendStatus::default());
            }
            backend.get_status().await
        }
        .await;

        result.map_err(|e| self.attach_context("test_connection", target, e))
    }

    // ------------------------------------------------------------------
    // Sync operations
    // ------------------------------------------------------------------

    /// Fetch the remote copy and compare it with `local`.
    ///
    /// Never modifies either side. A divergence with a remote copy newer
    /// than the last sync becomes the pending conflict.
    pub async fn pull(&self, local: &ConfigSnapshot) -> SyncResult<SyncOutcome> {
        self.run("pull", SyncStatus::Downloading, self.pull_inner(local))
            .await
    }

    /// Encrypt `snapshot` and overwrite the remote copy.
    pub async fn push(&self, snapshot: &ConfigSnapshot) -> SyncResult<SyncOutcome> {
        self.run("push", SyncStatus::Uploading, self.push_inner(snapshot))
            .await
    }

    /// Pull, then push unless the sides match or conflict.
    pub async fn sync(&self, local: &ConfigSnapshot) -> SyncResult<SyncOutcome> {
        self.run("sync", SyncStatus::Syncing, self.sync_inner(local))
            .await
    }

    /// Settle a conflict. Clears the pending conflict on success only.
    ///
    /// Works without a pending conflict too, e.g. in a new process.
    pub async fn resolve_conflict(
        &self,
        resolution: Resolution,
        local: &ConfigSnapshot,
    ) -> SyncResult<SyncOutcome> {
        self.run(
            "resolve_conflict",
            SyncStatus::Syncing,
            self.resolve_inner(resolution, local),
        )
        .await
    }

    async fn run<F>(
        &self,
        operation: &'static str,
        busy: SyncStatus,
        fut: F,
    ) -> SyncResult<SyncOutcome>
    where
        F: Future<Output = SyncResult<SyncOutcome>>,
    {
        self.status.emit(StatusEvent::new(busy).with_progress(0));

        match fut.await {
            Ok(outcome) => {
                let event = if outcome.is_conflict() {
                    StatusEvent::new(SyncStatus::Conflict)
                } else {
                    StatusEvent::new(SyncStatus::Idle).with_progress(100)
                };
                self.status.emit(event.with_message(outcome.describe()));
                Ok(outcome)
            }
            Err(err) => {
                let backend = self.backend_type();
                warn!(operation, backend = %backend, error = %err, "Sync operation failed");
                self.status.emit(
                    StatusEvent::new(SyncStatus::Error)
                        .with_message(format!("{} failed", operation))
                        .with_error(err.user_message()),
                );
                Err(self.attach_context(operation, backend, err))
            }
        }
    }

    fn attach_context(&self, operation: &str, backend: BackendType, err: SyncError) -> SyncError {
        let mut ctx = ErrorContext::new(operation).with_backend(backend.as_str());
        if let SyncError::Network(NetworkError::RetriesExhausted { attempts, .. }) = err.inner() {
            ctx = ctx.with_retry_count(attempts.saturating_sub(1));
        }
        err.with_context(ctx)
    }

    fn progress(&self, status: SyncStatus, percent: u8, message: &str) {
        self.status
            .emit(StatusEvent::new(status).with_progress(percent).with_message(message));
    }

    async fn pull_inner(&self, local: &ConfigSnapshot) -> SyncResult<SyncOutcome> {
        self.require_enabled()?;
        let password = self.require_password()?;

        let Some((package, remote)) = self.fetch_remote(&password).await? else {
            info!("No remote data to pull");
            return Ok(SyncOutcome::NoRemoteData);
        };
        self.progress(SyncStatus::Downloading, 60, "Comparing");

        match self.compare(local, &package, &remote)? {
            Comparison::InSync => {
                self.record_sync(now_rfc3339())?;
                Ok(SyncOutcome::InSync)
            }
            Comparison::LocalAhead => {
                self.record_sync(now_rfc3339())?;
                Ok(SyncOutcome::LocalAhead)
            }
            Comparison::Diverged(conflict) => Ok(self.raise_conflict(conflict)),
        }
    }

    async fn push_inner(&self, snapshot: &ConfigSnapshot) -> SyncResult<SyncOutcome> {
        self.require_enabled()?;
        let password = self.require_password()?;
        let timestamp = self.push_snapshot(snapshot, &password).await?;
        Ok(SyncOutcome::Pushed { timestamp })
    }

    async fn sync_inner(&self, local: &ConfigSnapshot) -> SyncResult<SyncOutcome> {
        self.require_enabled()?;
        let password = self.require_password()?;

        let Some((package, remote)) = self.fetch_remote(&password).await? else {
            info!("No remote data, pushing local snapshot");
            let timestamp = self.push_snapshot(local, &password).await?;
            return Ok(SyncOutcome::Pushed { timestamp });
        };
        self.progress(SyncStatus::Syncing, 50, "Comparing");

        match self.compare(local, &package, &remote)? {
            Comparison::InSync => {
                self.record_sync(now_rfc3339())?;
                Ok(SyncOutcome::InSync)
            }
            Comparison::Diverged(conflict) => Ok(self.raise_conflict(conflict)),
            Comparison::LocalAhead => {
                let timestamp = self.push_snapshot(local, &password).await?;
                Ok(SyncOutcome::Pushed { timestamp })
            }
        }
    }

    async fn resolve_inner(
        &self,
        resolution: Resolution,
        local: &ConfigSnapshot,
    ) -> SyncResult<SyncOutcome> {
        self.require_enabled()?;
        let password = self.require_password()?;

        let outcome = match resolution {
            Resolution::Local => {
                let timestamp = self.push_snapshot(local, &password).await?;
                SyncOutcome::Resolved {
                    resolution,
                    snapshot: local.clone(),
                    timestamp: Some(timestamp),
                }
            }
            Resolution::Remote => match self.fetch_remote(&password).await? {
                Some((_, remote)) => {
                    self.record_sync(now_rfc3339())?;
                    SyncOutcome::Resolved {
                        resolution,
                        snapshot: remote,
                        timestamp: None,
                    }
                }
                None => {
                    info!("Remote copy is gone, nothing to adopt");
                    SyncOutcome::NoRemoteData
                }
            },
            Resolution::Merge => {
                let merged = match self.fetch_remote(&password).await? {
                    Some((_, remote)) => merge_snapshots(local, &remote),
                    None => local.clone(),
                };
                self.progress(SyncStatus::Syncing, 60, "Merged");
                let timestamp = self.push_snapshot(&merged, &password).await?;
                SyncOutcome::Resolved {
                    resolution,
                    snapshot: merged,
                    timestamp: Some(timestamp),
                }
            }
        };

        if lock(&self.conflict).take().is_some() {
            info!(%resolution, "Conflict resolved");
        }
        Ok(outcome)
    }

    /// Pull, validate and decrypt the remote package.
    async fn fetch_remote(
        &self,
        password: &Zeroizing<String>,
    ) -> SyncResult<Option<(EncryptedPackage, ConfigSnapshot)>> {
        let backend = self.backend()?;
        let package = match backend.pull().await? {
            PullOutcome::NotFound => return Ok(None),
            PullOutcome::Found(package) => package,
        };
        crypto::check_package(&package)?;
        debug!(
            remote_device = %package.device_id,
            timestamp = %package.timestamp,
            "Fetched remote package"
        );

        let (pkg, pw) = (package.clone(), password.clone());
        let snapshot = tokio::task::spawn_blocking(move || crypto::decrypt(&pkg, &pw))
            .await
            .map_err(|e| SystemError::TaskFailed {
                message: e.to_string(),
            })??;
        Ok(Some((package, snapshot)))
    }

    /// Encrypt and upload, then record the sync time.
    ///
    /// Conflict gating compares against package timestamps, so the
    /// recorded time is never earlier than the package just written even
    /// when the backend reports a coarser or lagging receipt.
    async fn push_snapshot(
        &self,
        snapshot: &ConfigSnapshot,
        password: &Zeroizing<String>,
    ) -> SyncResult<String> {
        if let Some((provider, alias)) = snapshot.find_duplicate_alias() {
            return Err(ConfigError::InvalidValue {
                field: format!("providers.{}", provider),
                message: format!("duplicate alias '{}'", alias),
            }
            .into());
        }

        let device_id = lock(&self.config).device_id.clone();
        let (snap, pw) = (snapshot.clone(), password.clone());
        let package = tokio::task::spawn_blocking(move || crypto::encrypt(&snap, &pw, &device_id))
            .await
            .map_err(|e| SystemError::TaskFailed {
                message: e.to_string(),
            })??;

        let receipt = self.backend()?.push(&package).await?;
        info!(timestamp = %receipt.timestamp, keys = snapshot.key_count(), "Pushed snapshot");
        let synced_at = later_of(receipt.timestamp, &package.timestamp);
        self.record_sync(synced_at.clone())?;
        Ok(synced_at)
    }

    fn compare(
        &self,
        local: &ConfigSnapshot,
        package: &EncryptedPackage,
        remote: &ConfigSnapshot,
    ) -> SyncResult<Comparison> {
        let local_checksum = crypto::snapshot_checksum(local)?;
        if local_checksum == package.checksum {
            return Ok(Comparison::InSync);
        }

        let config = self.get_config();
        if !remote_is_newer(&package.timestamp, config.last_sync_time.as_deref()) {
            return Ok(Comparison::LocalAhead);
        }

        let local_timestamp = local
            .providers
            .values()
            .flat_map(|p| p.keys.iter().map(|k| k.last_modified()))
            .max()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(now_rfc3339);

        Ok(Comparison::Diverged(ConflictData {
            local_version: ConfigVersion {
                timestamp: local_timestamp,
                device_id: config.device_id,
                checksum: local_checksum,
                key_count: local.key_count(),
            },
            remote_version: ConfigVersion {
                timestamp: package.timestamp.clone(),
                device_id: package.device_id.clone(),
                checksum: package.checksum.clone(),
                key_count: remote.key_count(),
            },
        }))
    }

    fn raise_conflict(&self, conflict: ConflictData) -> SyncOutcome {
        info!(
            local_keys = conflict.local_version.key_count,
            remote_keys = conflict.remote_version.key_count,
            remote_device = %conflict.remote_version.device_id,
            "Sync conflict detected"
        );
        *lock(&self.conflict) = Some(conflict.clone());
        SyncOutcome::Conflict { conflict }
    }

    fn record_sync(&self, timestamp: String) -> SyncResult<()> {
        self.update_config(|c| c.last_sync_time = Some(timestamp))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Auto-sync and teardown
    // ------------------------------------------------------------------

    /// Start the auto-sync timer at the configured interval.
    ///
    /// Each tick on the returned channel means "call `sync` now".
    pub fn start_auto_sync(&self) -> mpsc::Receiver<AutoSyncTick> {
        let minutes = lock(&self.config).sync_interval_minutes;
        self.start_auto_sync_every(interval_for(minutes))
    }

    pub fn start_auto_sync_every(&self, interval: Duration) -> mpsc::Receiver<AutoSyncTick> {
        lock(&self.auto_sync).start(interval)
    }

    pub fn stop_auto_sync(&self) {
        lock(&self.auto_sync).stop();
    }

    pub fn is_auto_sync_running(&self) -> bool {
        lock(&self.auto_sync).is_running()
    }

    /// Stop timers, wipe the master password and drop backend state.
    pub async fn shutdown(&self) {
        self.teardown().await;
        debug!("Sync manager shut down");
    }

    async fn teardown(&self) {
        self.stop_auto_sync();
        self.forget_master_password();
        *lock(&self.conflict) = None;
        if let Some(session) = &self.session {
            session.shutdown();
        }
        let backend = lock(&self.backend).clone();
        if let Some(backend) = backend {
            backend.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBackend;
    use crate::models::ApiKeyRecord;
    use tempfile::TempDir;

    const PASSWORD: &str = "Correct-Horse-9";

    fn manager(dir: &TempDir, backend: &InMemoryBackend) -> SyncManager {
        let m = SyncManager::new(ConfigStore::new(dir.path()))
            .unwrap()
            .with_backend(Arc::new(backend.clone()));
        m.enable_sync().unwrap();
        m.set_master_password(PASSWORD).unwrap();
        m
    }

    fn snapshot(aliases: &[&str]) -> ConfigSnapshot {
        let mut s = ConfigSnapshot::new();
        for alias in aliases {
            s.provider_mut("claude")
                .upsert(ApiKeyRecord::new(*alias, format!("sk-{}", alias)));
        }
        s
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!("merge".parse::<Resolution>().unwrap(), Resolution::Merge);
        assert_eq!("LOCAL".parse::<Resolution>().unwrap(), Resolution::Local);
        assert!("both".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_remote_is_newer() {
        assert!(remote_is_newer("2024-01-02T00:00:00Z", None));
        assert!(remote_is_newer("2024-01-02T00:00:00Z", Some("2024-01-01T00:00:00Z")));
        assert!(!remote_is_newer("2024-01-01T00:00:00Z", Some("2024-01-01T00:00:00Z")));
        assert!(!remote_is_newer("2024-01-01T00:00:00Z", Some("2024-01-02T00:00:00+00:00")));
        assert!(remote_is_newer("2024-01-01T00:00:00Z", Some("garbage")));
    }

    #[test]
    fn test_later_of_prefers_finer_package_time() {
        let package = "2024-01-01T00:00:03.225Z";
        assert_eq!(later_of("2024-01-01T00:00:03Z".to_string(), package), package);
        assert_eq!(
            later_of("2024-01-01T00:00:04Z".to_string(), package),
            "2024-01-01T00:00:04Z"
        );
        assert_eq!(later_of("not a time".to_string(), package), "not a time");
    }

    #[tokio::test]
    async fn test_operations_need_enabled_sync() {
        let dir = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let m = manager(&dir, &backend);
        m.update_config(|c| c.enabled = false).unwrap();

        let err = m.push(&snapshot(&["a"])).await.unwrap_err();
        assert!(matches!(err.inner(), SyncError::Config(ConfigError::SyncDisabled)));
        assert_eq!(backend.push_count(), 0);
    }

    #[tokio::test]
    async fn test_operations_need_unlocked_password() {
        let dir = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let m = manager(&dir, &backend);
        m.forget_master_password();

        let err = m.pull(&snapshot(&["a"])).await.unwrap_err();
        assert!(matches!(
            err.inner(),
            SyncError::Auth(AuthError::MasterPasswordRequired)
        ));
        assert_eq!(backend.pull_count(), 0);
        assert_eq!(m.status().status, SyncStatus::Error);
    }

    #[tokio::test]
    async fn test_missing_password_reported_as_not_set() {
        let dir = TempDir::new().unwrap();
        let m = SyncManager::new(ConfigStore::new(dir.path()))
            .unwrap()
            .with_backend(Arc::new(InMemoryBackend::new()));
        m.enable_sync().unwrap();

        let err = m.sync(&snapshot(&["a"])).await.unwrap_err();
        assert!(matches!(
            err.inner(),
            SyncError::Auth(AuthError::MasterPasswordNotSet)
        ));
    }

    #[test]
    fn test_master_password_lifecycle() {
        let dir = TempDir::new().unwrap();
        let m = SyncManager::new(ConfigStore::new(dir.path())).unwrap();

        let err = m.set_master_password("short").unwrap_err();
        assert!(matches!(err, SyncError::Auth(AuthError::WeakPassword { .. })));
        assert!(!m.has_master_password());

        m.set_master_password(PASSWORD).unwrap();
        assert!(m.is_unlocked());
        m.forget_master_password();
        assert!(!m.is_unlocked());

        assert!(matches!(
            m.verify_master_password("wrong-password").unwrap_err(),
            SyncError::Auth(AuthError::MasterPasswordInvalid)
        ));
        m.verify_master_password(PASSWORD).unwrap();
        assert!(m.is_unlocked());

        // A new manager on the same directory sees the stored verifier.
        let reopened = SyncManager::new(ConfigStore::new(dir.path())).unwrap();
        assert!(reopened.has_master_password());
        assert!(!reopened.is_unlocked());
        reopened.verify_master_password(PASSWORD).unwrap();
    }

    #[test]
    fn test_change_master_password_needs_old_one() {
        let dir = TempDir::new().unwrap();
        let m = SyncManager::new(ConfigStore::new(dir.path())).unwrap();
        m.set_master_password(PASSWORD).unwrap();

        assert!(m.change_master_password("nope-nope", "Another-Pass-7").is_err());
        m.change_master_password(PASSWORD, "Another-Pass-7").unwrap();
        m.forget_master_password();
        assert!(m.verify_master_password(PASSWORD).is_err());
        m.verify_master_password("Another-Pass-7").unwrap();
    }

    #[tokio::test]
    async fn test_push_records_remote_timestamp() {
        let dir = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let m = manager(&dir, &backend);

        let outcome = m.push(&snapshot(&["a"])).await.unwrap();
        let SyncOutcome::Pushed { timestamp } = outcome else {
            panic!("expected push, got {:?}", outcome);
        };
        assert_eq!(m.get_config().last_sync_time, Some(timestamp.clone()));
        assert_eq!(backend.package().unwrap().timestamp, timestamp);
        assert_eq!(m.status().status, SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_push_rejects_duplicate_alias() {
        let dir = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let m = manager(&dir, &backend);

        let mut s = snapshot(&["a"]);
        s.provider_mut("claude").keys.push(ApiKeyRecord::new("a", "other"));

        let err = m.push(&s).await.unwrap_err();
        assert!(matches!(err.inner(), SyncError::Config(ConfigError::InvalidValue { .. })));
        assert_eq!(backend.push_count(), 0);
    }

    #[tokio::test]
    async fn test_pull_without_remote_is_noop() {
        let dir = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let m = manager(&dir, &backend);

        assert_eq!(m.pull(&snapshot(&["a"])).await.unwrap(), SyncOutcome::NoRemoteData);
        assert!(m.get_config().last_sync_time.is_none());
        assert_eq!(backend.push_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_without_remote_pushes() {
        let dir = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let m = manager(&dir, &backend);

        let outcome = m.sync(&snapshot(&["a"])).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Pushed { .. }));
        assert_eq!(backend.push_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_after_push_is_in_sync() {
        let dir = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let m = manager(&dir, &backend);
        let s = snapshot(&["a", "b"]);

        m.push(&s).await.unwrap();
        assert_eq!(m.sync(&s).await.unwrap(), SyncOutcome::InSync);
        assert_eq!(backend.push_count(), 1);
    }

    #[tokio::test]
    async fn test_local_change_after_sync_is_pushed() {
        let dir = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let m = manager(&dir, &backend);

        m.push(&snapshot(&["a"])).await.unwrap();
        let outcome = m.sync(&snapshot(&["a", "b"])).await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Pushed { .. }));
        assert!(m.pending_conflict().is_none());
    }

    #[tokio::test]
    async fn test_pull_reports_local_ahead() {
        let dir = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let m = manager(&dir, &backend);

        m.push(&snapshot(&["a"])).await.unwrap();
        let outcome = m.pull(&snapshot(&["a", "b"])).await.unwrap();

        assert_eq!(outcome, SyncOutcome::LocalAhead);
        assert_eq!(backend.push_count(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_sets_error_and_context() {
        let dir = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let m = manager(&dir, &backend);
        let mut events = m.subscribe();

        backend.fail_next(NetworkError::RetriesExhausted {
            backend: "server".to_string(),
            attempts: 4,
            last_error: "HTTP 503".to_string(),
        });
        let err = m.pull(&snapshot(&["a"])).await.unwrap_err();

        let ctx = err.context().unwrap();
        assert_eq!(ctx.operation, "pull");
        assert_eq!(ctx.backend.as_deref(), Some("server"));
        assert_eq!(ctx.retry_count, 3);

        assert_eq!(events.recv().await.unwrap().status, SyncStatus::Downloading);
        let last = events.recv().await.unwrap();
        assert_eq!(last.status, SyncStatus::Error);
        assert!(last.error.is_some());
    }

    #[tokio::test]
    async fn test_auto_sync_ticks_and_stops() {
        let dir = TempDir::new().unwrap();
        let m = manager(&dir, &InMemoryBackend::new());

        let mut ticks = m.start_auto_sync_every(Duration::from_millis(20));
        assert_eq!(ticks.recv().await.unwrap().sequence, 1);
        assert!(m.is_auto_sync_running());

        m.shutdown().await;
        assert!(!m.is_auto_sync_running());
        assert!(!m.is_unlocked());
        assert!(ticks.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_disable_sync_forgets_password() {
        let dir = TempDir::new().unwrap();
        let m = manager(&dir, &InMemoryBackend::new());

        m.disable_sync().await.unwrap();
        let state = m.status();
        assert!(!state.enabled);
        assert!(!state.unlocked);
        assert!(state.master_password_set);
    }

    #[test]
    fn test_save_config_drops_built_backend() {
        let dir = TempDir::new().unwrap();
        let m = SyncManager::new(ConfigStore::new(dir.path())).unwrap();
        m.update_config(|c| {
            c.backend_type = BackendType::Webdav;
            c.backends.webdav.url = "https://dav.example.com".to_string();
            c.backends.webdav.username = "me".to_string();
        })
        .unwrap();

        assert_eq!(m.backend().unwrap().backend_type(), BackendType::Webdav);
        assert!(lock(&m.backend).is_some());

        m.update_config(|c| c.backends.webdav.directory = "other".to_string())
            .unwrap();
        assert!(lock(&m.backend).is_none());

        m.backend().unwrap();
        m.update_config(|c| c.sync_interval_minutes = 5).unwrap();
        assert!(lock(&m.backend).is_some());
    }

    #[test]
    fn test_server_backend_needs_session() {
        let dir = TempDir::new().unwrap();
        let m = SyncManager::new(ConfigStore::new(dir.path())).unwrap();
        m.update_config(|c| c.backends.server.base_url = "https://sync.example.com".to_string())
            .unwrap();

        let err = m.backend().err().unwrap();
        assert!(matches!(err, SyncError::Config(ConfigError::MissingField { .. })));
    }
}
