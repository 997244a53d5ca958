//! Shared setup for CLI commands: runtime, managers, prompts and the
//! snapshot file the CLI uses as its local store.

use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tokio::runtime::Runtime;
use zeroize::Zeroizing;

use crate::adapters::{FileSessionStore, ReqwestHttpClient};
use crate::auth::{AuthApiClient, DeviceInfo, SessionManager};
use crate::backend::BackendType;
use crate::error::SyncResult;
use crate::models::ConfigSnapshot;
use crate::storage;
use crate::sync::{ConfigStore, SyncConfig, SyncManager};
use crate::traits::HttpClient;
use crate::transport::RetryingClient;

/// Environment variable that supplies the master password non-interactively.
pub const MASTER_PASSWORD_ENV: &str = "KEYSYNC_MASTER_PASSWORD";

/// Everything a command needs.
pub struct CliContext {
    pub runtime: Runtime,
    pub manager: SyncManager,
}

impl CliContext {
    /// Load settings from the data directory and restore the server
    /// session when a server is configured.
    pub fn open() -> Result<Self> {
        let runtime = Runtime::new()?;
        let store = ConfigStore::in_data_dir()?;
        let config = store.load_config()?;
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

        let mut manager = SyncManager::new(store)?.with_http(http.clone());
        if !config.backends.server.base_url.trim().is_empty() {
            let session = build_session(&config, http)?;
            runtime.block_on(session.load())?;
            manager = manager.with_session(session);
        }

        Ok(Self { runtime, manager })
    }

    /// The server session, or an error telling the user to configure one.
    pub fn session(&self) -> Result<&SessionManager> {
        self.manager.session().ok_or_else(|| {
            eyre!("No sync server configured. Run: keysync configure server.baseUrl=<url>")
        })
    }

    /// Prompt for the master password and unlock the manager with it.
    pub fn unlock(&self) -> Result<()> {
        let password = read_secret("Master password: ")?;
        self.manager.verify_master_password(&password)?;
        Ok(())
    }

    pub fn shutdown(&self) {
        self.runtime.block_on(self.manager.shutdown());
    }
}

/// Session manager for the configured server.
pub fn build_session(config: &SyncConfig, http: Arc<dyn HttpClient>) -> SyncResult<SessionManager> {
    let api = AuthApiClient::new(
        config.backends.server.base_url.clone(),
        RetryingClient::new(http, BackendType::Server),
    );
    let store = Arc::new(FileSessionStore::in_data_dir()?);
    let device = DeviceInfo {
        device_id: config.device_id.clone(),
        device_name: config.device_name.clone(),
    };
    Ok(SessionManager::new(api, store, device))
}

/// Read a secret from the master password variable, else from the terminal.
pub fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(value) = std::env::var(MASTER_PASSWORD_ENV) {
        if !value.is_empty() {
            return Ok(Zeroizing::new(value));
        }
    }
    prompt_secret(prompt)
}

/// Read a secret from the terminal without echo.
pub fn prompt_secret(prompt: &str) -> Result<Zeroizing<String>> {
    let value = rpassword::prompt_password(prompt)
        .map_err(|e| eyre!("Failed to read password: {}", e))?;
    Ok(Zeroizing::new(value))
}

/// Read the local snapshot. A missing file is an empty snapshot.
pub fn load_snapshot(path: &Path) -> SyncResult<ConfigSnapshot> {
    Ok(storage::load_json(path)?.unwrap_or_default())
}

pub fn save_snapshot(path: &Path, snapshot: &ConfigSnapshot) -> SyncResult<()> {
    storage::save_json(path, snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiKeyRecord;
    use tempfile::TempDir;

    #[test]
    fn test_missing_snapshot_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let snapshot = load_snapshot(&dir.path().join("keys.json")).unwrap();
        assert_eq!(snapshot, ConfigSnapshot::new());
    }

    #[test]
    fn test_snapshot_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys.json");
        let mut snapshot = ConfigSnapshot::new();
        snapshot.provider_mut("claude").upsert(ApiKeyRecord::new("work", "sk-1"));

        save_snapshot(&path, &snapshot).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
    }
}
