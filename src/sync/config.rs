//! Persisted sync settings and master password verifier.
//!
//! | File | Content |
//! |------|---------|
//! | `sync-config.json` | [`SyncConfig`] |
//! | `master-password.json` | [`PasswordHash`] (never the password) |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{BackendSettings, BackendType};
use crate::crypto::PasswordHash;
use crate::error::{ConfigError, SyncResult};
use crate::storage;
use crate::sync::auto_sync::{MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES};

pub const CONFIG_FILE: &str = "sync-config.json";
pub const MASTER_PASSWORD_FILE: &str = "master-password.json";

/// Default auto-sync interval.
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 30;

/// Sync settings for this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub backend_type: BackendType,
    #[serde(flatten)]
    pub backends: BackendSettings,
    #[serde(default)]
    pub auto_sync: bool,
    #[serde(default = "default_interval")]
    pub sync_interval_minutes: u64,
    #[serde(default = "new_device_id")]
    pub device_id: String,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// RFC 3339 time of the last successful pull or push.
    #[serde(default)]
    pub last_sync_time: Option<String>,
}

fn default_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_MINUTES
}

fn new_device_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-device".to_string())
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend_type: BackendType::default(),
            backends: BackendSettings::default(),
            auto_sync: false,
            sync_interval_minutes: default_interval(),
            device_id: new_device_id(),
            device_name: default_device_name(),
            last_sync_time: None,
        }
    }
}

impl SyncConfig {
    /// Check settings that do not depend on the active backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "deviceId".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&self.sync_interval_minutes) {
            return Err(ConfigError::InvalidValue {
                field: "syncIntervalMinutes".to_string(),
                message: format!(
                    "must be between {} and {}",
                    MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES
                ),
            });
        }
        Ok(())
    }

    /// Set a field from a `key=value` pair, as typed on the command line.
    ///
    /// Keys are the camelCase field names, prefixed by the backend for
    /// backend settings (`webdav.url`, `gist.token`, `server.baseUrl`).
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidValue {
            field: key.to_string(),
            message: message.to_string(),
        };
        let parse_bool = |v: &str| match v {
            "true" | "on" | "yes" | "1" => Ok(true),
            "false" | "off" | "no" | "0" => Ok(false),
            _ => Err(invalid("expected true or false")),
        };

        match key {
            "enabled" => self.enabled = parse_bool(value)?,
            "backendType" | "backend" => self.backend_type = value.parse()?,
            "autoSync" => self.auto_sync = parse_bool(value)?,
            "syncIntervalMinutes" | "interval" => {
                self.sync_interval_minutes = value
                    .parse()
                    .map_err(|_| invalid("expected a number of minutes"))?;
            }
            "deviceName" => self.device_name = value.to_string(),
            "server.baseUrl" => self.backends.server.base_url = value.to_string(),
            "gist.token" => self.backends.gist.token = value.to_string(),
            "gist.gistId" => {
                self.backends.gist.gist_id = Some(value.to_string()).filter(|v| !v.is_empty())
            }
            "gist.apiBase" => self.backends.gist.api_base = value.to_string(),
            "webdav.url" => self.backends.webdav.url = value.to_string(),
            "webdav.username" => self.backends.webdav.username = value.to_string(),
            "webdav.password" => self.backends.webdav.password = value.to_string(),
            "webdav.directory" => self.backends.webdav.directory = value.to_string(),
            _ => return Err(invalid("unknown setting")),
        }
        self.validate()
    }
}

/// Reads and writes the sync documents in one directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the default data directory.
    pub fn in_data_dir() -> SyncResult<Self> {
        Ok(Self::new(storage::data_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the settings, creating and persisting defaults (including a
    /// fresh device id) on first use.
    pub fn load_config(&self) -> SyncResult<SyncConfig> {
        let path = self.dir.join(CONFIG_FILE);
        match storage::load_json::<SyncConfig>(&path)? {
            Some(config) => Ok(config),
            None => {
                let config = SyncConfig::default();
                debug!(device_id = %config.device_id, "Created sync config");
                self.save_config(&config)?;
                Ok(config)
            }
        }
    }

    pub fn save_config(&self, config: &SyncConfig) -> SyncResult<()> {
        storage::save_json(&self.dir.join(CONFIG_FILE), config)
    }

    pub fn load_master_password(&self) -> SyncResult<Option<PasswordHash>> {
        storage::load_json(&self.dir.join(MASTER_PASSWORD_FILE))
    }

    pub fn save_master_password(&self, hash: &PasswordHash) -> SyncResult<()> {
        storage::save_json(&self.dir.join(MASTER_PASSWORD_FILE), hash)
    }

    pub fn clear_master_password(&self) -> SyncResult<()> {
        storage::remove_file(&self.dir.join(MASTER_PASSWORD_FILE))
    }
}
