//! Remote storage backends.
//!
//! Every backend implements [`SyncBackend`] over a shared
//! [`RetryingClient`]; they differ only in addressing, request shape and
//! authentication:
//!
//! | Backend | Auth | Storage |
//! |---------|------|---------|
//! | [`ServerBackend`] | bearer session token + `X-Device-Id` | `GET/PUT /api/v1/sync/config` |
//! | [`GistBackend`] | static personal access token | one file inside a private gist |
//! | [`WebDavBackend`] | HTTP Basic | `<directory>/keysync-config.json` |
//!
//! A missing remote object is [`PullOutcome::NotFound`], never an error.

pub mod gist;
pub mod server;
pub mod webdav;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, NetworkError, SyncResult};
use crate::models::EncryptedPackage;
use crate::traits::{AccessTokenProvider, HttpClient, Response};
use crate::transport::{RetryPolicy, RetryingClient};

pub use gist::{GistBackend, GistConfig};
pub use server::{ServerBackend, ServerConfig};
pub use webdav::{WebDavBackend, WebDavConfig};

/// File name used by the gist and WebDAV backends.
pub const CONFIG_FILE_NAME: &str = "keysync-config.json";

/// Which remote storage a device syncs through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    #[default]
    Server,
    Gist,
    Webdav,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Server => "server",
            BackendType::Gist => "gist",
            BackendType::Webdav => "webdav",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(BackendType::Server),
            "gist" | "github" => Ok(BackendType::Gist),
            "webdav" | "dav" => Ok(BackendType::Webdav),
            other => Err(ConfigError::InvalidValue {
                field: "backendType".to_string(),
                message: format!("unknown backend '{}'", other),
            }),
        }
    }
}

/// Remote state as reported by [`SyncBackend::get_status`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub connected: bool,
    pub has_data: bool,
    pub last_updated: Option<String>,
    pub device_id: Option<String>,
    pub version: Option<u32>,
}

impl BackendStatus {
    /// Status derived from a pull.
    pub fn from_pull(outcome: &PullOutcome) -> Self {
        match outcome {
            PullOutcome::Found(package) => Self {
                connected: true,
                has_data: true,
                last_updated: Some(package.timestamp.clone()),
                device_id: Some(package.device_id.clone()),
                version: Some(package.version),
            },
            PullOutcome::NotFound => Self {
                connected: true,
                ..Self::default()
            },
        }
    }
}

/// Result of a successful pull.
#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    Found(EncryptedPackage),
    /// Nothing has been pushed yet.
    NotFound,
}

impl PullOutcome {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PullOutcome::NotFound)
    }

    pub fn into_package(self) -> Option<EncryptedPackage> {
        match self {
            PullOutcome::Found(package) => Some(package),
            PullOutcome::NotFound => None,
        }
    }
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReceipt {
    /// Time the remote recorded the write (RFC 3339).
    pub timestamp: String,
}

/// The four-operation contract every backend implements.
#[async_trait]
pub trait SyncBackend: Send + Sync {
    fn backend_type(&self) -> BackendType;

    /// Check reachability and credentials, preparing remote storage if
    /// needed. `Ok(false)` means reachable but not usable.
    async fn connect(&self) -> SyncResult<bool>;

    async fn get_status(&self) -> SyncResult<BackendStatus>;

    async fn pull(&self) -> SyncResult<PullOutcome>;

    async fn push(&self, package: &EncryptedPackage) -> SyncResult<PushReceipt>;

    /// Forget cached connection state.
    async fn disconnect(&self);
}

/// Settings for every backend type; only the active one must be complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendSettings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gist: GistConfig,
    #[serde(default)]
    pub webdav: WebDavConfig,
}

/// Shared dependencies for constructing backends.
#[derive(Clone)]
pub struct BackendContext {
    pub http: Arc<dyn HttpClient>,
    pub retry: RetryPolicy,
    pub device_id: String,
    /// Required by the server backend only.
    pub tokens: Option<Arc<dyn AccessTokenProvider>>,
}

impl BackendContext {
    fn client(&self, backend: BackendType) -> RetryingClient {
        RetryingClient::new(self.http.clone(), backend).with_policy(self.retry)
    }
}

/// Build the backend for `backend_type` from its settings.
pub fn create_backend(
    backend_type: BackendType,
    settings: &BackendSettings,
    ctx: &BackendContext,
) -> SyncResult<Box<dyn SyncBackend>> {
    let client = ctx.client(backend_type);
    let backend: Box<dyn SyncBackend> = match backend_type {
        BackendType::Server => {
            settings.server.validate()?;
            let tokens = ctx.tokens.clone().ok_or_else(|| ConfigError::MissingField {
                backend: backend_type.to_string(),
                field: "session".to_string(),
            })?;
            Box::new(ServerBackend::new(
                settings.server.clone(),
                client,
                tokens,
                ctx.device_id.clone(),
            ))
        }
        BackendType::Gist => {
            settings.gist.validate()?;
            Box::new(GistBackend::new(settings.gist.clone(), client))
        }
        BackendType::Webdav => {
            settings.webdav.validate()?;
            Box::new(WebDavBackend::new(settings.webdav.clone(), client))
        }
    };
    Ok(backend)
}

pub(crate) fn require(backend: BackendType, field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField {
            backend: backend.to_string(),
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Error for a status the backend does not handle.
pub(crate) fn unexpected_status(response: &Response) -> NetworkError {
    NetworkError::HttpStatus {
        status: response.status,
        message: response.error_message(),
    }
}

pub(crate) fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}
