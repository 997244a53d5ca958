//! Backend for the keysync sync server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    require, trim_base, unexpected_status, BackendStatus, BackendType, PullOutcome, PushReceipt,
    SyncBackend,
};
use crate::error::{AuthError, DataError, SyncResult};
use crate::models::EncryptedPackage;
use crate::traits::{AccessTokenProvider, Request};
use crate::transport::RetryingClient;

pub const CONFIG_PATH: &str = "/api/v1/sync/config";
pub const STATUS_PATH: &str = "/api/v1/sync/status";
pub const DEVICE_ID_HEADER: &str = "X-Device-Id";

/// Server backend settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default)]
    pub base_url: String,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        require(BackendType::Server, "baseUrl", &self.base_url)
    }
}

/// `GET /api/v1/sync/config` body: either the package itself or wrapped
/// in `{ "data": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigBody {
    Bare(EncryptedPackage),
    /// `data` must be present; `null` means no remote copy yet.
    Wrapped {
        #[serde(deserialize_with = "Option::deserialize")]
        data: Option<EncryptedPackage>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    #[serde(default)]
    has_data: bool,
    last_updated: Option<String>,
    device_id: Option<String>,
    version: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushBody {
    timestamp: Option<String>,
    updated_at: Option<String>,
}

/// Talks to the sync server with the signed-in user's bearer token.
pub struct ServerBackend {
    config: ServerConfig,
    client: RetryingClient,
    tokens: Arc<dyn AccessTokenProvider>,
    device_id: String,
    connected: AtomicBool,
}

impl ServerBackend {
    pub fn new(
        config: ServerConfig,
        client: RetryingClient,
        tokens: Arc<dyn AccessTokenProvider>,
        device_id: String,
    ) -> Self {
        Self {
            config,
            client,
            tokens,
            device_id,
            connected: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", trim_base(&self.config.base_url), path)
    }

    async fn authorized(&self, request: Request) -> SyncResult<Request> {
        let token = self
            .tokens
            .access_token()
            .await?
            .ok_or(AuthError::NotAuthenticated)?;
        Ok(request
            .bearer_auth(&token)
            .header(DEVICE_ID_HEADER, self.device_id.as_str()))
    }
}

#[async_trait]
impl SyncBackend for ServerBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Server
    }

    async fn connect(&self) -> SyncResult<bool> {
        let request = self.authorized(Request::get(self.url(STATUS_PATH))).await?;
        let response = self.client.request_with_retry(request).await?;

        let ok = response.is_success() || response.status == 404;
        self.connected.store(ok, Ordering::SeqCst);
        debug!(status = response.status, connected = ok, "Server connect");
        Ok(ok)
    }

    async fn get_status(&self) -> SyncResult<BackendStatus> {
        let request = self.authorized(Request::get(self.url(STATUS_PATH))).await?;
        let response = self.client.request_with_retry(request).await?;

        if response.status == 404 {
            return Ok(BackendStatus {
                connected: true,
                ..Default::default()
            });
        }
        if !response.is_success() {
            return Err(unexpected_status(&response).into());
        }

        let body: StatusBody = response.json().unwrap_or_default();
        Ok(BackendStatus {
            connected: true,
            has_data: body.has_data,
            last_updated: body.last_updated,
            device_id: body.device_id,
            version: body.version,
        })
    }

    async fn pull(&self) -> SyncResult<PullOutcome> {
        let request = self.authorized(Request::get(self.url(CONFIG_PATH))).await?;
        let response = self.client.request_with_retry(request).await?;

        if response.status == 404 {
            debug!("No config stored on server");
            return Ok(PullOutcome::NotFound);
        }
        if !response.is_success() {
            return Err(unexpected_status(&response).into());
        }

        let body: ConfigBody = response.json().map_err(|e| DataError::UnexpectedPayload {
            message: format!("server config response: {}", e),
        })?;
        Ok(match body {
            ConfigBody::Bare(package) | ConfigBody::Wrapped { data: Some(package) } => {
                PullOutcome::Found(package)
            }
            ConfigBody::Wrapped { data: None } => PullOutcome::NotFound,
        })
    }

    async fn push(&self, package: &EncryptedPackage) -> SyncResult<PushReceipt> {
        let request = Request::put(self.url(CONFIG_PATH)).json(package)?;
        let request = self.authorized(request).await?;
        let response = self.client.request_with_retry(request).await?;

        if !response.is_success() {
            return Err(unexpected_status(&response).into());
        }

        let body: PushBody = response.json().unwrap_or_default();
        let timestamp = body
            .timestamp
            .or(body.updated_at)
            .unwrap_or_else(|| package.timestamp.clone());
        info!(timestamp = %timestamp, "Pushed config to server");
        Ok(PushReceipt { timestamp })
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
