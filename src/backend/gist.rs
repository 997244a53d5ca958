//! Hosted-document backend on GitHub Gists.
//!
//! The config lives as the content of [`CONFIG_FILE_NAME`] inside a
//! private gist. The gist is found by searching the account's gists for
//! that file name; the first push creates it when none exists. Gist
//! revisions are left to GitHub.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    require, trim_base, unexpected_status, BackendStatus, BackendType, PullOutcome, PushReceipt,
    SyncBackend, CONFIG_FILE_NAME,
};
use crate::error::{DataError, SyncResult};
use crate::models::EncryptedPackage;
use crate::traits::Request;
use crate::transport::RetryingClient;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const GIST_DESCRIPTION: &str = "keysync encrypted configuration";

/// Gist backend settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GistConfig {
    /// Personal access token with the `gist` scope.
    #[serde(default)]
    pub token: String,
    /// Known gist id; discovered and cached when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gist_id: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for GistConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            gist_id: None,
            api_base: default_api_base(),
        }
    }
}

impl std::fmt::Debug for GistConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GistConfig")
            .field("token", &"<redacted>")
            .field("gist_id", &self.gist_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GistConfig {
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        require(BackendType::Gist, "token", &self.token)?;
        require(BackendType::Gist, "apiBase", &self.api_base)
    }
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    raw_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Gist {
    id: String,
    #[serde(default)]
    files: HashMap<String, GistFile>,
    updated_at: Option<String>,
}

impl Gist {
    fn config_file(&self) -> Option<&GistFile> {
        self.files.get(CONFIG_FILE_NAME)
    }
}

/// Stores the package in a private gist.
pub struct GistBackend {
    config: GistConfig,
    client: RetryingClient,
    gist_id: Mutex<Option<String>>,
}

impl GistBackend {
    pub fn new(config: GistConfig, client: RetryingClient) -> Self {
        let gist_id = Mutex::new(config.gist_id.clone());
        Self {
            config,
            client,
            gist_id,
        }
    }

    /// The cached gist id, if known.
    pub async fn gist_id(&self) -> Option<String> {
        self.gist_id.lock().await.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", trim_base(&self.config.api_base), path)
    }

    fn authorized(&self, request: Request) -> Request {
        request
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
    }

    /// Search the account's gists for the one holding the config file.
    async fn find_gist(&self) -> SyncResult<Option<String>> {
        let request = self.authorized(Request::get(self.url("/gists?per_page=100")));
        let response = self.client.request_with_retry(request).await?;
        if !response.is_success() {
            return Err(unexpected_status(&response).into());
        }

        let gists: Vec<Gist> = response.json().map_err(|e| DataError::UnexpectedPayload {
            message: format!("gist list: {}", e),
        })?;
        Ok(gists
            .into_iter()
            .find(|g| g.config_file().is_some())
            .map(|g| g.id))
    }

    /// Cached id, or search for it and cache the result.
    async fn resolve_gist_id(&self) -> SyncResult<Option<String>> {
        let mut cached = self.gist_id.lock().await;
        if cached.is_none() {
            *cached = self.find_gist().await?;
            if let Some(id) = cached.as_deref() {
                debug!(gist_id = id, "Found config gist");
            }
        }
        Ok(cached.clone())
    }

    async fn fetch_gist(&self, id: &str) -> SyncResult<Option<Gist>> {
        let request = self.authorized(Request::get(self.url(&format!("/gists/{}", id))));
        let response = self.client.request_with_retry(request).await?;
        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(unexpected_status(&response).into());
        }
        let gist = response.json().map_err(|e| DataError::UnexpectedPayload {
            message: format!("gist: {}", e),
        })?;
        Ok(Some(gist))
    }

    /// File content, following `raw_url` when the API truncated it.
    async fn file_content(&self, file: &GistFile) -> SyncResult<Option<String>> {
        match (&file.content, file.truncated, &file.raw_url) {
            (_, true, Some(raw_url)) => {
                let request = self.authorized(Request::get(raw_url.as_str()));
                let response = self.client.request_with_retry(request).await?;
                if !response.is_success() {
                    return Err(unexpected_status(&response).into());
                }
                Ok(Some(response.text().map_err(|e| {
                    DataError::UnexpectedPayload {
                        message: e.to_string(),
                    }
                })?))
            }
            (Some(content), _, _) => Ok(Some(content.clone())),
            (None, _, _) => Ok(None),
        }
    }

    async fn create_gist(&self, content: &str) -> SyncResult<Gist> {
        let body = json!({
            "description": GIST_DESCRIPTION,
            "public": false,
            "files": { CONFIG_FILE_NAME: { "content": content } },
        });
        let request = self.authorized(Request::post(self.url("/gists"))).json(&body)?;
        let response = self.client.request_with_retry(request).await?;
        if !response.is_success() {
            return Err(unexpected_status(&response).into());
        }
        let gist: Gist = response.json().map_err(|e| DataError::UnexpectedPayload {
            message: format!("created gist: {}", e),
        })?;
        info!(gist_id = %gist.id, "Created config gist");
        Ok(gist)
    }

    /// Update the file; `Ok(None)` when the gist no longer exists.
    async fn update_gist(&self, id: &str, content: &str) -> SyncResult<Option<Gist>> {
        let body = json!({ "files": { CONFIG_FILE_NAME: { "content": content } } });
        let request = self
            .authorized(Request::patch(self.url(&format!("/gists/{}", id))))
            .json(&body)?;
        let response = self.client.request_with_retry(request).await?;
        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(unexpected_status(&response).into());
        }
        Ok(Some(response.json().map_err(|e| DataError::UnexpectedPayload {
            message: format!("updated gist: {}", e),
        })?))
    }
}

#[async_trait]
impl SyncBackend for GistBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Gist
    }

    /// Locates an existing config gist. Creating one is left to the
    /// first push, so connecting never writes to the account.
    async fn connect(&self) -> SyncResult<bool> {
        self.resolve_gist_id().await?;
        Ok(true)
    }

    async fn get_status(&self) -> SyncResult<BackendStatus> {
        let outcome = self.pull().await?;
        Ok(BackendStatus::from_pull(&outcome))
    }

    async fn pull(&self) -> SyncResult<PullOutcome> {
        let Some(id) = self.resolve_gist_id().await? else {
            return Ok(PullOutcome::NotFound);
        };

        let Some(gist) = self.fetch_gist(&id).await? else {
            warn!(gist_id = %id, "Config gist disappeared");
            *self.gist_id.lock().await = None;
            return Ok(PullOutcome::NotFound);
        };

        let content = match gist.config_file() {
            Some(file) => self.file_content(file).await?,
            None => None,
        };
        match content {
            Some(content) if !content.trim().is_empty() => {
                let package = serde_json::from_str(&content).map_err(|e| {
                    DataError::UnexpectedPayload {
                        message: format!("gist file is not a package: {}", e),
                    }
                })?;
                Ok(PullOutcome::Found(package))
            }
            _ => Ok(PullOutcome::NotFound),
        }
    }

    async fn push(&self, package: &EncryptedPackage) -> SyncResult<PushReceipt> {
        let content = serde_json::to_string_pretty(package)?;

        let existing = self.resolve_gist_id().await?;
        let updated = match existing {
            Some(id) => self.update_gist(&id, &content).await?,
            None => None,
        };
        let gist = match updated {
            Some(gist) => gist,
            None => self.create_gist(&content).await?,
        };

        *self.gist_id.lock().await = Some(gist.id.clone());
        Ok(PushReceipt {
            timestamp: gist
                .updated_at
                .unwrap_or_else(|| package.timestamp.clone()),
        })
    }

    async fn disconnect(&self) {
        *self.gist_id.lock().await = self.config.gist_id.clone();
    }
}
