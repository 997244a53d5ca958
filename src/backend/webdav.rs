//! WebDAV file share backend.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    require, trim_base, unexpected_status, BackendStatus, BackendType, PullOutcome, PushReceipt,
    SyncBackend, CONFIG_FILE_NAME,
};
use crate::error::{DataError, SyncResult};
use crate::models::EncryptedPackage;
use crate::traits::{Method, Request};
use crate::transport::RetryingClient;

pub const DEFAULT_DIRECTORY: &str = "keysync";

/// WebDAV backend settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDavConfig {
    /// Server root, e.g. `https://dav.example.com/remote.php/dav/files/alice`.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Directory below `url`; nested paths are created segment by segment.
    #[serde(default = "default_directory")]
    pub directory: String,
}

fn default_directory() -> String {
    DEFAULT_DIRECTORY.to_string()
}

impl Default for WebDavConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            directory: default_directory(),
        }
    }
}

impl std::fmt::Debug for WebDavConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("directory", &self.directory)
            .finish()
    }
}

impl WebDavConfig {
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        require(BackendType::Webdav, "url", &self.url)?;
        require(BackendType::Webdav, "username", &self.username)
    }

    /// Non-empty, percent-encoded directory segments.
    fn segments(&self) -> Vec<String> {
        self.directory
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect()
    }

    /// URL of each ancestor directory, outermost first, with trailing `/`.
    pub fn directory_urls(&self) -> Vec<String> {
        let mut url = trim_base(&self.url).to_string();
        self.segments()
            .into_iter()
            .map(|segment| {
                url.push('/');
                url.push_str(&segment);
                format!("{}/", url)
            })
            .collect()
    }

    /// URL of the config file.
    pub fn file_url(&self) -> String {
        let mut parts = vec![trim_base(&self.url).to_string()];
        parts.extend(self.segments());
        parts.push(CONFIG_FILE_NAME.to_string());
        parts.join("/")
    }
}

/// Stores the package as a single file on a WebDAV share.
pub struct WebDavBackend {
    config: WebDavConfig,
    client: RetryingClient,
    directory_ready: AtomicBool,
}

impl WebDavBackend {
    pub fn new(config: WebDavConfig, client: RetryingClient) -> Self {
        Self {
            config,
            client,
            directory_ready: AtomicBool::new(false),
        }
    }

    fn authorized(&self, request: Request) -> Request {
        request.basic_auth(&self.config.username, &self.config.password)
    }

    fn dav_method(name: &'static [u8]) -> Method {
        Method::from_bytes(name).unwrap_or(Method::GET)
    }

    async fn exists(&self, url: &str) -> SyncResult<bool> {
        let request = self
            .authorized(Request::new(Self::dav_method(b"PROPFIND"), url))
            .header("Depth", "0");
        let response = self.client.request_with_retry(request).await?;
        match response.status {
            200 | 207 => Ok(true),
            404 => Ok(false),
            _ => Err(unexpected_status(&response).into()),
        }
    }

    async fn make_collection(&self, url: &str) -> SyncResult<()> {
        let request = self.authorized(Request::new(Self::dav_method(b"MKCOL"), url));
        let response = self.client.request_with_retry(request).await?;
        match response.status {
            // 405: created concurrently by another device
            200 | 201 | 405 => {
                debug!(url, "Created WebDAV collection");
                Ok(())
            }
            _ => Err(unexpected_status(&response).into()),
        }
    }

    /// Create every missing directory segment.
    async fn ensure_directory(&self) -> SyncResult<()> {
        if self.directory_ready.load(Ordering::SeqCst) {
            return Ok(());
        }
        for url in self.config.directory_urls() {
            if !self.exists(&url).await? {
                self.make_collection(&url).await?;
            }
        }
        self.directory_ready.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SyncBackend for WebDavBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Webdav
    }

    async fn connect(&self) -> SyncResult<bool> {
        self.ensure_directory().await?;
        Ok(true)
    }

    async fn get_status(&self) -> SyncResult<BackendStatus> {
        let outcome = self.pull().await?;
        Ok(BackendStatus::from_pull(&outcome))
    }

    async fn pull(&self) -> SyncResult<PullOutcome> {
        let request = self.authorized(Request::get(self.config.file_url()));
        let response = self.client.request_with_retry(request).await?;

        if response.status == 404 {
            return Ok(PullOutcome::NotFound);
        }
        if !response.is_success() {
            return Err(unexpected_status(&response).into());
        }

        let package = response.json().map_err(|e| DataError::UnexpectedPayload {
            message: format!("WebDAV file is not a package: {}", e),
        })?;
        Ok(PullOutcome::Found(package))
    }

    async fn push(&self, package: &EncryptedPackage) -> SyncResult<PushReceipt> {
        self.ensure_directory().await?;

        let request = self
            .authorized(Request::put(self.config.file_url()))
            .json(package)?;
        let response = self.client.request_with_retry(request).await?;

        match response.status {
            200 | 201 | 204 => {
                info!(url = %self.config.file_url(), "Pushed config to WebDAV");
                Ok(PushReceipt {
                    timestamp: package.timestamp.clone(),
                })
            }
            _ => Err(unexpected_status(&response).into()),
        }
    }

    async fn disconnect(&self) {
        self.directory_ready.store(false, Ordering::SeqCst);
    }
}
