//! Client for the sync server's auth endpoints.
//!
//! | Call | Endpoint |
//! |------|----------|
//! | [`AuthApiClient::login`] | `POST /api/v1/auth/login` |
//! | [`AuthApiClient::register`] | `POST /api/v1/auth/register` |
//! | [`AuthApiClient::refresh_token`] | `POST /api/v1/auth/refresh` |
//! | [`AuthApiClient::logout`] | `POST /api/v1/auth/logout` |

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::session::UserInfo;
use crate::error::{AuthError, DataError, SyncError, SyncResult};
use crate::traits::{Request, Response};
use crate::transport::RetryingClient;

/// Used when the server sends neither `expiresIn` nor a JWT `exp` claim.
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Identifies this installation to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_name: String,
}

/// Response from login, register and refresh.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(alias = "access_token")]
    pub access_token: String,
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
    #[serde(default, alias = "expires_in")]
    pub expires_in: Option<u64>, // may be absent; decode from JWT
    #[serde(default)]
    pub user: Option<UserInfo>,
}

impl TokenResponse {
    /// Lifetime of the access token in seconds.
    pub fn lifetime_secs(&self) -> u64 {
        self.expires_in
            .or_else(|| get_jwt_expires_in(&self.access_token))
            .unwrap_or(DEFAULT_EXPIRES_IN)
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// JWT claims for extracting expiration time.
#[derive(Deserialize)]
struct JwtClaims {
    exp: i64,
}

/// Extract the remaining lifetime from a JWT access token.
///
/// Returns the number of seconds until the token expires, or None if the
/// token cannot be parsed.
pub fn get_jwt_expires_in(access_token: &str) -> Option<u64> {
    let parts: Vec<&str> = access_token.split('.').collect();
    let payload = URL_SAFE_NO_PAD.decode(parts.get(1)?).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&payload).ok()?;
    let now = chrono::Utc::now().timestamp();
    Some((claims.exp - now).max(0) as u64)
}

/// Client for the auth endpoints.
#[derive(Debug, Clone)]
pub struct AuthApiClient {
    base_url: String,
    client: RetryingClient,
}

impl AuthApiClient {
    pub fn new(base_url: impl Into<String>, client: RetryingClient) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v1/auth/{}", self.base_url, endpoint)
    }

    /// Exchange email and password for tokens.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device: &DeviceInfo,
    ) -> SyncResult<TokenResponse> {
        let body = json!({
            "email": email,
            "password": password,
            "deviceId": device.device_id,
            "deviceName": device.device_name,
        });
        self.token_call("login", body).await
    }

    /// Create an account and sign in.
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
        device: &DeviceInfo,
    ) -> SyncResult<TokenResponse> {
        let body = json!({
            "email": email,
            "username": username,
            "password": password,
            "deviceId": device.device_id,
            "deviceName": device.device_name,
        });
        self.token_call("register", body).await
    }

    /// Rotate tokens using a refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> SyncResult<TokenResponse> {
        self.token_call("refresh", json!({ "refreshToken": refresh_token }))
            .await
    }

    /// Invalidate the session server-side.
    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> SyncResult<()> {
        let request = Request::post(self.url("logout"))
            .bearer_auth(access_token)
            .json(&json!({ "refreshToken": refresh_token }))?;
        let response = self.client.request_with_retry(request).await?;
        if !response.is_success() {
            return Err(api_error(&response).into());
        }
        Ok(())
    }

    async fn token_call(&self, endpoint: &str, body: serde_json::Value) -> SyncResult<TokenResponse> {
        let request = Request::post(self.url(endpoint)).json(&body)?;

        let response = match self.client.request_with_retry(request).await {
            Ok(response) => response,
            Err(SyncError::Auth(AuthError::Unauthorized { .. })) => {
                return Err(AuthError::InvalidCredentials {
                    message: format!("{} rejected", endpoint),
                }
                .into());
            }
            Err(err) => return Err(err),
        };

        if !response.is_success() {
            return Err(api_error(&response).into());
        }

        response.json().map_err(|e| {
            DataError::UnexpectedPayload {
                message: format!("{} response: {}", endpoint, e),
            }
            .into()
        })
    }
}

fn api_error(response: &Response) -> AuthError {
    AuthError::ApiError {
        status: response.status,
        message: response.error_message(),
    }
}
