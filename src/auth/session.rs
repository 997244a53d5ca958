//! Server session state.
//!
//! [`AuthState`] is what a login produces and what survives restarts in
//! `session.json`. Tokens never appear in debug output.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Seconds before expiry at which the access token is refreshed.
pub const REFRESH_THRESHOLD_SECS: i64 = 60;

/// The signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Session state for the server backend.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token expiry as Unix timestamp (seconds since epoch).
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl AuthState {
    /// Create a signed-out state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the state carries an access token.
    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Check if the access token is past its expiry.
    ///
    /// A token without an expiry counts as expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now().timestamp() >= expires_at,
            None => true,
        }
    }

    /// Check if the access token expires within `threshold_secs`.
    pub fn needs_refresh(&self, threshold_secs: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now().timestamp() + threshold_secs >= expires_at,
            None => true,
        }
    }

    /// Seconds until the token enters the refresh window, never negative.
    pub fn seconds_until_refresh(&self, threshold_secs: i64) -> i64 {
        match self.expires_at {
            Some(expires_at) => (expires_at - threshold_secs - Utc::now().timestamp()).max(0),
            None => 0,
        }
    }

    /// Whether the state can be used (or refreshed) without a new login.
    pub fn is_usable(&self) -> bool {
        self.is_authenticated && (self.has_token() || self.refresh_token.is_some())
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
        f.debug_struct("AuthState")
            .field("is_authenticated", &self.is_authenticated)
            .field("user", &self.user)
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
