//! Authentication-related error types.
//!
//! Covers both layers of "who are you": backend credentials (session
//! tokens, personal access tokens, basic auth) and the master password
//! that protects the synced payload.

use std::fmt;

/// Authentication-specific error variants.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Backend rejected the request with 401/403.
    Unauthorized { backend: String, status: u16 },

    /// No session is available (user never logged in or logged out).
    NotAuthenticated,

    /// Access token has expired and could not be renewed.
    TokenExpired,

    /// Refresh token was rejected; the session has been cleared.
    RefreshFailed { message: String },

    /// Login or registration was rejected by the server.
    InvalidCredentials { message: String },

    /// Session state could not be persisted.
    SessionSaveFailed { message: String },

    /// No master password has been configured yet.
    MasterPasswordNotSet,

    /// The supplied master password does not match the stored hash.
    MasterPasswordInvalid,

    /// A sync operation needs the master password but it has not been
    /// verified in this process.
    MasterPasswordRequired,

    /// The master password does not meet the minimum strength rules.
    WeakPassword { feedback: Vec<String> },

    /// Auth API returned an unexpected error.
    ApiError { status: u16, message: String },
}

impl AuthError {
    /// Check if this error might be resolved by signing in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            AuthError::Unauthorized { .. }
                | AuthError::NotAuthenticated
                | AuthError::TokenExpired
                | AuthError::RefreshFailed { .. }
                | AuthError::ApiError { status: 401, .. }
        )
    }

    /// Check if this error is about the master password rather than the
    /// backend session.
    pub fn is_master_password(&self) -> bool {
        matches!(
            self,
            AuthError::MasterPasswordNotSet
                | AuthError::MasterPasswordInvalid
                | AuthError::MasterPasswordRequired
                | AuthError::WeakPassword { .. }
        )
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Unauthorized { backend, status } => match *status {
                403 => format!(
                    "The {} backend denied access. Check that your credentials have the required permissions.",
                    backend
                ),
                _ => format!(
                    "The {} backend rejected your credentials. Please sign in again.",
                    backend
                ),
            },
            AuthError::NotAuthenticated => {
                "You are not signed in. Please sign in to continue.".to_string()
            }
            AuthError::TokenExpired => "Your session has expired. Please sign in again.".to_string(),
            AuthError::RefreshFailed { .. } => {
                "Your session could not be renewed. Please sign in again.".to_string()
            }
            AuthError::InvalidCredentials { message } => {
                format!("Sign in failed: {}", message)
            }
            AuthError::SessionSaveFailed { .. } => {
                "Could not save your session. Please check file permissions.".to_string()
            }
            AuthError::MasterPasswordNotSet => {
                "No master password is set. Set one before syncing.".to_string()
            }
            AuthError::MasterPasswordInvalid => "The master password is incorrect.".to_string(),
            AuthError::MasterPasswordRequired => {
                "Enter your master password to unlock sync.".to_string()
            }
            AuthError::WeakPassword { feedback } => {
                if feedback.is_empty() {
                    "The master password is too weak.".to_string()
                } else {
                    format!("The master password is too weak: {}", feedback.join(" "))
                }
            }
            AuthError::ApiError { status, message } => match *status {
                401 => "Your session has expired. Please sign in again.".to_string(),
                _ => format!("Authentication error: {}", message),
            },
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthorized { .. } => "E_AUTH_UNAUTHORIZED",
            AuthError::NotAuthenticated => "E_AUTH_NOT_AUTH",
            AuthError::TokenExpired => "E_AUTH_TOKEN_EXP",
            AuthError::RefreshFailed { .. } => "E_AUTH_REFRESH_FAIL",
            AuthError::InvalidCredentials { .. } => "E_AUTH_INVALID",
            AuthError::SessionSaveFailed { .. } => "E_AUTH_SESSION_SAVE",
            AuthError::MasterPasswordNotSet => "E_AUTH_MASTER_UNSET",
            AuthError::MasterPasswordInvalid => "E_AUTH_MASTER_INVALID",
            AuthError::MasterPasswordRequired => "E_AUTH_MASTER_REQUIRED",
            AuthError::WeakPassword { .. } => "E_AUTH_WEAK_PASSWORD",
            AuthError::ApiError { .. } => "E_AUTH_API",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Unauthorized { backend, status } => {
                write!(f, "{} backend returned HTTP {}", backend, status)
            }
            AuthError::NotAuthenticated => write!(f, "Not authenticated"),
            AuthError::TokenExpired => write!(f, "Access token has expired"),
            AuthError::RefreshFailed { message } => {
                write!(f, "Token refresh failed: {}", message)
            }
            AuthError::InvalidCredentials { message } => {
                write!(f, "Invalid credentials: {}", message)
            }
            AuthError::SessionSaveFailed { message } => {
                write!(f, "Failed to save session: {}", message)
            }
            AuthError::MasterPasswordNotSet => write!(f, "Master password not set"),
            AuthError::MasterPasswordInvalid => write!(f, "Master password invalid"),
            AuthError::MasterPasswordRequired => write!(f, "Master password not verified"),
            AuthError::WeakPassword { feedback } => {
                write!(f, "Weak password: {}", feedback.join("; "))
            }
            AuthError::ApiError { status, message } => {
                write!(f, "Authentication API error ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for AuthError {}
