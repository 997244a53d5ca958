//! Error category classification for unified error handling.
//!
//! Categories map every failure onto the handful of outcomes a caller can
//! act on: retry later, sign in again, fix the data, or fix the settings.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-level failures (connection refused, DNS, timeout).
    /// Retried automatically by the transport layer.
    Connection,

    /// Remote side failed (HTTP 5xx, 408, 429) after all retries.
    Server,

    /// Authentication problems: backend rejected credentials, session
    /// expired, or the master password is wrong or missing.
    /// Never retried automatically.
    Auth,

    /// Malformed, tampered or undecryptable data.
    /// Aborts the operation and is surfaced verbatim.
    Data,

    /// User action required (weak password, invalid input).
    User,

    /// Local filesystem or OS errors.
    System,

    /// Missing or invalid sync settings.
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category are generally transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Connection | ErrorCategory::Server)
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Connection => "connection",
            ErrorCategory::Server => "server",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Data => "data",
            ErrorCategory::User => "user",
            ErrorCategory::System => "system",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns a user-friendly description of the category.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::Connection => "Network connectivity issue",
            ErrorCategory::Server => "Sync backend issue",
            ErrorCategory::Auth => "Authentication problem",
            ErrorCategory::Data => "Sync data is invalid or could not be decrypted",
            ErrorCategory::User => "User action required",
            ErrorCategory::System => "System error",
            ErrorCategory::Configuration => "Configuration problem",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Connection => "Check your internet connection and try again",
            ErrorCategory::Server => {
                "The sync backend may be experiencing issues. Please try again later"
            }
            ErrorCategory::Auth => "Sign in again or re-enter your master password",
            ErrorCategory::Data => {
                "Check that every device uses the same master password before syncing again"
            }
            ErrorCategory::User => "Please check your input and try again",
            ErrorCategory::System => "Check file permissions and available disk space",
            ErrorCategory::Configuration => "Check your sync settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
