//! Unified error type for the sync engine.
//!
//! `SyncError` wraps every domain error so public entry points can return
//! one type, and callers can branch on category, retryability and whether
//! the user has to sign in again.

use std::fmt;

use super::auth::AuthError;
use super::category::ErrorCategory;
use super::config::ConfigError;
use super::context::ErrorContext;
use super::data::DataError;
use super::network::NetworkError;
use super::system::SystemError;

/// Unified error type for the sync engine.
#[derive(Debug)]
pub enum SyncError {
    /// Connection, timeout and unexpected-status errors.
    Network(NetworkError),

    /// Backend credentials, session and master-password errors.
    Auth(AuthError),

    /// Malformed, tampered or undecryptable data.
    Data(DataError),

    /// Missing or invalid settings.
    Config(ConfigError),

    /// Local filesystem errors.
    System(SystemError),

    /// Wrapped error with additional context.
    WithContext {
        error: Box<SyncError>,
        context: ErrorContext,
    },
}

impl SyncError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Network(err) => match err {
                NetworkError::HttpStatus { .. } | NetworkError::RetriesExhausted { .. } => {
                    ErrorCategory::Server
                }
                _ => ErrorCategory::Connection,
            },
            SyncError::Auth(AuthError::WeakPassword { .. }) => ErrorCategory::User,
            SyncError::Auth(_) => ErrorCategory::Auth,
            SyncError::Data(_) => ErrorCategory::Data,
            SyncError::Config(_) => ErrorCategory::Configuration,
            SyncError::System(_) => ErrorCategory::System,
            SyncError::WithContext { error, .. } => error.category(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(err) => err.is_retryable(),
            SyncError::Auth(_) => false,
            SyncError::Data(_) => false,
            SyncError::Config(_) => false,
            SyncError::System(err) => err.is_transient(),
            SyncError::WithContext { error, .. } => error.is_retryable(),
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Network(err) => err.user_message(),
            SyncError::Auth(err) => err.user_message(),
            SyncError::Data(err) => err.user_message(),
            SyncError::Config(err) => err.user_message(),
            SyncError::System(err) => err.user_message(),
            SyncError::WithContext { error, context } => {
                format!("{}\n\nContext: {}", error.user_message(), context)
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Network(err) => err.error_code(),
            SyncError::Auth(err) => err.error_code(),
            SyncError::Data(err) => err.error_code(),
            SyncError::Config(err) => err.error_code(),
            SyncError::System(err) => err.error_code(),
            SyncError::WithContext { error, .. } => error.error_code(),
        }
    }

    /// Attach context to this error.
    pub fn with_context(self, ctx: ErrorContext) -> Self {
        SyncError::WithContext {
            error: Box::new(self),
            context: ctx,
        }
    }

    /// Get the outermost context if this error has one attached.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            SyncError::WithContext { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Get the inner error without context.
    pub fn inner(&self) -> &SyncError {
        match self {
            SyncError::WithContext { error, .. } => error.inner(),
            _ => self,
        }
    }

    /// Get the recovery hint for this error.
    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }

    /// Check if this error requires re-authentication.
    pub fn requires_reauth(&self) -> bool {
        match self {
            SyncError::Auth(err) => err.requires_reauth(),
            SyncError::WithContext { error, .. } => error.requires_reauth(),
            _ => false,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Network(err) => write!(f, "{}", err),
            SyncError::Auth(err) => write!(f, "{}", err),
            SyncError::Data(err) => write!(f, "{}", err),
            SyncError::Config(err) => write!(f, "{}", err),
            SyncError::System(err) => write!(f, "{}", err),
            SyncError::WithContext { error, context } => {
                write!(f, "{} ({})", error, context)
            }
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Network(err) => Some(err),
            SyncError::Auth(err) => Some(err),
            SyncError::Data(err) => Some(err),
            SyncError::Config(err) => Some(err),
            SyncError::System(err) => Some(err),
            SyncError::WithContext { error, .. } => error.source(),
        }
    }
}

// ============================================================================
// From implementations for automatic error conversion
// ============================================================================

impl From<NetworkError> for SyncError {
    fn from(err: NetworkError) -> Self {
        SyncError::Network(err)
    }
}

impl From<AuthError> for SyncError {
    fn from(err: AuthError) -> Self {
        SyncError::Auth(err)
    }
}

impl From<DataError> for SyncError {
    fn from(err: DataError) -> Self {
        SyncError::Data(err)
    }
}

impl From<ConfigError> for SyncError {
    fn from(err: ConfigError) -> Self {
        SyncError::Config(err)
    }
}

impl From<SystemError> for SyncError {
    fn from(err: SystemError) -> Self {
        SyncError::System(err)
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        use super::system::classify_io_error;
        SyncError::System(classify_io_error(err, None, "I/O operation"))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Data(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_network_error_categories() {
        let conn = SyncError::Network(NetworkError::ConnectionFailed {
            url: "https://example.com".to_string(),
            message: "refused".to_string(),
        });
        assert_eq!(conn.category(), ErrorCategory::Connection);

        let exhausted = SyncError::Network(NetworkError::RetriesExhausted {
            backend: "server".to_string(),
            attempts: 4,
            last_error: "HTTP 503".to_string(),
        });
        assert_eq!(exhausted.category(), ErrorCategory::Server);
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn test_auth_errors_never_retryable() {
        let err = SyncError::Auth(AuthError::Unauthorized {
            backend: "server".to_string(),
            status: 401,
        });
        assert_eq!(err.category(), ErrorCategory::Auth);
        assert!(!err.is_retryable());
        assert!(err.requires_reauth());
    }

    #[test]
    fn test_weak_password_is_user_category() {
        let err = SyncError::Auth(AuthError::WeakPassword { feedback: vec![] });
        assert_eq!(err.category(), ErrorCategory::User);
    }

    #[test]
    fn test_data_error_category() {
        let err: SyncError = DataError::IntegrityCheckFailed.into();
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.error_code(), "E_DATA_INTEGRITY");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_with_context_preserves_properties() {
        let err = SyncError::Network(NetworkError::Timeout {
            operation: "request".to_string(),
            duration_secs: 30,
        });

        let with_ctx = err.with_context(ErrorContext::new("pull").with_backend("webdav"));

        assert!(matches!(with_ctx, SyncError::WithContext { .. }));
        assert_eq!(with_ctx.category(), ErrorCategory::Connection);
        assert!(with_ctx.is_retryable());
        assert_eq!(with_ctx.context().unwrap().backend, Some("webdav".to_string()));
        assert!(matches!(with_ctx.inner(), SyncError::Network(_)));
        assert!(with_ctx.to_string().contains("backend=webdav"));
        assert!(with_ctx.user_message().contains("pull"));
    }

    #[test]
    fn test_requires_reauth_through_context() {
        let err = SyncError::Auth(AuthError::TokenExpired)
            .with_context(ErrorContext::new("push"));
        assert!(err.requires_reauth());

        let data = SyncError::Data(DataError::AuthenticationFailed);
        assert!(!data.requires_reauth());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SyncError = io_err.into();
        assert!(matches!(err, SyncError::System(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: SyncError = json_err.into();
        assert!(matches!(err, SyncError::Data(DataError::Serialization { .. })));
    }

    #[test]
    fn test_error_source() {
        let err = SyncError::Config(ConfigError::SyncDisabled);
        assert!(err.source().is_some());
        assert!(err.recovery_hint().contains("settings"));
    }
}
