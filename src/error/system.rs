//! System-related error types.
//!
//! Errors from the local filesystem while persisting sync settings, the
//! master-password hash and the session.

use std::fmt;
use std::path::PathBuf;

/// System-specific error variants.
#[derive(Debug, Clone)]
pub enum SystemError {
    /// Permission denied for file/directory operation.
    PermissionDenied { path: PathBuf, operation: String },

    /// Failed to create directory.
    DirectoryCreationFailed { path: PathBuf, message: String },

    /// Generic I/O error.
    IoError {
        operation: String,
        path: Option<PathBuf>,
        message: String,
    },

    /// Could not determine home directory.
    NoHomeDirectory,

    /// A background task could not be joined or a channel closed.
    TaskFailed { message: String },
}

impl SystemError {
    /// Check if this error might be transient.
    pub fn is_transient(&self) -> bool {
        false
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            SystemError::PermissionDenied { path, operation } => format!(
                "Permission denied: Cannot {} '{}'. Check file permissions.",
                operation,
                path.display()
            ),
            SystemError::DirectoryCreationFailed { path, .. } => format!(
                "Failed to create directory: '{}'. Please check permissions and try again.",
                path.display()
            ),
            SystemError::IoError {
                operation, path, ..
            } => match path {
                Some(p) => format!("Failed to {} '{}'", operation, p.display()),
                None => format!("Failed to {}", operation),
            },
            SystemError::NoHomeDirectory => {
                "Could not determine your home directory. Set KEYSYNC_HOME to choose a data directory.".to_string()
            }
            SystemError::TaskFailed { .. } => "A background task stopped unexpectedly.".to_string(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            SystemError::PermissionDenied { .. } => "E_SYS_PERM",
            SystemError::DirectoryCreationFailed { .. } => "E_SYS_DIR_CREATE",
            SystemError::IoError { .. } => "E_SYS_IO",
            SystemError::NoHomeDirectory => "E_SYS_NO_HOME",
            SystemError::TaskFailed { .. } => "E_SYS_TASK",
        }
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemError::PermissionDenied { path, operation } => {
                write!(f, "Permission denied: {} '{}'", operation, path.display())
            }
            SystemError::DirectoryCreationFailed { path, message } => write!(
                f,
                "Failed to create directory '{}': {}",
                path.display(),
                message
            ),
            SystemError::IoError {
                operation,
                path,
                message,
            } => match path {
                Some(p) => write!(
                    f,
                    "I/O error during {} at '{}': {}",
                    operation,
                    p.display(),
                    message
                ),
                None => write!(f, "I/O error during {}: {}", operation, message),
            },
            SystemError::NoHomeDirectory => write!(f, "Could not determine home directory"),
            SystemError::TaskFailed { message } => write!(f, "Background task failed: {}", message),
        }
    }
}

impl std::error::Error for SystemError {}

/// Classify an I/O error into a SystemError.
pub fn classify_io_error(
    err: std::io::Error,
    path: Option<PathBuf>,
    operation: &str,
) -> SystemError {
    use std::io::ErrorKind;

    match (err.kind(), path) {
        (ErrorKind::PermissionDenied, Some(p)) => SystemError::PermissionDenied {
            path: p,
            operation: operation.to_string(),
        },
        (_, path) => SystemError::IoError {
            operation: operation.to_string(),
            path,
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_permission_denied() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let sys = classify_io_error(err, Some(PathBuf::from("/etc/x")), "write");
        assert!(matches!(sys, SystemError::PermissionDenied { .. }));
        assert_eq!(sys.error_code(), "E_SYS_PERM");
    }

    #[test]
    fn test_classify_other_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let sys = classify_io_error(err, None, "read session");
        assert!(sys.to_string().contains("read session"));
        assert!(sys.to_string().contains("boom"));
    }

    #[test]
    fn test_no_home_mentions_override() {
        assert!(SystemError::NoHomeDirectory
            .user_message()
            .contains("KEYSYNC_HOME"));
    }
}
