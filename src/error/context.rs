//! Error context for enriched error information.
//!
//! Public entry points attach an [`ErrorContext`] so the caller can say
//! *which* operation against *which* backend failed.

use chrono::{DateTime, Utc};

/// Context information attached to errors for debugging and recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext {
    /// Operation that failed (`pull`, `push`, `login`, ...).
    pub operation: String,

    /// Backend the operation targeted, if any.
    pub backend: Option<String>,

    /// Timestamp when the error occurred.
    pub timestamp: DateTime<Utc>,

    /// Number of retry attempts made before this error.
    pub retry_count: u32,
}

impl ErrorContext {
    /// Create a new ErrorContext for an operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            backend: None,
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }

    /// Set the backend for this context.
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    /// Set the retry count for this context.
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Get a formatted context string suitable for logging.
    pub fn to_log_string(&self) -> String {
        let mut parts = vec![format!("operation={}", self.operation)];

        if let Some(ref backend) = self.backend {
            parts.push(format!("backend={}", backend));
        }

        if self.retry_count > 0 {
            parts.push(format!("retry_count={}", self.retry_count));
        }

        parts.push(format!("timestamp={}", self.timestamp.to_rfc3339()));

        parts.join(" ")
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.operation)?;

        if let Some(ref backend) = self.backend {
            write!(f, " backend={}", backend)?;
        }

        if self.retry_count > 0 {
            write!(f, " retry={}", self.retry_count)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder_pattern() {
        let ctx = ErrorContext::new("pull")
            .with_backend("webdav")
            .with_retry_count(2);

        assert_eq!(ctx.operation, "pull");
        assert_eq!(ctx.backend, Some("webdav".to_string()));
        assert_eq!(ctx.retry_count, 2);
    }

    #[test]
    fn test_context_display() {
        let ctx = ErrorContext::new("push").with_backend("server");
        let display = format!("{}", ctx);
        assert!(display.contains("push"));
        assert!(display.contains("backend=server"));
        assert!(!display.contains("retry="));
    }

    #[test]
    fn test_context_to_log_string() {
        let ctx = ErrorContext::new("login").with_retry_count(1);
        let log_str = ctx.to_log_string();
        assert!(log_str.contains("operation=login"));
        assert!(log_str.contains("retry_count=1"));
        assert!(log_str.contains("timestamp="));
        assert!(!log_str.contains("backend="));
    }
}
