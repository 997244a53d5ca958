//! Network-related error types.
//!
//! This module defines errors that occur while talking to a sync backend:
//! connection failures, timeouts, unexpected HTTP statuses and exhausted
//! retry budgets.

use std::fmt;

/// Network-specific error variants.
#[derive(Debug, Clone)]
pub enum NetworkError {
    /// Connection to the server failed.
    ConnectionFailed { url: String, message: String },

    /// DNS resolution failed.
    DnsResolutionFailed { host: String },

    /// Request timed out.
    Timeout {
        operation: String,
        duration_secs: u64,
    },

    /// TLS/SSL error.
    TlsError { message: String },

    /// HTTP status error (non-2xx response the caller did not expect).
    HttpStatus { status: u16, message: String },

    /// Every attempt failed with a transient error.
    RetriesExhausted {
        backend: String,
        attempts: u32,
        last_error: String,
    },

    /// Invalid response format.
    InvalidResponse { message: String },

    /// The request could not be built (bad URL or header).
    InvalidRequest { url: String, message: String },

    /// Generic network error.
    Other { message: String },
}

impl NetworkError {
    /// Check if this error is likely transient and can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::ConnectionFailed { .. } => true,
            NetworkError::DnsResolutionFailed { .. } => true,
            NetworkError::Timeout { .. } => true,
            NetworkError::TlsError { .. } => false,
            NetworkError::HttpStatus { status, .. } => is_retryable_status(*status),
            NetworkError::RetriesExhausted { .. } => false,
            NetworkError::InvalidResponse { .. } => false,
            NetworkError::InvalidRequest { .. } => false,
            NetworkError::Other { .. } => true,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            NetworkError::ConnectionFailed { .. } => {
                "Unable to connect to the sync backend. Please check your internet connection."
                    .to_string()
            }
            NetworkError::DnsResolutionFailed { host } => format!(
                "Could not resolve server address '{}'. Please check your internet connection or DNS settings.",
                host
            ),
            NetworkError::Timeout {
                operation,
                duration_secs,
            } => format!(
                "The {} operation timed out after {} seconds. The backend may be slow or unreachable.",
                operation, duration_secs
            ),
            NetworkError::TlsError { .. } => {
                "A secure connection could not be established. Please check the backend URL and your TLS configuration.".to_string()
            }
            NetworkError::HttpStatus { status, .. } => match *status {
                400 => "The request was rejected by the backend.".to_string(),
                404 => "The requested resource was not found.".to_string(),
                409 => "The backend reported a write conflict. Please sync again.".to_string(),
                429 => "Too many requests. Please wait a moment and try again.".to_string(),
                500..=599 => {
                    "The sync backend is experiencing issues. Please try again later.".to_string()
                }
                _ => format!(
                    "The sync backend returned an error (HTTP {}). Please try again.",
                    status
                ),
            },
            NetworkError::RetriesExhausted {
                backend, attempts, ..
            } => format!(
                "Could not reach the {} backend after {} attempts. Please try again later.",
                backend, attempts
            ),
            NetworkError::InvalidResponse { .. } => {
                "Received an invalid response from the sync backend.".to_string()
            }
            NetworkError::InvalidRequest { url, .. } => {
                format!("The backend address '{}' is not valid.", url)
            }
            NetworkError::Other { message } => format!("Network error: {}", message),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed { .. } => "E_NET_CONN",
            NetworkError::DnsResolutionFailed { .. } => "E_NET_DNS",
            NetworkError::Timeout { .. } => "E_NET_TIMEOUT",
            NetworkError::TlsError { .. } => "E_NET_TLS",
            NetworkError::HttpStatus { .. } => "E_NET_HTTP",
            NetworkError::RetriesExhausted { .. } => "E_NET_RETRIES",
            NetworkError::InvalidResponse { .. } => "E_NET_INVALID",
            NetworkError::InvalidRequest { .. } => "E_NET_REQUEST",
            NetworkError::Other { .. } => "E_NET_OTHER",
        }
    }
}

/// Statuses worth another attempt: 5xx, request timeout, rate limited.
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ConnectionFailed { url, message } => {
                write!(f, "Connection failed to '{}': {}", url, message)
            }
            NetworkError::DnsResolutionFailed { host } => {
                write!(f, "DNS resolution failed for '{}'", host)
            }
            NetworkError::Timeout {
                operation,
                duration_secs,
            } => {
                write!(f, "{} timed out after {} seconds", operation, duration_secs)
            }
            NetworkError::TlsError { message } => write!(f, "TLS error: {}", message),
            NetworkError::HttpStatus { status, message } => {
                write!(f, "HTTP {} error: {}", status, message)
            }
            NetworkError::RetriesExhausted {
                backend,
                attempts,
                last_error,
            } => write!(
                f,
                "{} backend unreachable after {} attempts: {}",
                backend, attempts, last_error
            ),
            NetworkError::InvalidResponse { message } => {
                write!(f, "Invalid response: {}", message)
            }
            NetworkError::InvalidRequest { url, message } => {
                write!(f, "Invalid request for '{}': {}", url, message)
            }
            NetworkError::Other { message } => write!(f, "Network error: {}", message),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Classify a reqwest error into a NetworkError.
pub fn classify_reqwest_error(err: &reqwest::Error, url: &str, timeout_secs: u64) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout {
            operation: "HTTP request".to_string(),
            duration_secs: timeout_secs,
        }
    } else if err.is_connect() {
        classify_connect_failure(&error_chain(err), url)
    } else if err.is_decode() || err.is_body() {
        NetworkError::InvalidResponse {
            message: format!("Failed to read response: {}", err),
        }
    } else if err.is_builder() {
        NetworkError::InvalidRequest {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else {
        NetworkError::Other {
            message: error_chain(err),
        }
    }
}

/// The error and all of its sources, joined with `": "`.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

/// Tell DNS and TLS failures apart from a plain refused connection.
///
/// Hyper only exposes these through the message of the source chain.
fn classify_connect_failure(chain: &str, url: &str) -> NetworkError {
    let lower = chain.to_lowercase();
    if lower.contains("dns error") || lower.contains("failed to lookup address") {
        NetworkError::DnsResolutionFailed {
            host: extract_host_from_url(url),
        }
    } else if lower.contains("tls") || lower.contains("certificate") || lower.contains("handshake")
    {
        NetworkError::TlsError {
            message: chain.to_string(),
        }
    } else {
        NetworkError::ConnectionFailed {
            url: url.to_string(),
            message: chain.to_string(),
        }
    }
}

/// Extract the host portion from a URL string.
fn extract_host_from_url(url: &str) -> String {
    let url_lower = url.to_lowercase();
    let without_scheme = if url_lower.starts_with("https://") {
        &url[8..]
    } else if url_lower.starts_with("http://") {
        &url[7..]
    } else {
        url
    };

    without_scheme
        .split(&['/', ':', '@'][..])
        .next()
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(NetworkError::ConnectionFailed {
            url: "https://example.com".to_string(),
            message: "Connection refused".to_string(),
        }
        .is_retryable());
        assert!(NetworkError::Timeout {
            operation: "pull".to_string(),
            duration_secs: 30,
        }
        .is_retryable());
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [500, 502, 503, 504, 408, 429] {
            assert!(is_retryable_status(status), "{} should be retryable", status);
        }
        for status in [400, 401, 403, 404, 409, 422] {
            assert!(!is_retryable_status(status), "{} should not be retryable", status);
        }
    }

    #[test]
    fn test_retries_exhausted_is_final() {
        let err = NetworkError::RetriesExhausted {
            backend: "webdav".to_string(),
            attempts: 4,
            last_error: "HTTP 503".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "E_NET_RETRIES");
        assert!(err.user_message().contains("webdav"));
        assert!(err.to_string().contains("4 attempts"));
    }

    #[test]
    fn test_user_message_http_status() {
        let err_500 = NetworkError::HttpStatus {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        assert!(err_500.user_message().contains("backend"));

        let err_418 = NetworkError::HttpStatus {
            status: 418,
            message: "teapot".to_string(),
        };
        assert!(err_418.user_message().contains("418"));
    }

    #[test]
    fn test_connect_failures_are_told_apart() {
        let url = "https://dav.example.com/remote.php";

        let dns = classify_connect_failure(
            "error sending request: error trying to connect: dns error: failed to lookup address information",
            url,
        );
        assert!(matches!(
            dns,
            NetworkError::DnsResolutionFailed { ref host } if host == "dav.example.com"
        ));
        assert!(dns.is_retryable());

        let tls = classify_connect_failure(
            "error trying to connect: invalid peer certificate: UnknownIssuer",
            url,
        );
        assert!(matches!(tls, NetworkError::TlsError { .. }));
        assert!(!tls.is_retryable());

        let refused = classify_connect_failure(
            "error trying to connect: tcp connect error: Connection refused (os error 111)",
            url,
        );
        assert!(matches!(refused, NetworkError::ConnectionFailed { .. }));
    }

    #[test]
    fn test_extract_host_from_url() {
        assert_eq!(extract_host_from_url("https://example.com/path"), "example.com");
        assert_eq!(
            extract_host_from_url("http://example.com:8080/path"),
            "example.com"
        );
        assert_eq!(extract_host_from_url("example.com"), "example.com");
    }
}
