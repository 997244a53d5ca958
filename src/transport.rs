//! Retrying request executor shared by every backend.
//!
//! [`RetryingClient::request_with_retry`] sends a [`Request`] through an
//! [`HttpClient`] and retries transient failures with exponential
//! backoff:
//!
//! | Outcome | Action |
//! |---------|--------|
//! | 401 / 403 | fail immediately with [`AuthError::Unauthorized`] |
//! | 5xx / 408 / 429 | retry |
//! | timeout, refused, reset, DNS | retry |
//! | any other status | return the response to the caller |
//!
//! Once retries run out the last failure is wrapped in
//! [`NetworkError::RetriesExhausted`] naming the backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::BackendType;
use crate::error::{is_retryable_status, AuthError, NetworkError, SyncResult};
use crate::traits::{HttpClient, Request, Response};

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based): base, 2x base, 4x base,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// An [`HttpClient`] paired with a retry policy and the backend it serves.
#[derive(Clone)]
pub struct RetryingClient {
    http: Arc<dyn HttpClient>,
    policy: RetryPolicy,
    backend: BackendType,
}

impl std::fmt::Debug for RetryingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("policy", &self.policy)
            .field("backend", &self.backend)
            .finish()
    }
}

impl RetryingClient {
    pub fn new(http: Arc<dyn HttpClient>, backend: BackendType) -> Self {
        Self {
            http,
            policy: RetryPolicy::default(),
            backend,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn backend(&self) -> BackendType {
        self.backend
    }

    /// Send `request`, retrying transient failures.
    pub async fn request_with_retry(&self, request: Request) -> SyncResult<Response> {
        let attempts = self.policy.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.policy.delay_for(attempt - 1);
                warn!(
                    backend = %self.backend,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
            }

            debug!(
                backend = %self.backend,
                method = %request.method,
                url = %request.url,
                attempt = attempt + 1,
                "Sending request"
            );

            match self.http.send(request.clone()).await {
                Ok(response) if response.status == 401 || response.status == 403 => {
                    return Err(AuthError::Unauthorized {
                        backend: self.backend.to_string(),
                        status: response.status,
                    }
                    .into());
                }
                Ok(response) if is_retryable_status(response.status) => {
                    last_error = format!("HTTP {}: {}", response.status, response.error_message());
                }
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() => {
                    last_error = err.to_string();
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(NetworkError::RetriesExhausted {
            backend: self.backend.to_string(),
            attempts,
            last_error,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::error::SyncError;

    const URL: &str = "https://sync.example.com/api/v1/sync/config";

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn client(mock: &MockHttpClient) -> RetryingClient {
        RetryingClient::new(Arc::new(mock.clone()), BackendType::Server).with_policy(fast_policy())
    }

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_success_needs_one_attempt() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::status(200, "{}"));

        let response = client(&mock).request_with_retry(Request::get(URL)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let mock = MockHttpClient::new();
        mock.push_response(URL, MockResponse::status(503, ""));
        mock.push_response(URL, MockResponse::status(429, ""));
        mock.push_response(URL, MockResponse::status(200, "{}"));

        let response = client(&mock).request_with_retry(Request::get(URL)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn test_retries_network_errors() {
        let mock = MockHttpClient::new();
        mock.push_response(
            URL,
            MockResponse::Error(NetworkError::Timeout {
                operation: "HTTP request".to_string(),
                duration_secs: 30,
            }),
        );
        mock.push_response(URL, MockResponse::status(200, "{}"));

        let response = client(&mock).request_with_retry(Request::get(URL)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test]
    async fn test_auth_errors_are_never_retried() {
        for status in [401, 403] {
            let mock = MockHttpClient::new();
            mock.set_response(URL, MockResponse::status(status, ""));

            let err = client(&mock)
                .request_with_retry(Request::get(URL))
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                SyncError::Auth(AuthError::Unauthorized { status: s, .. }) if s == status
            ));
            assert_eq!(mock.request_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_exhaustion_names_backend() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::status(500, "boom"));

        let err = client(&mock)
            .request_with_retry(Request::get(URL))
            .await
            .unwrap_err();

        match err {
            SyncError::Network(NetworkError::RetriesExhausted {
                backend,
                attempts,
                last_error,
            }) => {
                assert_eq!(backend, "server");
                assert_eq!(attempts, 4);
                assert!(last_error.contains("500"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(mock.request_count(), 4);
    }

    #[tokio::test]
    async fn test_not_found_is_returned_to_caller() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::status(404, ""));

        let response = client(&mock).request_with_retry(Request::get(URL)).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_retried() {
        let mock = MockHttpClient::new();
        mock.set_response(
            URL,
            MockResponse::Error(NetworkError::InvalidRequest {
                url: URL.to_string(),
                message: "bad header".to_string(),
            }),
        );

        let err = client(&mock)
            .request_with_retry(Request::get(URL))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Network(NetworkError::InvalidRequest { .. })));
        assert_eq!(mock.request_count(), 1);
    }
}
