//! Mock HTTP client for testing.
//!
//! Provides a configurable mock HTTP client that can return predefined
//! responses or errors for testing purposes.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::NetworkError;
use crate::traits::{Headers, HttpClient, Request, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body, if any
    pub body: Option<String>,
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a response
    Success(Response),
    /// Fail without a response
    Error(NetworkError),
}

impl MockResponse {
    /// A response with the given status and text body.
    pub fn status(status: u16, body: &str) -> Self {
        MockResponse::Success(Response::new(status, Bytes::from(body.to_string())))
    }

    /// A response with the given status and JSON body.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        MockResponse::Success(Response::new(status, Bytes::from(value.to_string())))
    }
}

/// Mock HTTP client for testing.
///
/// Responses are queued per URL prefix and handed out in order; the last
/// queued response for a prefix keeps being returned once the others are
/// used up.
///
/// # Example
///
/// ```ignore
/// use keysync::adapters::mock::{MockHttpClient, MockResponse};
/// use keysync::traits::{HttpClient, Request};
///
/// let client = MockHttpClient::new();
/// client.push_response("https://api.example.com", MockResponse::status(503, ""));
/// client.push_response("https://api.example.com", MockResponse::status(200, "ok"));
///
/// let first = client.send(Request::get("https://api.example.com/data")).await?;
/// assert_eq!(first.status, 503);
/// let second = client.send(Request::get("https://api.example.com/data")).await?;
/// assert_eq!(second.status, 200);
/// assert_eq!(client.request_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    /// Queued responses by URL prefix
    responses: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    /// Default response when no prefix matches
    default_response: Arc<Mutex<Option<MockResponse>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any queued responses for `url_prefix` with a single one.
    pub fn set_response(&self, url_prefix: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(url_prefix.to_string(), VecDeque::from([response]));
    }

    /// Queue a response for `url_prefix`.
    pub fn push_response(&self, url_prefix: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses
            .entry(url_prefix.to_string())
            .or_default()
            .push_back(response);
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        *self.default_response.lock().unwrap() = Some(response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn record_request(&self, request: &Request) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method.to_string(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body_text(),
        });
    }

    /// Next response for a URL: longest matching prefix wins.
    fn next_response(&self, url: &str) -> Option<MockResponse> {
        let mut responses = self.responses.lock().unwrap();

        let prefix = responses
            .keys()
            .filter(|p| url.starts_with(p.as_str()))
            .max_by_key(|p| p.len())
            .cloned();

        if let Some(queue) = prefix.and_then(|p| responses.get_mut(&p)) {
            if queue.len() > 1 {
                return queue.pop_front();
            }
            if let Some(last) = queue.front() {
                return Some(last.clone());
            }
        }

        self.default_response.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: Request) -> Result<Response, NetworkError> {
        self.record_request(&request);

        match self.next_response(&request.url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(NetworkError::Other {
                message: format!("No mock response for URL: {}", request.url),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_responses_in_order_then_sticky() {
        let client = MockHttpClient::new();
        client.push_response("https://x", MockResponse::status(500, ""));
        client.push_response("https://x", MockResponse::status(200, "ok"));

        let statuses = [
            client.send(Request::get("https://x/a")).await.unwrap().status,
            client.send(Request::get("https://x/a")).await.unwrap().status,
            client.send(Request::get("https://x/a")).await.unwrap().status,
        ];
        assert_eq!(statuses, [500, 200, 200]);
    }

    #[tokio::test]
    async fn test_longest_prefix_wins() {
        let client = MockHttpClient::new();
        client.set_response("https://x", MockResponse::status(200, "root"));
        client.set_response("https://x/special", MockResponse::status(404, ""));

        assert_eq!(
            client.send(Request::get("https://x/special/1")).await.unwrap().status,
            404
        );
        assert_eq!(
            client.send(Request::get("https://x/other")).await.unwrap().status,
            200
        );
    }

    #[tokio::test]
    async fn test_records_requests() {
        let client = MockHttpClient::new();
        client.set_default_response(MockResponse::status(204, ""));

        client
            .send(Request::put("https://x/file").bearer_auth("tok").body("data"))
            .await
            .unwrap();

        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "PUT");
        assert_eq!(requests[0].body.as_deref(), Some("data"));
        assert_eq!(requests[0].headers.get("Authorization").unwrap(), "Bearer tok");
    }

    #[tokio::test]
    async fn test_unmatched_url_errors() {
        let client = MockHttpClient::new();
        let err = client.send(Request::get("https://nowhere")).await.unwrap_err();
        assert!(matches!(err, NetworkError::Other { .. }));
    }
}
