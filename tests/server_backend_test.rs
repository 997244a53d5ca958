//! Integration tests for the sync server backend against a mock server.
//!
//! These tests verify:
//! - Request shape: paths, bearer token, device id header
//! - Response handling: 404 as "no data", wrapped and bare bodies
//! - Retry behavior: 401 fails fast, 5xx retries until exhausted
//! - A full manager sync going through the server backend

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use keysync::adapters::{InMemorySessionStore, ReqwestHttpClient};
use keysync::auth::{AuthApiClient, AuthState, DeviceInfo, SessionManager};
use keysync::backend::{BackendType, PullOutcome, ServerBackend, ServerConfig, SyncBackend};
use keysync::error::{AuthError, DataError, NetworkError, SyncError, SyncResult};
use keysync::sync::{ConfigStore, SyncManager, SyncOutcome};
use keysync::traits::AccessTokenProvider;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVICE_ID: &str = "device-1";
const TOKEN: &str = "token-1";

/// Hands out a fixed token, or none when signed out.
struct StaticToken(Option<&'static str>);

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> SyncResult<Option<String>> {
        Ok(self.0.map(str::to_string))
    }
}

fn backend(server: &MockServer) -> ServerBackend {
    backend_with_token(server, Some(TOKEN))
}

fn backend_with_token(server: &MockServer, token: Option<&'static str>) -> ServerBackend {
    ServerBackend::new(
        ServerConfig {
            base_url: format!("{}/", server.uri()),
        },
        http_client(BackendType::Server),
        Arc::new(StaticToken(token)),
        DEVICE_ID.to_string(),
    )
}

// ============================================================================
// Pull
// ============================================================================

#[tokio::test]
async fn test_pull_404_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sync/config"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = backend(&server).pull().await.unwrap();
    assert!(outcome.is_not_found());
}

#[tokio::test]
async fn test_pull_sends_token_and_device_id() {
    let server = MockServer::start().await;
    let stored = package(&["keyA"], "laptop");

    Mock::given(method("GET"))
        .and(path("/api/v1/sync/config"))
        .and(header("authorization", "Bearer token-1"))
        .and(header("x-device-id", DEVICE_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(&stored))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = backend(&server).pull().await.unwrap();
    assert_eq!(outcome, PullOutcome::Found(stored));
}

#[tokio::test]
async fn test_pull_accepts_wrapped_body() {
    let server = MockServer::start().await;
    let stored = package(&["keyA"], "laptop");

    Mock::given(method("GET"))
        .and(path("/api/v1/sync/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": stored })))
        .mount(&server)
        .await;

    let outcome = backend(&server).pull().await.unwrap();
    assert_eq!(outcome.into_package(), Some(stored));
}

#[tokio::test]
async fn test_pull_wrapped_null_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sync/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": null })))
        .mount(&server)
        .await;

    assert!(backend(&server).pull().await.unwrap().is_not_found());
}

#[tokio::test]
async fn test_pull_error_body_is_not_mistaken_for_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sync/config"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "error": "storage offline" })),
        )
        .mount(&server)
        .await;

    let err = backend(&server).pull().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Data(DataError::UnexpectedPayload { .. })
    ));
}

#[tokio::test]
async fn test_signed_out_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = backend_with_token(&server, None).pull().await.unwrap_err();
    assert!(matches!(err, SyncError::Auth(AuthError::NotAuthenticated)));
}

// ============================================================================
// Push
// ============================================================================

#[tokio::test]
async fn test_push_puts_package_and_uses_server_timestamp() {
    let server = MockServer::start().await;
    let outgoing = package(&["keyA"], DEVICE_ID);

    Mock::given(method("PUT"))
        .and(path("/api/v1/sync/config"))
        .and(header("authorization", "Bearer token-1"))
        .and(header("x-device-id", DEVICE_ID))
        .and(body_partial_json(json!({
            "checksum": outgoing.checksum,
            "deviceId": DEVICE_ID,
            "version": 1,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "updatedAt": "2026-03-01T12:00:00.000Z" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let receipt = backend(&server).push(&outgoing).await.unwrap();
    assert_eq!(receipt.timestamp, "2026-03-01T12:00:00.000Z");
}

#[tokio::test]
async fn test_push_without_body_keeps_package_timestamp() {
    let server = MockServer::start().await;
    let outgoing = package(&["keyA"], DEVICE_ID);

    Mock::given(method("PUT"))
        .and(path("/api/v1/sync/config"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let receipt = backend(&server).push(&outgoing).await.unwrap();
    assert_eq!(receipt.timestamp, outgoing.timestamp);
}

// ============================================================================
// Status and retries
// ============================================================================

#[tokio::test]
async fn test_status_maps_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sync/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hasData": true,
            "lastUpdated": "2026-03-01T12:00:00.000Z",
            "deviceId": "laptop",
            "version": 1,
        })))
        .mount(&server)
        .await;

    let backend = backend(&server);
    assert!(backend.connect().await.unwrap());
    assert!(backend.is_connected());

    let status = backend.get_status().await.unwrap();
    assert!(status.connected);
    assert!(status.has_data);
    assert_eq!(status.device_id.as_deref(), Some("laptop"));
    assert_eq!(status.version, Some(1));
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sync/config"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = backend(&server).pull().await.unwrap_err();
    assert!(err.requires_reauth());
    assert!(matches!(
        err,
        SyncError::Auth(AuthError::Unauthorized { status: 401, .. })
    ));
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sync/config"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(4)
        .mount(&server)
        .await;

    let err = backend(&server).pull().await.unwrap_err();
    match err {
        SyncError::Network(NetworkError::RetriesExhausted { attempts, .. }) => {
            assert_eq!(attempts, 4)
        }
        other => panic!("expected retries exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transient_error_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sync/config"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sync/config"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(backend(&server).pull().await.unwrap().is_not_found());
}

// ============================================================================
// Through the manager
// ============================================================================

fn signed_in() -> AuthState {
    AuthState {
        is_authenticated: true,
        access_token: Some(TOKEN.to_string()),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(chrono::Utc::now().timestamp() + 3600),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_manager_sync_pushes_to_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sync/config"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/sync/config"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "timestamp": "2099-03-01T12:00:00.000Z" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = SessionManager::new(
        AuthApiClient::new(server.uri(), http_client(BackendType::Server)),
        Arc::new(InMemorySessionStore::with_state(signed_in())),
        DeviceInfo {
            device_id: DEVICE_ID.to_string(),
            device_name: "test".to_string(),
        },
    );
    assert!(session.load().await.unwrap());

    let manager = SyncManager::new(ConfigStore::new(dir.path()))
        .unwrap()
        .with_http(Arc::new(ReqwestHttpClient::new()))
        .with_retry_policy(fast_retry())
        .with_session(session);
    let uri = server.uri();
    manager
        .update_config(|c| {
            c.enabled = true;
            c.backend_type = BackendType::Server;
            c.backends.server.base_url = uri;
        })
        .unwrap();
    manager.set_master_password(PASSWORD).unwrap();

    let outcome = manager.sync(&snapshot(&["keyA"])).await.unwrap();
    assert_eq!(
        outcome,
        SyncOutcome::Pushed {
            timestamp: "2099-03-01T12:00:00.000Z".to_string()
        }
    );
    assert_eq!(
        manager.get_config().last_sync_time.as_deref(),
        Some("2099-03-01T12:00:00.000Z")
    );
    manager.shutdown().await;
}
