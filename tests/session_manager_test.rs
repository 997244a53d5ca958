//! Integration tests for the server session lifecycle.
//!
//! These tests verify:
//! - Login and register persist the session
//! - A restored session near expiry is refreshed once
//! - A refused refresh signs the user out
//! - Logout clears local state even when the server fails

mod common;

use std::sync::Arc;

use chrono::Utc;
use common::*;
use keysync::adapters::{FileSessionStore, InMemorySessionStore};
use keysync::auth::{AuthApiClient, AuthState, DeviceInfo, SessionManager, UserInfo};
use keysync::backend::BackendType;
use keysync::error::{AuthError, SyncError};
use keysync::traits::SessionStore;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session(server: &MockServer, store: Arc<dyn SessionStore>) -> SessionManager {
    SessionManager::new(
        AuthApiClient::new(server.uri(), http_client(BackendType::Server)),
        store,
        DeviceInfo {
            device_id: "device-1".to_string(),
            device_name: "laptop".to_string(),
        },
    )
}

fn tokens(access: &str) -> serde_json::Value {
    json!({
        "accessToken": access,
        "refreshToken": format!("refresh-for-{}", access),
        "expiresIn": 3600,
        "user": { "id": "u1" },
    })
}

fn stored_state(expires_in: i64) -> AuthState {
    AuthState {
        is_authenticated: true,
        user: Some(UserInfo {
            id: "u1".to_string(),
            email: Some("a@example.com".to_string()),
            username: None,
        }),
        access_token: Some("access-1".to_string()),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(Utc::now().timestamp() + expires_in),
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_partial_json(json!({
            "email": "a@example.com",
            "deviceId": "device-1",
            "deviceName": "laptop",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens("access-1")))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_persists_session_to_disk() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileSessionStore::in_dir(dir.path()));

    let manager = session(&server, store.clone());
    let state = manager.login("a@example.com", "hunter22").await.unwrap();
    assert!(state.is_authenticated);
    assert_eq!(
        state.user.as_ref().and_then(|u| u.email.as_deref()),
        Some("a@example.com")
    );
    assert!(manager.has_refresh_timer());

    let persisted = store.load().await.unwrap().unwrap();
    assert_eq!(persisted.access_token.as_deref(), Some("access-1"));
    assert!(store.path().exists());

    // A new process restores it
    let restarted = session(&server, store);
    assert!(restarted.load().await.unwrap());
    assert_eq!(
        restarted.get_access_token().await.unwrap().as_deref(),
        Some("access-1")
    );

    manager.shutdown();
    restarted.shutdown();
    assert!(!manager.has_refresh_timer());
}

#[tokio::test]
async fn test_rejected_login_is_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    let store = InMemorySessionStore::new();

    let err = session(&server, Arc::new(store.clone()))
        .login("a@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Auth(AuthError::InvalidCredentials { .. })
    ));
    assert!(store.get_state().is_none());
}

#[tokio::test]
async fn test_register_keeps_username() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/register"))
        .and(body_partial_json(json!({ "username": "alice" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(tokens("access-1")))
        .expect(1)
        .mount(&server)
        .await;
    let store = InMemorySessionStore::new();

    let manager = session(&server, Arc::new(store.clone()));
    let state = manager
        .register("a@example.com", "alice", "hunter22")
        .await
        .unwrap();

    let user = state.user.unwrap();
    assert_eq!(user.username.as_deref(), Some("alice"));
    assert_eq!(
        store.get_state().unwrap().user.unwrap().username.as_deref(),
        Some("alice")
    );
    manager.shutdown();
}

#[tokio::test]
async fn test_token_near_expiry_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .and(body_partial_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "access-2",
            "refreshToken": "refresh-2",
            "expiresIn": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;
    let store = InMemorySessionStore::with_state(stored_state(30));

    let manager = session(&server, Arc::new(store.clone()));
    assert!(manager.load().await.unwrap());

    let token = manager.get_access_token().await.unwrap();
    assert_eq!(token.as_deref(), Some("access-2"));

    let saved = store.get_state().unwrap();
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-2"));
    // The refresh response carried no user, so the old one is kept
    assert_eq!(saved.user.unwrap().id, "u1");
    manager.shutdown();
}

#[tokio::test]
async fn test_refused_refresh_signs_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    let store = InMemorySessionStore::with_state(stored_state(3600));

    let manager = session(&server, Arc::new(store.clone()));
    assert!(manager.load().await.unwrap());

    let err = manager.refresh_access_token().await.unwrap_err();
    assert!(matches!(err, SyncError::Auth(AuthError::RefreshFailed { .. })));
    assert!(err.requires_reauth());

    assert!(!manager.is_authenticated().await);
    assert!(store.get_state().is_none());
    assert!(!manager.has_refresh_timer());
    assert_eq!(manager.get_access_token().await.unwrap(), None);
}

#[tokio::test]
async fn test_logout_sends_tokens_and_clears() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_partial_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let store = InMemorySessionStore::with_state(stored_state(3600));

    let manager = session(&server, Arc::new(store.clone()));
    manager.load().await.unwrap();
    manager.logout().await.unwrap();

    assert!(!manager.is_authenticated().await);
    assert!(store.get_state().is_none());
}

#[tokio::test]
async fn test_logout_survives_server_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let store = InMemorySessionStore::with_state(stored_state(3600));

    let manager = session(&server, Arc::new(store.clone()));
    manager.load().await.unwrap();
    assert!(manager.has_refresh_timer());

    manager.logout().await.unwrap();
    assert!(!manager.is_authenticated().await);
    assert!(!manager.has_refresh_timer());
    assert!(store.get_state().is_none());
}
