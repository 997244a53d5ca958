//! Session storage and access-token traits.
//!
//! [`SessionStore`] persists the server backend's [`AuthState`] so a
//! login survives process restarts. [`AccessTokenProvider`] is the seam
//! the server backend uses to obtain a fresh bearer token without
//! knowing how sessions are refreshed.

use async_trait::async_trait;

use crate::auth::AuthState;
use crate::error::SyncResult;

/// Trait for session state storage.
///
/// # Example
///
/// ```ignore
/// use keysync::traits::SessionStore;
///
/// async fn signed_in<S: SessionStore>(store: &S) -> bool {
///     matches!(store.load().await, Ok(Some(state)) if state.is_authenticated)
/// }
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the stored session.
    ///
    /// # Returns
    /// - `Ok(Some(state))` if a session was stored
    /// - `Ok(None)` if nothing is stored
    /// - `Err(error)` if the stored session could not be read
    async fn load(&self) -> SyncResult<Option<AuthState>>;

    /// Persist the session, replacing any previous one.
    async fn save(&self, state: &AuthState) -> SyncResult<()>;

    /// Remove the stored session. Succeeds if nothing was stored.
    async fn clear(&self) -> SyncResult<()>;
}

/// Source of bearer tokens for authenticated requests.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Current access token, refreshed first if it is about to expire.
    ///
    /// Returns `Ok(None)` when no user is signed in.
    async fn access_token(&self) -> SyncResult<Option<String>>;
}
