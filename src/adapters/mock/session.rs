//! In-memory session store for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::auth::AuthState;
use crate::error::{AuthError, SyncResult};
use crate::traits::SessionStore;

/// In-memory session store.
///
/// Lets tests observe what the session manager persists, and simulate
/// storage failures, without touching the file system.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    /// Stored state
    state: Arc<Mutex<Option<AuthState>>>,
    /// Whether save should fail
    save_should_fail: Arc<Mutex<bool>>,
    /// Number of successful saves
    save_count: Arc<Mutex<usize>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding an initial session.
    pub fn with_state(state: AuthState) -> Self {
        let store = Self::default();
        *store.state.lock().unwrap() = Some(state);
        store
    }

    /// Configure whether save should fail.
    pub fn set_save_should_fail(&self, should_fail: bool) {
        *self.save_should_fail.lock().unwrap() = should_fail;
    }

    /// Get the stored state synchronously (for testing).
    pub fn get_state(&self) -> Option<AuthState> {
        self.state.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.save_count.lock().unwrap()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> SyncResult<Option<AuthState>> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn save(&self, state: &AuthState) -> SyncResult<()> {
        if *self.save_should_fail.lock().unwrap() {
            return Err(AuthError::SessionSaveFailed {
                message: "Mock save failure".to_string(),
            }
            .into());
        }
        *self.state.lock().unwrap() = Some(state.clone());
        *self.save_count.lock().unwrap() += 1;
        Ok(())
    }

    async fn clear(&self) -> SyncResult<()> {
        *self.state.lock().unwrap() = None;
        Ok(())
    }
}
