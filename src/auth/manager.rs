//! Session lifecycle for the server backend.
//!
//! ```text
//! LoggedOut ──login/register──▶ Authenticated ──timer──▶ refresh
//!     ▲                              │                     │
//!     └────────logout────────────────┘◀────── ok ──────────┘
//!     ▲                                                    │
//!     └──────────────── refresh failed ────────────────────┘
//! ```
//!
//! A background timer refreshes the access token when it enters the
//! refresh window. The timer holds only a weak reference and is aborted
//! on logout and shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::api::{AuthApiClient, DeviceInfo, TokenResponse};
use super::session::{AuthState, UserInfo, REFRESH_THRESHOLD_SECS};
use crate::error::{AuthError, SyncResult};
use crate::traits::{AccessTokenProvider, SessionStore};

struct RefreshTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner {
    api: AuthApiClient,
    store: Arc<dyn SessionStore>,
    device: DeviceInfo,
    threshold_secs: i64,
    state: RwLock<AuthState>,
    /// Serializes refreshes so concurrent callers share one rotation.
    refresh_lock: tokio::sync::Mutex<()>,
    timer: Mutex<Option<RefreshTimer>>,
    next_generation: AtomicU64,
}

/// Owns the server session: login, silent refresh, persistence, logout.
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.inner.api.base_url())
            .field("device", &self.inner.device)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(api: AuthApiClient, store: Arc<dyn SessionStore>, device: DeviceInfo) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                device,
                threshold_secs: REFRESH_THRESHOLD_SECS,
                state: RwLock::new(AuthState::default()),
                refresh_lock: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Restore the persisted session and schedule its refresh.
    ///
    /// A token already inside the refresh window is refreshed right away
    /// in the background.
    pub async fn load(&self) -> SyncResult<bool> {
        let Some(state) = self.inner.store.load().await? else {
            return Ok(false);
        };
        if !state.is_usable() {
            return Ok(false);
        }

        debug!(
            user = state.user.as_ref().map(|u| u.id.as_str()),
            "Restored session"
        );
        let expires_at = state.expires_at;
        *self.inner.state.write().await = state;
        Inner::schedule_refresh(&self.inner, expires_at);
        Ok(true)
    }

    pub async fn login(&self, email: &str, password: &str) -> SyncResult<AuthState> {
        let tokens = self
            .inner
            .api
            .login(email, password, &self.inner.device)
            .await?;
        let state = self.inner.establish(tokens, Some(email)).await;
        info!("Logged in");
        Ok(state)
    }

    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> SyncResult<AuthState> {
        let tokens = self
            .inner
            .api
            .register(email, username, password, &self.inner.device)
            .await?;
        let mut state = self.inner.establish(tokens, Some(email)).await;
        if let Some(user) = state.user.as_mut() {
            user.username.get_or_insert_with(|| username.to_string());
        }
        *self.inner.state.write().await = state.clone();
        self.inner.persist(&state).await;
        info!("Registered account");
        Ok(state)
    }

    /// Current access token, refreshed first when close to expiry.
    ///
    /// `Ok(None)` when nobody is signed in.
    pub async fn get_access_token(&self) -> SyncResult<Option<String>> {
        let state = self.inner.state.read().await.clone();
        if !state.is_authenticated {
            return Ok(None);
        }
        if !state.needs_refresh(self.inner.threshold_secs) {
            return Ok(state.access_token);
        }

        self.inner.refresh_if_needed().await?;
        Ok(self.inner.state.read().await.access_token.clone())
    }

    /// Rotate tokens now. Clears the session if the server refuses.
    pub async fn refresh_access_token(&self) -> SyncResult<()> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.inner.refresh().await
    }

    /// Best-effort server logout, then clear the local session.
    pub async fn logout(&self) -> SyncResult<()> {
        self.inner.cancel_timer();
        let state = self.inner.state.read().await.clone();

        if let Some(token) = state.access_token.as_deref() {
            if let Err(e) = self
                .inner
                .api
                .logout(token, state.refresh_token.as_deref())
                .await
            {
                warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
        }

        self.inner.clear().await?;
        info!("Logged out");
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.read().await.is_authenticated
    }

    pub async fn state(&self) -> AuthState {
        self.inner.state.read().await.clone()
    }

    pub async fn user(&self) -> Option<UserInfo> {
        self.inner.state.read().await.user.clone()
    }

    /// Whether a background refresh is scheduled.
    pub fn has_refresh_timer(&self) -> bool {
        self.inner
            .timer
            .lock()
            .map(|t| t.as_ref().is_some_and(|t| !t.handle.is_finished()))
            .unwrap_or(false)
    }

    /// Stop the refresh timer without touching the session.
    pub fn shutdown(&self) {
        self.inner.cancel_timer();
    }
}

impl Inner {
    /// Install a fresh token pair, persist it and schedule its refresh.
    async fn establish(self: &Arc<Self>, tokens: TokenResponse, email: Option<&str>) -> AuthState {
        let expires_at = Utc::now().timestamp() + tokens.lifetime_secs() as i64;
        let mut user = tokens.user.clone();
        if let (Some(user), Some(email)) = (user.as_mut(), email) {
            user.email.get_or_insert_with(|| email.to_string());
        }

        let state = AuthState {
            is_authenticated: true,
            user,
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            expires_at: Some(expires_at),
        };

        *self.state.write().await = state.clone();
        self.persist(&state).await;
        Self::schedule_refresh(self, Some(expires_at));
        state
    }

    async fn persist(&self, state: &AuthState) {
        if let Err(e) = self.store.save(state).await {
            warn!(error = %e, "Failed to persist session");
        }
    }

    /// Refresh unless another caller already did while we waited.
    async fn refresh_if_needed(self: &Arc<Self>) -> SyncResult<()> {
        let _guard = self.refresh_lock.lock().await;
        let state = self.state.read().await.clone();
        if !state.is_authenticated {
            return Err(AuthError::NotAuthenticated.into());
        }
        if !state.needs_refresh(self.threshold_secs) {
            return Ok(());
        }
        self.refresh().await
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh(self: &Arc<Self>) -> SyncResult<()> {
        let state = self.state.read().await.clone();
        let Some(refresh_token) = state.refresh_token.clone() else {
            self.clear().await?;
            return Err(AuthError::NotAuthenticated.into());
        };

        match self.api.refresh_token(&refresh_token).await {
            Ok(tokens) => {
                let user = state.user.clone();
                let mut refreshed = self.establish(tokens, None).await;
                if refreshed.user.is_none() {
                    refreshed.user = user;
                    *self.state.write().await = refreshed.clone();
                    self.persist(&refreshed).await;
                }
                debug!(expires_at = refreshed.expires_at, "Access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, signing out");
                self.cancel_timer();
                self.clear().await?;
                Err(AuthError::RefreshFailed {
                    message: e.to_string(),
                }
                .into())
            }
        }
    }

    async fn clear(&self) -> SyncResult<()> {
        *self.state.write().await = AuthState::default();
        self.store.clear().await
    }

    fn schedule_refresh(this: &Arc<Self>, expires_at: Option<i64>) {
        let delay_secs = match expires_at {
            Some(expires_at) => (expires_at - this.threshold_secs - Utc::now().timestamp()).max(0),
            None => 0,
        };
        let generation = this.next_generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Hold the slot while spawning so a zero-delay task cannot look
        // for its handle before it is stored.
        let Ok(mut slot) = this.timer.lock() else {
            return;
        };
        let weak: Weak<Self> = Arc::downgrade(this);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay_secs as u64)).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Detach our own handle so the reschedule inside refresh()
            // does not abort this task.
            let current = inner.timer.lock().ok().and_then(|mut slot| {
                match slot.as_ref() {
                    Some(t) if t.generation == generation => slot.take(),
                    _ => None,
                }
            });
            if current.is_none() {
                return;
            }
            if let Err(e) = inner.refresh_if_needed().await {
                warn!(error = %e, "Scheduled token refresh failed");
            }
        });

        debug!(delay_secs, "Scheduled token refresh");
        if let Some(old) = slot.replace(RefreshTimer { generation, handle }) {
            old.handle.abort();
        }
    }

    fn cancel_timer(&self) {
        if let Ok(mut slot) = self.timer.lock() {
            if let Some(timer) = slot.take() {
                timer.handle.abort();
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[async_trait]
impl AccessTokenProvider for SessionManager {
    async fn access_token(&self) -> SyncResult<Option<String>> {
        self.get_access_token().await
    }
}
