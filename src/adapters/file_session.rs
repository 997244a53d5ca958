//! File-based session store adapter.
//!
//! Persists the server session as `session.json` in the data directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::auth::AuthState;
use crate::error::SyncResult;
use crate::storage;
use crate::traits::SessionStore;

/// Session file name inside the data directory.
pub const SESSION_FILE: &str = "session.json";

/// File-based session store.
///
/// # Example
///
/// ```ignore
/// use keysync::adapters::FileSessionStore;
/// use keysync::traits::SessionStore;
///
/// let store = FileSessionStore::in_data_dir()?;
/// if let Some(state) = store.load().await? {
///     println!("signed in: {}", state.is_authenticated);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store the session at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store the session in `dir/session.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE))
    }

    /// Store the session in the default data directory.
    pub fn in_data_dir() -> SyncResult<Self> {
        Ok(Self::in_dir(&storage::data_dir()?))
    }

    /// Get the path to the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> SyncResult<Option<AuthState>> {
        // An all-default state on disk means nobody is signed in.
        let state: Option<AuthState> = storage::load_json(&self.path)?;
        Ok(state.filter(|s| *s != AuthState::default()))
    }

    async fn save(&self, state: &AuthState) -> SyncResult<()> {
        storage::save_json(&self.path, state)
    }

    async fn clear(&self) -> SyncResult<()> {
        storage::remove_file(&self.path)
    }
}
