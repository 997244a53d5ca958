//! In-memory sync backend for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::backend::{BackendStatus, BackendType, PullOutcome, PushReceipt, SyncBackend};
use crate::error::{NetworkError, SyncResult};
use crate::models::EncryptedPackage;

/// A backend holding the remote package in memory.
///
/// Two managers sharing one `InMemoryBackend` (it is `Clone`) behave like
/// two devices syncing through the same remote.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    package: Arc<Mutex<Option<EncryptedPackage>>>,
    /// Error returned by the next operation, once
    fail_next: Arc<Mutex<Option<NetworkError>>>,
    pushes: Arc<Mutex<usize>>,
    pulls: Arc<Mutex<usize>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend already holding a package.
    pub fn with_package(package: EncryptedPackage) -> Self {
        let backend = Self::default();
        backend.set_package(Some(package));
        backend
    }

    pub fn package(&self) -> Option<EncryptedPackage> {
        self.package.lock().unwrap().clone()
    }

    pub fn set_package(&self, package: Option<EncryptedPackage>) {
        *self.package.lock().unwrap() = package;
    }

    /// Make the next operation fail with `err`.
    pub fn fail_next(&self, err: NetworkError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    pub fn push_count(&self) -> usize {
        *self.pushes.lock().unwrap()
    }

    pub fn pull_count(&self) -> usize {
        *self.pulls.lock().unwrap()
    }

    fn take_failure(&self) -> SyncResult<()> {
        match self.fail_next.lock().unwrap().take() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SyncBackend for InMemoryBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Server
    }

    async fn connect(&self) -> SyncResult<bool> {
        self.take_failure()?;
        Ok(true)
    }

    async fn get_status(&self) -> SyncResult<BackendStatus> {
        self.take_failure()?;
        let outcome = match self.package() {
            Some(package) => PullOutcome::Found(package),
            None => PullOutcome::NotFound,
        };
        Ok(BackendStatus::from_pull(&outcome))
    }

    async fn pull(&self) -> SyncResult<PullOutcome> {
        self.take_failure()?;
        *self.pulls.lock().unwrap() += 1;
        Ok(match self.package() {
            Some(package) => PullOutcome::Found(package),
            None => PullOutcome::NotFound,
        })
    }

    async fn push(&self, package: &EncryptedPackage) -> SyncResult<PushReceipt> {
        self.take_failure()?;
        *self.pushes.lock().unwrap() += 1;
        self.set_package(Some(package.clone()));
        Ok(PushReceipt {
            timestamp: package.timestamp.clone(),
        })
    }

    async fn disconnect(&self) {}
}
