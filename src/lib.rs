//! keysync - encrypted cross-device sync for API key configuration
//!
//! A local snapshot of provider credentials is encrypted under a master
//! password and reconciled against a remote copy kept on a sync server,
//! a private gist or a WebDAV share.
//!
//! This library exposes modules for use in integration tests.

pub mod adapters;
pub mod auth;
pub mod backend;
pub mod cli;
pub mod crypto;
pub mod error;
pub mod models;
pub mod storage;
pub mod sync;
pub mod traits;
pub mod transport;
