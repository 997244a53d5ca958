//! Unified error handling for the sync engine.
//!
//! - **Error Categories**: classification used for retry and messaging decisions
//! - **Domain-specific Errors**: Network, Auth, Data, Config and System errors
//! - **Unified Error Type**: `SyncError` consolidates all error types
//! - **Error Context**: operation and backend attached at public entry points
//! - **Result Type Alias**: `SyncResult<T>` for consistent return types
//!
//! # Error Categories
//!
//! | Category | Description | Retried automatically |
//! |----------|-------------|-----------------------|
//! | Connection | Connection refused, DNS, timeout | Yes |
//! | Server | 5xx / 408 / 429 after retries exhausted | Already retried |
//! | Auth | 401/403, expired session, master password | No |
//! | Data | Malformed or tampered package, checksum mismatch | No |
//! | User | Weak password, invalid input | No |
//! | System | Filesystem errors | No |
//! | Configuration | Missing backend settings | No |
//!
//! A conflict between devices is not an error; it is reported as a
//! distinct sync outcome.

mod auth;
mod category;
mod config;
mod context;
mod data;
mod network;
mod result;
mod sync_error;
mod system;

pub use auth::AuthError;
pub use category::ErrorCategory;
pub use config::ConfigError;
pub use context::ErrorContext;
pub use data::DataError;
pub use network::{classify_reqwest_error, is_retryable_status, NetworkError};
pub use result::{ResultExt, SyncResult};
pub use sync_error::SyncError;
pub use system::{classify_io_error, SystemError};
