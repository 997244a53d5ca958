//! Authentication for the server backend.
//!
//! - [`AuthState`] - persisted session state
//! - [`AuthApiClient`] - login, register, refresh and logout calls
//! - [`SessionManager`] - session lifecycle with background token refresh

pub mod api;
pub mod manager;
pub mod session;

pub use api::{get_jwt_expires_in, AuthApiClient, DeviceInfo, TokenResponse};
pub use manager::SessionManager;
pub use session::{AuthState, UserInfo, REFRESH_THRESHOLD_SECS};
