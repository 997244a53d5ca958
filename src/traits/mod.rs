//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - single-attempt HTTP transport
//! - [`SessionStore`] - persisted server session
//! - [`AccessTokenProvider`] - bearer tokens for the server backend

pub mod http;
pub mod session;

pub use http::{Headers, HttpClient, Method, Request, Response};
pub use session::{AccessTokenProvider, SessionStore};
