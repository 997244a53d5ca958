//! Mock implementations for testing.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - HTTP client with queued responses
//! - [`InMemorySessionStore`] - In-memory session storage
//! - [`InMemoryBackend`] - Sync backend holding the remote package in memory

pub mod backend;
pub mod http;
pub mod session;

pub use backend::InMemoryBackend;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use session::InMemorySessionStore;
