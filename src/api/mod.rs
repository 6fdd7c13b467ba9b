//! Analytics HTTP API.
//!
//! - `client`: request/response client and error type.
//! - `types`: response payloads and query filters.

/// HTTP client and error type.
pub mod client;
/// Response payloads and query filters.
pub mod types;

pub use client::{ApiClient, ApiClientOptions, ApiDefaults, ApiError, API_BASE_URL};
