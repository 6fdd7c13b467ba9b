//! Rust SDK for the Vyper market-data API and realtime event stream.
//!
//! The crate is organized by transport surface:
//! - `api`: HTTP client for token, wallet, and market analytics.
//! - `stream`: websocket session for token, migration, and wallet feeds.

/// HTTP analytics client and response types.
pub mod api;
/// Realtime stream session, protocol types, and event dispatch.
pub mod stream;

pub use api::{ApiClient, ApiError};
pub use stream::client::{StreamClient, StreamClientError};
pub use stream::dispatch::StreamEvent;
pub use stream::proto::{FeedType, SubscriptionCommand};
