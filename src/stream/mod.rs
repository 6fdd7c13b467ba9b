//! Realtime event stream modules.
//!
//! - `client`: websocket session lifecycle, subscription commands, and the
//!   receive loop.
//! - `dispatch`: feed-driven decoding of inbound frames into typed events.
//! - `proto`: feed names, subscription commands, and event payloads.

/// Websocket session and connection worker.
pub mod client;
/// Inbound frame decoding and handler types.
pub mod dispatch;
/// Stream protocol messages.
pub mod proto;
