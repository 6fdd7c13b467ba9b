//! Inbound frame decoding and handler dispatch.
//!
//! Each frame is first read as a generic JSON object and then coerced into
//! the typed shape selected by the feed the session was opened with.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::stream::client::StreamClientError;
use crate::stream::proto::{ChainAction, FeedType, TokenPair};

/// Typed event delivered to stream handlers.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Wallet activity from the `wallet-events` feed.
    ChainAction(ChainAction),
    /// Token snapshot from the `token-events` or `migration-events` feed.
    TokenPair(TokenPair),
}

impl StreamEvent {
    pub fn as_chain_action(&self) -> Option<&ChainAction> {
        match self {
            Self::ChainAction(action) => Some(action),
            Self::TokenPair(_) => None,
        }
    }

    pub fn as_token_pair(&self) -> Option<&TokenPair> {
        match self {
            Self::TokenPair(pair) => Some(pair),
            Self::ChainAction(_) => None,
        }
    }
}

/// Callback invoked synchronously from [`StreamClient::listen`] for every
/// decoded event.
///
/// [`StreamClient::listen`]: crate::stream::client::StreamClient::listen
pub type MessageHandler = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Decodes one inbound frame for `feed`.
///
/// Unknown keys are ignored and missing keys take zero values; a value of the
/// wrong JSON type fails the whole frame.
pub fn decode_event(feed: FeedType, payload: &[u8]) -> Result<StreamEvent, StreamClientError> {
    let record: Map<String, Value> =
        serde_json::from_slice(payload).map_err(StreamClientError::Decode)?;
    let record = Value::Object(record);

    match feed {
        FeedType::WalletEvents => serde_json::from_value(record)
            .map(StreamEvent::ChainAction)
            .map_err(StreamClientError::Decode),
        FeedType::TokenEvents | FeedType::MigrationEvents => serde_json::from_value(record)
            .map(StreamEvent::TokenPair)
            .map_err(StreamClientError::Decode),
    }
}
