//! Stream session: websocket lifecycle, subscription commands, and the
//! receive loop.
//!
//! A connected session spawns a background worker that owns the websocket.
//! Outbound frames reach it over a command channel and inbound frames come
//! back on a bounded queue that [`StreamClient::listen`] drains without
//! holding the session lock, so [`StreamClient::disconnect`] can run from
//! another task while a receive is pending. While the queue is full the
//! worker stops reading the socket but still serves commands.

use std::borrow::Cow;
use std::sync::{Arc, RwLock};

use futures_util::{SinkExt, Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::mpsc::OwnedPermit;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, warn};
use url::Url;

use crate::stream::dispatch::{decode_event, MessageHandler, StreamEvent};
use crate::stream::proto::{FeedType, SubscriptionCommand};

/// Production websocket endpoint for the event stream.
pub const STREAM_ENDPOINT: &str = "wss://api.vyper.trade/api/v1/ws";
const API_KEY_QUERY_PARAM: &str = "apiKey";
const REDACTED: &str = "REDACTED";
/// Frames read ahead of the consumer. The socket is not polled while full.
const INBOUND_CAPACITY: usize = 16;

/// Stream session bound to at most one websocket connection at a time.
///
/// All methods take `&self`; wrap the client in an [`Arc`] to run
/// [`listen`](Self::listen) on one task and issue commands from another.
pub struct StreamClient {
    api_key: SecretString,
    endpoint: String,
    state: Mutex<Option<Connection>>,
    handler: RwLock<Option<MessageHandler>>,
}

impl StreamClient {
    /// Creates a disconnected client for the production endpoint.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            endpoint: STREAM_ENDPOINT.to_string(),
            state: Mutex::new(None),
            handler: RwLock::new(None),
        }
    }

    /// Sets the base endpoint the feed path is appended to.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.endpoint = endpoint.trim_end().trim_end_matches('/').to_string();
        self
    }

    /// Registers the callback invoked for every decoded event.
    ///
    /// Replaces any previous handler, including while `listen` is running.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(StreamEvent) + Send + Sync + 'static,
    {
        self.replace_handler(Some(Arc::new(handler)));
    }

    /// Removes the registered handler; decoded events are then discarded.
    pub fn clear_handler(&self) {
        self.replace_handler(None);
    }

    /// Returns the feed of the live connection, if any.
    pub async fn current_feed(&self) -> Option<FeedType> {
        self.state.lock().await.as_ref().map(|connection| connection.feed)
    }

    /// True while a connection is held, including one the peer has closed
    /// but that has not been disconnected or aborted yet.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Opens the websocket for `feed`.
    ///
    /// Fails with [`StreamClientError::AlreadyConnected`] if a connection is
    /// held. Connection failures are returned as
    /// [`StreamClientError::ConnectionError`] and are not retried.
    pub async fn connect(&self, feed: FeedType) -> Result<(), StreamClientError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(StreamClientError::AlreadyConnected);
        }

        let url = self.feed_url(feed)?;
        let (socket, _) = connect_async(url.as_str()).await.map_err(|source| {
            let url = redact_api_key(&url);
            warn!(event = "stream_connect_failed", %feed, %url, error = %source);
            StreamClientError::ConnectionError { url, source }
        })?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        tokio::spawn(connection_worker(socket, command_rx, inbound_tx));

        *state = Some(Connection {
            feed,
            commands: command_tx,
            inbound: Arc::new(Mutex::new(inbound_rx)),
        });
        debug!(event = "stream_connected", %feed);
        Ok(())
    }

    /// Sends a normal-closure close frame, then drops the websocket.
    ///
    /// If the close frame cannot be sent the error is returned and the
    /// session stays connected; use [`abort`](Self::abort) to force teardown.
    pub async fn disconnect(&self) -> Result<(), StreamClientError> {
        let mut state = self.state.lock().await;
        let connection = state.as_ref().ok_or(StreamClientError::NotConnected)?;

        connection
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: Cow::Borrowed(""),
            })))
            .await?;
        connection.shutdown().await;

        let feed = connection.feed;
        *state = None;
        debug!(event = "stream_disconnected", %feed);
        Ok(())
    }

    /// Drops the websocket without a close handshake and clears the session.
    pub async fn abort(&self) -> Result<(), StreamClientError> {
        let mut state = self.state.lock().await;
        let connection = state.take().ok_or(StreamClientError::NotConnected)?;
        connection.shutdown().await;
        debug!(event = "stream_aborted", feed = %connection.feed);
        Ok(())
    }

    /// Sends an empty ping frame. Does not wait for the pong.
    pub async fn ping(&self) -> Result<(), StreamClientError> {
        let state = self.state.lock().await;
        let connection = state.as_ref().ok_or(StreamClientError::NotConnected)?;
        connection.send(Message::Ping(Vec::new())).await
    }

    /// Sends a subscription command on the connection opened for `feed`.
    pub async fn subscribe<C>(&self, feed: FeedType, command: C) -> Result<(), StreamClientError>
    where
        C: Into<SubscriptionCommand>,
    {
        let command = command.into();
        let state = self.state.lock().await;
        let connection = state.as_ref().ok_or(StreamClientError::NotConnected)?;
        if connection.feed != feed {
            return Err(StreamClientError::FeedMismatch {
                expected: connection.feed,
                actual: feed,
            });
        }

        let text = command.to_text().map_err(StreamClientError::Encode)?;
        connection.send(Message::Text(text)).await?;
        debug!(
            event = "stream_subscription_sent",
            %feed,
            action = ?command.action()
        );
        Ok(())
    }

    /// Same wire path as [`subscribe`](Self::subscribe); the command's
    /// `action` field carries the intent.
    pub async fn unsubscribe<C>(&self, feed: FeedType, command: C) -> Result<(), StreamClientError>
    where
        C: Into<SubscriptionCommand>,
    {
        self.subscribe(feed, command).await
    }

    /// Receives and decodes the next inbound event.
    pub async fn recv(&self) -> Result<StreamEvent, StreamClientError> {
        let (feed, inbound) = self.inbound().await?;
        let mut inbound = inbound.lock().await;
        next_event(feed, &mut inbound).await
    }

    /// Runs the receive loop, invoking the handler for every event.
    ///
    /// Only returns when the loop stops, so the result is always an error:
    /// a closure (see [`StreamClientError::is_closed`]), a transport failure,
    /// or a [`StreamClientError::Decode`] for a malformed frame. The loop does
    /// not reconnect.
    pub async fn listen(&self) -> Result<(), StreamClientError> {
        let (feed, inbound) = self.inbound().await?;
        let mut inbound = inbound.lock().await;

        loop {
            let event = next_event(feed, &mut inbound).await?;
            if let Some(handler) = self.current_handler() {
                handler(event);
            }
        }
    }

    fn feed_url(&self, feed: FeedType) -> Result<Url, StreamClientError> {
        let mut url = Url::parse(&format!("{}/{}", self.endpoint, feed))?;
        url.query_pairs_mut()
            .append_pair(API_KEY_QUERY_PARAM, self.api_key.expose_secret());
        Ok(url)
    }

    async fn inbound(&self) -> Result<(FeedType, InboundQueue), StreamClientError> {
        let state = self.state.lock().await;
        let connection = state.as_ref().ok_or(StreamClientError::NotConnected)?;
        Ok((connection.feed, Arc::clone(&connection.inbound)))
    }

    fn replace_handler(&self, handler: Option<MessageHandler>) {
        if let Ok(mut guard) = self.handler.write() {
            *guard = handler;
        }
    }

    fn current_handler(&self) -> Option<MessageHandler> {
        self.handler.read().ok().and_then(|guard| guard.clone())
    }
}

/// Errors produced by the stream session.
#[derive(Debug, Error)]
pub enum StreamClientError {
    #[error("already connected")]
    AlreadyConnected,

    #[error("not connected")]
    NotConnected,

    /// Command targeted a feed other than the one the session is open on.
    #[error("feed type mismatch: connected to {expected}, got {actual}")]
    FeedMismatch { expected: FeedType, actual: FeedType },

    /// Websocket could not be opened. `url` has the API key redacted.
    #[error("failed to connect to {url}: {source}")]
    ConnectionError {
        url: String,
        #[source]
        source: WsError,
    },

    #[error("invalid stream endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Inbound frame was not a JSON object of the feed's shape.
    #[error("failed to decode stream frame: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode subscription: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("unknown feed type: {0}")]
    UnknownFeed(String),

    /// Peer closed the connection with status 1000.
    #[error("connection closed by peer (normal closure)")]
    NormalClosure,

    /// Peer closed the connection with a non-normal status.
    #[error("connection closed by peer (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },

    /// Socket ended without a close frame, or was torn down locally.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("websocket error: {0}")]
    WebSocket(#[source] WsError),
}

impl StreamClientError {
    pub fn is_normal_closure(&self) -> bool {
        matches!(self, Self::NormalClosure)
    }

    /// True for every way the connection can end, normal or not.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::NormalClosure | Self::Closed { .. } | Self::ConnectionClosed
        )
    }
}

impl From<WsError> for StreamClientError {
    fn from(error: WsError) -> Self {
        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
            other => Self::WebSocket(other),
        }
    }
}

type InboundQueue = Arc<Mutex<mpsc::Receiver<Inbound>>>;

struct Connection {
    feed: FeedType,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    inbound: InboundQueue,
}

impl Connection {
    async fn send(&self, message: Message) -> Result<(), StreamClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(WorkerCommand::Send {
                message,
                reply: reply_tx,
            })
            .map_err(|_| StreamClientError::ConnectionClosed)?;
        reply_rx
            .await
            .map_err(|_| StreamClientError::ConnectionClosed)?
    }

    async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(WorkerCommand::Shutdown { reply: reply_tx })
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }
}

enum WorkerCommand {
    Send {
        message: Message,
        reply: oneshot::Sender<Result<(), StreamClientError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum Inbound {
    Frame(Vec<u8>),
    Close(Option<CloseFrame<'static>>),
    Error(WsError),
}

async fn connection_worker<S>(
    mut socket: tokio_tungstenite::WebSocketStream<S>,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    inbound_tx: mpsc::Sender<Inbound>,
) where
    tokio_tungstenite::WebSocketStream<S>: futures_util::Sink<Message, Error = WsError>
        + Stream<Item = Result<Message, WsError>>
        + Unpin,
{
    // Dropped once the socket stops yielding frames so `listen` observes the end.
    let mut inbound = Some(inbound_tx);
    // A frame is only read once a queue slot is held for it.
    let mut slot: Option<OwnedPermit<Inbound>> = None;

    let shutdown_reply = loop {
        tokio::select! {
            maybe_command = commands.recv() => {
                match maybe_command {
                    Some(WorkerCommand::Send { message, reply }) => {
                        let result = socket.send(message).await.map_err(StreamClientError::from);
                        let _ = reply.send(result);
                    }
                    Some(WorkerCommand::Shutdown { reply }) => break Some(reply),
                    None => break None,
                }
            }
            reserved = reserve_slot(inbound.clone()), if slot.is_none() && inbound.is_some() => {
                match reserved {
                    Some(permit) => slot = Some(permit),
                    None => inbound = None,
                }
            }
            maybe_inbound = socket.next(), if slot.is_some() => {
                match maybe_inbound {
                    Some(Ok(Message::Text(text))) => deliver(&mut slot, Inbound::Frame(text.into_bytes())),
                    Some(Ok(Message::Binary(bytes))) => deliver(&mut slot, Inbound::Frame(bytes)),
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = socket.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        debug!(
                            event = "stream_closed_by_peer",
                            code = frame.as_ref().map(|frame| u16::from(frame.code))
                        );
                        // Keep polling so the close reply is flushed.
                        deliver(&mut slot, Inbound::Close(frame));
                    }
                    Some(Err(err)) => {
                        deliver(&mut slot, Inbound::Error(err));
                        inbound = None;
                    }
                    None => {
                        slot = None;
                        inbound = None;
                    }
                }
            }
        }
    };

    drop(socket);
    drop(slot);
    drop(inbound);
    if let Some(reply) = shutdown_reply {
        let _ = reply.send(());
    }
}

async fn reserve_slot(inbound: Option<mpsc::Sender<Inbound>>) -> Option<OwnedPermit<Inbound>> {
    inbound?.reserve_owned().await.ok()
}

fn deliver(slot: &mut Option<OwnedPermit<Inbound>>, item: Inbound) {
    if let Some(permit) = slot.take() {
        permit.send(item);
    }
}

async fn next_event(
    feed: FeedType,
    inbound: &mut mpsc::Receiver<Inbound>,
) -> Result<StreamEvent, StreamClientError> {
    match inbound.recv().await {
        Some(Inbound::Frame(payload)) => decode_event(feed, &payload).map_err(|err| {
            warn!(event = "stream_frame_decode_failed", %feed, error = %err);
            err
        }),
        Some(Inbound::Close(frame)) => Err(closure_error(frame)),
        Some(Inbound::Error(err)) => Err(err.into()),
        None => Err(StreamClientError::ConnectionClosed),
    }
}

fn closure_error(frame: Option<CloseFrame<'static>>) -> StreamClientError {
    match frame {
        Some(frame) if frame.code == CloseCode::Normal => StreamClientError::NormalClosure,
        Some(frame) => StreamClientError::Closed {
            code: Some(u16::from(frame.code)),
            reason: frame.reason.into_owned(),
        },
        None => StreamClientError::Closed {
            code: None,
            reason: String::new(),
        },
    }
}

fn redact_api_key(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == API_KEY_QUERY_PARAM {
                REDACTED.to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(&pairs);
    redacted.to_string()
}
