//! WebSocket client for the hub event stream.
//!
//! The node only reads: a background read pump forwards inbound frames
//! through a channel and answers pings. Closing or dropping the client
//! releases the underlying connection.

use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use hyperion_protocol::constants::{WS_CLOSE_TIMEOUT, WS_HANDSHAKE_TIMEOUT, WS_MAX_MESSAGE_SIZE};

use crate::target::TargetError;
use crate::types::HubMessage;

/// Errors from the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("invalid stream target: {0}")]
    Target(#[from] TargetError),

    #[error("handshake timed out")]
    Timeout,
}

/// Future returned by [`Connector::connect`].
pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = Result<WsClient, WsError>> + Send + 'a>>;

/// Opens stream connections for the supervisor.
pub trait Connector: Send + Sync {
    /// Connects to the stream endpoint `uri`.
    fn connect<'a>(&'a self, uri: &'a str) -> ConnectFuture<'a>;
}

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect<'a>(&'a self, uri: &'a str) -> ConnectFuture<'a> {
        Box::pin(WsClient::connect(uri))
    }
}

/// Read-only WebSocket connection to a hub.
pub struct WsClient {
    events_rx: mpsc::Receiver<HubMessage>,
    read_handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WsClient {
    /// Opens a WebSocket to `uri` and starts the read pump.
    pub async fn connect(uri: &str) -> Result<Self, WsError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

        let (ws_stream, _) = tokio::time::timeout(
            WS_HANDSHAKE_TIMEOUT,
            tokio_tungstenite::connect_async_with_config(uri, Some(ws_config), false),
        )
        .await
        .map_err(|_| WsError::Timeout)??;

        let (write, read) = ws_stream.split();
        Ok(Self::from_parts(read, write))
    }

    /// Builds a client over an already-open frame stream and sink.
    pub(crate) fn from_parts<R, W>(read: R, write: W) -> Self
    where
        R: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin + Send + 'static,
        W: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin + Send + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();

        let read_handle = {
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::read::read_pump(read, write, events_tx, cancel))
        };

        Self {
            events_rx,
            read_handle: Some(read_handle),
            cancel,
        }
    }

    /// Waits for the next hub message. Returns `None` once the stream has
    /// ended, whether closed by the hub or by a transport error.
    pub async fn next_message(&mut self) -> Option<HubMessage> {
        self.events_rx.recv().await
    }

    /// Sends a close frame and waits briefly for the pump to finish.
    pub async fn close(mut self) {
        self.events_rx.close();
        self.cancel.cancel();
        if let Some(handle) = self.read_handle.take() {
            if tokio::time::timeout(WS_CLOSE_TIMEOUT, handle).await.is_err() {
                debug!("close frame not delivered in time, dropping connection");
            }
        }
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.read_handle.take() {
            handle.abort();
        }
    }
}
