use crate::core::errors::ExchangeError;
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::instrument;

pub type WsSink = Pin<Box<dyn Sink<Message, Error = ExchangeError> + Send>>;
pub type WsStream = Pin<Box<dyn Stream<Item = Result<Message, ExchangeError>> + Send>>;

/// An open socket split into its write and read halves.
pub struct WsSocket {
    pub sink: WsSink,
    pub stream: WsStream,
}

impl WsSocket {
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<Message, Error = ExchangeError> + Send + 'static,
        R: Stream<Item = Result<Message, ExchangeError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for WsSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSocket").finish_non_exhaustive()
    }
}

/// Opens sockets for a session. The session owns reconnect policy; a
/// connector only knows how to dial once.
#[async_trait]
pub trait WsConnector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<WsSocket, ExchangeError>;
}

/// Tungstenite-based connector
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl WsConnector for TungsteniteConnector {
    #[instrument(skip(self))]
    async fn connect(&self, url: &str) -> Result<WsSocket, ExchangeError> {
        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| ExchangeError::NetworkError("WebSocket connection timeout".to_string()))?
            .map_err(|e| {
                ExchangeError::NetworkError(format!("WebSocket connection failed: {}", e))
            })?;

        let (write, read) = ws_stream.split();
        let sink = write.sink_map_err(|e| ExchangeError::WebSocketError(e.to_string()));
        let stream =
            read.map(|frame| frame.map_err(|e| ExchangeError::WebSocketError(e.to_string())));

        Ok(WsSocket::new(sink, stream))
    }
}
