//! Transport layer for the event stream.
//!
//! The connection manager talks to the gateway through the [`StreamTransport`]
//! trait so tests can run against scripted fakes. The production
//! implementation is a WebSocket client built on tokio-tungstenite.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Errors raised by the transport layer.
///
/// None of these are fatal to the client: the connection manager reacts to
/// every one of them by scheduling a reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
}

/// A live, already-opened connection to the stream endpoint.
#[async_trait]
pub trait StreamTransport: Send {
    /// Send a text frame.
    async fn send(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Wait for the next inbound text frame.
    ///
    /// Returns `None` once the peer has closed the connection.
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection. Errors during close are ignored.
    async fn close(&mut self);
}

/// Opens transports; one call per connect cycle.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StreamTransport>, TransportError>;
}

/// WebSocket connector for the gateway endpoint.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn StreamTransport>, TransportError> {
        let (socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(url = %self.url, "websocket opened");
        Ok(Box::new(WsTransport { socket }))
    }
}

struct WsTransport {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!("dropping non-utf8 binary frame"),
                },
                // Pings are answered by tungstenite on the next flush.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(_)) => return None,
                Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.socket.close(None).await;
    }
}
