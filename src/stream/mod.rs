//! Live event-stream client.
//!
//! This module owns the single connection to the gateway's WebSocket
//! endpoint:
//! - `transport`: transport abstraction plus the tokio-tungstenite impl
//! - `message`: wire message parsing and the subscribe request
//! - `manager`: connection state machine with fixed-delay reconnection

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod manager;
pub mod message;
pub mod transport;

pub use manager::{ConnectionManager, DisconnectHandle, ManagerConfig, Scheduler, TokioScheduler};
pub use message::{InboundMessage, MessageKind, SubscribeRequest};
pub use transport::{StreamConnector, StreamTransport, TransportError, WsConnector};

/// Lifecycle state of the stream connection.
///
/// Owned by the [`ConnectionManager`]; mirrored into the store so observers
/// can show a connection indicator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}
