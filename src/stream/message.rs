//! Wire messages exchanged with the gateway.
//!
//! Inbound frames are text, each holding one JSON object or several joined by
//! newlines. The only outbound frame this client ever sends is the wildcard
//! subscribe request, once per successful connect.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of an inbound message, from the wire `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Welcome frame sent by the gateway right after the handshake
    /// (`type: "connected"`).
    Welcome,
    /// Acknowledgement of a subscribe request.
    Subscribed,
    /// A banking event forwarded from the bus.
    Event,
    /// Keep-alive reply.
    Pong,
    /// Anything this client does not understand.
    Unknown(String),
}

impl MessageKind {
    fn from_wire(kind: &str) -> Self {
        match kind {
            "connected" => MessageKind::Welcome,
            "subscribed" => MessageKind::Subscribed,
            "event" => MessageKind::Event,
            "pong" => MessageKind::Pong,
            other => MessageKind::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    topic: Option<String>,
    // Event frames carry `payload`; some informational frames use `data`.
    payload: Option<Value>,
    data: Option<Value>,
    #[serde(default)]
    timestamp: String,
}

/// One parsed inbound message. Ephemeral: dispatched, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub topic: Option<String>,
    pub payload: Option<Value>,
    pub timestamp: String,
}

impl InboundMessage {
    /// Parse a single JSON object.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let wire: WireMessage = serde_json::from_str(raw)?;
        Ok(Self {
            kind: MessageKind::from_wire(&wire.kind),
            topic: wire.topic,
            payload: wire.payload.or(wire.data),
            timestamp: wire.timestamp,
        })
    }
}

/// Split a text frame into candidate JSON objects.
///
/// The gateway may join several messages with newlines; blank lines are
/// skipped.
pub fn split_frame(frame: &str) -> impl Iterator<Item = &str> {
    frame.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Outbound subscribe request. Topic `*` subscribes to all categories.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    action: &'static str,
    topic: String,
}

impl SubscribeRequest {
    pub fn all_topics() -> Self {
        Self::topic("*")
    }

    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            action: "subscribe",
            topic: topic.into(),
        }
    }

    /// Serialize to the wire text form.
    pub fn to_frame(&self) -> String {
        // Struct of two strings, serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
