//! Banking event model shared by the stream layer and the store.
//!
//! The simulation publishes four event kinds on `bancaire.*` topics. Anything
//! else that shows up on the stream is kept as a raw event without a category
//! so observers can still display it.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four event categories produced by the banking simulation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Account opened (`bancaire.compte.ouvert`).
    CompteOuvert,
    /// Deposit made (`bancaire.depot.effectue`).
    DepotEffectue,
    /// Withdrawal made (`bancaire.retrait.effectue`).
    RetraitEffectue,
    /// Transfer issued (`bancaire.virement.emis`).
    VirementEmis,
}

impl EventCategory {
    /// All known categories, in display order.
    pub const ALL: [EventCategory; 4] = [
        EventCategory::CompteOuvert,
        EventCategory::DepotEffectue,
        EventCategory::RetraitEffectue,
        EventCategory::VirementEmis,
    ];

    /// Resolve a category from a full stream topic.
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            "bancaire.compte.ouvert" => Some(EventCategory::CompteOuvert),
            "bancaire.depot.effectue" => Some(EventCategory::DepotEffectue),
            "bancaire.retrait.effectue" => Some(EventCategory::RetraitEffectue),
            "bancaire.virement.emis" => Some(EventCategory::VirementEmis),
            _ => None,
        }
    }

    /// The full topic this category is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            EventCategory::CompteOuvert => "bancaire.compte.ouvert",
            EventCategory::DepotEffectue => "bancaire.depot.effectue",
            EventCategory::RetraitEffectue => "bancaire.retrait.effectue",
            EventCategory::VirementEmis => "bancaire.virement.emis",
        }
    }

    /// Short name with the `bancaire.` prefix stripped.
    pub fn short_name(&self) -> &'static str {
        match self {
            EventCategory::CompteOuvert => "compte.ouvert",
            EventCategory::DepotEffectue => "depot.effectue",
            EventCategory::RetraitEffectue => "retrait.effectue",
            EventCategory::VirementEmis => "virement.emis",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// One event as held by the store after it has been accepted off the stream.
///
/// Never mutated after creation; dropped only by eviction from the bounded
/// list or an explicit clear.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredEvent {
    /// Locally generated id, unique per received event.
    pub id: String,
    /// Category derived from the topic; `None` for topics outside the known
    /// set (such events are displayed but never counted).
    pub category: Option<EventCategory>,
    /// Raw routing topic from the stream frame.
    pub topic: String,
    /// Timestamp string carried on the frame, passed through untouched.
    pub timestamp: String,
    /// RFC 3339 instant at which this client accepted the event.
    pub received_at: String,
    /// Opaque event payload.
    pub payload: serde_json::Value,
}

impl StoredEvent {
    /// Build a stored event from the pieces of a validated `event` frame.
    pub fn new(topic: String, timestamp: String, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category: EventCategory::from_topic(&topic),
            topic,
            timestamp,
            received_at: Utc::now().to_rfc3339(),
            payload,
        }
    }
}
