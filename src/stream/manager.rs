//! Connection state machine and reconnect pump.
//!
//! The manager owns at most one live transport. Transitions are a pure
//! function from (state, event) to (next state, effects); the async pump
//! feeds it transport callbacks and carries out the effects. Reconnection is
//! a fixed delay with unbounded retries — a deliberate simplification, not a
//! resilience guarantee. The delay runs on an injectable [`Scheduler`] so
//! tests drive time themselves.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::events::StoredEvent;
use crate::store::EventStore;
use crate::stream::message::{split_frame, InboundMessage, MessageKind, SubscribeRequest};
use crate::stream::transport::{StreamConnector, StreamTransport};
use crate::stream::ConnectionState;

/// Fixed delay between reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Source of the reconnect delay.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn wait(&self, delay: Duration);
}

/// Production scheduler backed by the tokio timer.
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Manager tuning knobs.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub reconnect_delay: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

/// Input to the state machine.
#[derive(Debug)]
pub enum StreamEvent {
    /// The pump is about to open a transport.
    ConnectRequested,
    /// The transport opened successfully.
    Opened,
    /// The transport could not be opened.
    OpenFailed,
    /// A raw text frame arrived.
    Frame(String),
    /// The transport closed (peer close, error, network loss).
    Closed,
    /// Explicit teardown; no auto-reconnect afterwards.
    DisconnectRequested,
}

/// Side effect the pump must carry out after a transition.
#[derive(Debug, PartialEq)]
pub enum Effect {
    /// Send the wildcard subscribe request on the open transport.
    SendSubscribe,
    /// Submit an accepted event to the store.
    Record(StoredEvent),
    /// Wait out the reconnect delay, then try again.
    ScheduleReconnect,
    /// Close the transport.
    CloseTransport,
}

/// Pure transition function of the connection state machine.
pub fn transition(state: ConnectionState, event: StreamEvent) -> (ConnectionState, Vec<Effect>) {
    match (state, event) {
        (ConnectionState::Disconnected, StreamEvent::ConnectRequested) => {
            (ConnectionState::Connecting, vec![])
        }
        (ConnectionState::Connecting, StreamEvent::Opened) => {
            (ConnectionState::Connected, vec![Effect::SendSubscribe])
        }
        (ConnectionState::Connecting, StreamEvent::OpenFailed) => {
            (ConnectionState::Disconnected, vec![Effect::ScheduleReconnect])
        }
        (ConnectionState::Connected, StreamEvent::Frame(frame)) => {
            (ConnectionState::Connected, dispatch_frame(&frame))
        }
        (ConnectionState::Connected, StreamEvent::Closed) => {
            (ConnectionState::Disconnected, vec![Effect::ScheduleReconnect])
        }
        (_, StreamEvent::DisconnectRequested) => {
            (ConnectionState::Disconnected, vec![Effect::CloseTransport])
        }
        (state, event) => {
            debug!(state = %state, ?event, "ignoring event in current state");
            (state, vec![])
        }
    }
}

/// Turn one text frame into record effects.
///
/// Frames may hold several newline-joined JSON objects; each is parsed on its
/// own. Parse failures and incomplete event messages are logged and dropped —
/// best-effort telemetry, nothing surfaces to the user.
fn dispatch_frame(frame: &str) -> Vec<Effect> {
    let mut effects = Vec::new();
    for raw in split_frame(frame) {
        let message = match InboundMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "failed to parse stream frame");
                continue;
            }
        };
        match message.kind {
            MessageKind::Event => match (message.topic, message.payload) {
                (Some(topic), Some(payload)) => {
                    effects.push(Effect::Record(StoredEvent::new(
                        topic,
                        message.timestamp,
                        payload,
                    )));
                }
                _ => debug!("dropping event frame without topic or payload"),
            },
            MessageKind::Welcome => info!("stream welcome received"),
            MessageKind::Subscribed => {
                info!(topic = message.topic.as_deref().unwrap_or("*"), "subscription acknowledged");
            }
            MessageKind::Pong => debug!("keep-alive reply"),
            MessageKind::Unknown(kind) => debug!(kind = %kind, "ignoring unknown message type"),
        }
    }
    effects
}

/// Cancels a running [`ConnectionManager`].
///
/// Dropping the handle without calling [`disconnect`](Self::disconnect)
/// leaves the manager running for the rest of the session.
#[derive(Debug)]
pub struct DisconnectHandle {
    tx: watch::Sender<bool>,
}

impl DisconnectHandle {
    /// Request an explicit disconnect: close the transport, cancel any
    /// pending reconnect, stop the pump.
    pub fn disconnect(&self) {
        let _ = self.tx.send(true);
    }
}

/// Owns the single live connection to the event stream.
pub struct ConnectionManager {
    connector: Box<dyn StreamConnector>,
    store: Arc<EventStore>,
    scheduler: Box<dyn Scheduler>,
    config: ManagerConfig,
    shutdown: watch::Receiver<bool>,
}

impl ConnectionManager {
    pub fn new(
        connector: Box<dyn StreamConnector>,
        store: Arc<EventStore>,
        config: ManagerConfig,
    ) -> (Self, DisconnectHandle) {
        Self::with_scheduler(connector, store, config, Box::new(TokioScheduler))
    }

    pub fn with_scheduler(
        connector: Box<dyn StreamConnector>,
        store: Arc<EventStore>,
        config: ManagerConfig,
        scheduler: Box<dyn Scheduler>,
    ) -> (Self, DisconnectHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                connector,
                store,
                scheduler,
                config,
                shutdown: rx,
            },
            DisconnectHandle { tx },
        )
    }

    /// Run the connect/read/reconnect pump until an explicit disconnect.
    pub async fn run(mut self) {
        let mut state = ConnectionState::Disconnected;
        loop {
            if self.disconnect_requested() {
                break;
            }

            state = self.apply(state, StreamEvent::ConnectRequested, None).await;
            // A disconnect during the dial must not wait for it to resolve.
            let connected = {
                let mut shutdown = self.shutdown.clone();
                tokio::select! {
                    _ = wait_for_disconnect(&mut shutdown) => None,
                    result = self.connector.connect() => Some(result),
                }
            };
            let Some(connected) = connected else {
                state = self
                    .apply(state, StreamEvent::DisconnectRequested, None)
                    .await;
                break;
            };
            match connected {
                Ok(mut transport) => {
                    state = self
                        .apply(state, StreamEvent::Opened, Some(transport.as_mut()))
                        .await;
                    state = self.read_loop(state, transport.as_mut()).await;
                    if state == ConnectionState::Disconnected && self.disconnect_requested() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "stream connect failed");
                    state = self.apply(state, StreamEvent::OpenFailed, None).await;
                }
            }
        }
        info!("stream client stopped");
    }

    /// Pump inbound frames until the transport closes or a disconnect is
    /// requested. Returns the state after the closing transition.
    async fn read_loop(
        &mut self,
        mut state: ConnectionState,
        transport: &mut dyn StreamTransport,
    ) -> ConnectionState {
        loop {
            // Resolve the select before touching the transport again; its
            // read future borrows the transport.
            let outcome = {
                let mut shutdown = self.shutdown.clone();
                tokio::select! {
                    _ = wait_for_disconnect(&mut shutdown) => ReadOutcome::Disconnect,
                    frame = transport.next_frame() => match frame {
                        Some(Ok(text)) => ReadOutcome::Frame(text),
                        Some(Err(e)) => ReadOutcome::ReceiveFailed(e.to_string()),
                        None => ReadOutcome::Closed,
                    },
                }
            };

            match outcome {
                ReadOutcome::Frame(text) => {
                    state = self
                        .apply(state, StreamEvent::Frame(text), Some(&mut *transport))
                        .await;
                }
                ReadOutcome::ReceiveFailed(reason) => {
                    warn!(error = %reason, "stream receive failed");
                    return self
                        .apply(state, StreamEvent::Closed, Some(&mut *transport))
                        .await;
                }
                ReadOutcome::Closed => {
                    info!("stream closed by peer");
                    return self
                        .apply(state, StreamEvent::Closed, Some(&mut *transport))
                        .await;
                }
                ReadOutcome::Disconnect => {
                    return self
                        .apply(state, StreamEvent::DisconnectRequested, Some(&mut *transport))
                        .await;
                }
            }
        }
    }

    /// Run one transition and execute its effects.
    async fn apply(
        &mut self,
        state: ConnectionState,
        event: StreamEvent,
        mut transport: Option<&mut dyn StreamTransport>,
    ) -> ConnectionState {
        let (next, effects) = transition(state, event);
        if next != state {
            info!(from = %state, to = %next, "connection state changed");
            self.store.set_connection_state(next);
        }

        for effect in effects {
            match effect {
                Effect::SendSubscribe => {
                    // Only ever reached right after a successful open; with no
                    // transport at hand the send is a silent no-op.
                    if let Some(transport) = transport.as_deref_mut() {
                        let frame = SubscribeRequest::all_topics().to_frame();
                        if let Err(e) = transport.send(&frame).await {
                            warn!(error = %e, "failed to send subscribe request");
                        }
                    }
                }
                Effect::Record(event) => self.store.record_event(event),
                Effect::CloseTransport => {
                    if let Some(transport) = transport.as_deref_mut() {
                        transport.close().await;
                    }
                }
                Effect::ScheduleReconnect => {
                    let mut shutdown = self.shutdown.clone();
                    tokio::select! {
                        _ = wait_for_disconnect(&mut shutdown) => {
                            debug!("pending reconnect cancelled");
                        }
                        _ = self.scheduler.wait(self.config.reconnect_delay) => {}
                    }
                }
            }
        }
        next
    }

    fn disconnect_requested(&self) -> bool {
        *self.shutdown.borrow()
    }
}

enum ReadOutcome {
    Frame(String),
    ReceiveFailed(String),
    Closed,
    Disconnect,
}

/// Resolve once an explicit disconnect has been requested.
async fn wait_for_disconnect(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        // Handle dropped without a disconnect: keep running forever.
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn connect_cycle_transitions() {
        let (state, effects) =
            transition(ConnectionState::Disconnected, StreamEvent::ConnectRequested);
        assert_eq!(state, ConnectionState::Connecting);
        assert!(effects.is_empty());

        let (state, effects) = transition(state, StreamEvent::Opened);
        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(effects, vec![Effect::SendSubscribe]);

        let (state, effects) = transition(state, StreamEvent::Closed);
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(effects, vec![Effect::ScheduleReconnect]);
    }

    #[test]
    fn open_failure_schedules_reconnect() {
        let (state, effects) = transition(ConnectionState::Connecting, StreamEvent::OpenFailed);
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(effects, vec![Effect::ScheduleReconnect]);
    }

    #[test]
    fn disconnect_closes_without_reconnect() {
        let (state, effects) =
            transition(ConnectionState::Connected, StreamEvent::DisconnectRequested);
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(effects, vec![Effect::CloseTransport]);
    }

    #[test]
    fn event_frame_becomes_record_effect() {
        let frame = r#"{"type":"event","topic":"bancaire.virement.emis","payload":{"montant":"9.99"},"timestamp":"T1"}"#;
        let (state, effects) =
            transition(ConnectionState::Connected, StreamEvent::Frame(frame.to_string()));

        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(effects.len(), 1);
        match &effects[0] {
            Effect::Record(event) => {
                assert_eq!(event.topic, "bancaire.virement.emis");
                assert_eq!(event.timestamp, "T1");
            }
            other => panic!("unexpected effect: {other:?}"),
        }
    }

    #[test]
    fn newline_joined_frames_each_dispatch() {
        let frame = concat!(
            r#"{"type":"event","topic":"bancaire.depot.effectue","payload":{},"timestamp":"T1"}"#,
            "\n",
            r#"{"type":"pong","timestamp":"T2"}"#,
            "\n",
            r#"{"type":"event","topic":"bancaire.retrait.effectue","payload":{},"timestamp":"T3"}"#,
        );
        let (_, effects) =
            transition(ConnectionState::Connected, StreamEvent::Frame(frame.to_string()));
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn incomplete_and_malformed_frames_are_dropped() {
        for frame in [
            "{not json",
            r#"{"type":"event","timestamp":"T1"}"#,
            r#"{"type":"event","topic":"bancaire.depot.effectue","timestamp":"T1"}"#,
            r#"{"type":"event","payload":{},"timestamp":"T1"}"#,
            r#"{"type":"mystery","timestamp":"T1"}"#,
        ] {
            let (state, effects) =
                transition(ConnectionState::Connected, StreamEvent::Frame(frame.to_string()));
            assert_eq!(state, ConnectionState::Connected);
            assert!(effects.is_empty(), "expected no effects for {frame}");
        }
    }

    #[test]
    fn informational_frames_mutate_nothing() {
        for frame in [
            r#"{"type":"connected","data":{"client_id":"c1"},"timestamp":"T"}"#,
            r#"{"type":"subscribed","topic":"*","timestamp":"T"}"#,
            r#"{"type":"pong","timestamp":"T"}"#,
        ] {
            let (_, effects) =
                transition(ConnectionState::Connected, StreamEvent::Frame(frame.to_string()));
            assert!(effects.is_empty());
        }
    }
}
