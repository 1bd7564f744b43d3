//! Headless monitoring client for an event-driven banking simulation.
//!
//! The crate replaces the ingestion core of the original browser dashboard:
//! it consumes the gateway's live WebSocket event stream, keeps a bounded,
//! observable slice of client state, and drives the simulator's REST control
//! API.
//!
//! # Architecture
//!
//! - `stream`: connection manager — one live WebSocket, fixed-delay
//!   reconnection, one subscribe frame per connect
//! - `store`: bounded event store — last 100 events, per-category counters,
//!   run state, connection state; synchronous observer notification
//! - `api`: typed REST client and the controller applying responses to the
//!   store
//! - `events`: the banking event model
//! - `config`: environment-driven endpoints
//!
//! Control flow: stream frames are parsed and validated, accepted events land
//! in the store, observers re-read reactively. REST responses update the
//! store directly; no causal ordering is enforced between a control response
//! and the first event arriving from the stream.

pub mod api;
pub mod config;
pub mod events;
pub mod store;
pub mod stream;

pub use api::{SimulationClient, SimulationController};
pub use config::Config;
pub use events::{EventCategory, StoredEvent};
pub use store::{EventStats, EventStore, RunState, RunStatus, RunUpdate, StoreChange};
pub use stream::{ConnectionManager, ConnectionState, DisconnectHandle, ManagerConfig};
