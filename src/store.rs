//! Bounded, observable client state.
//!
//! The store holds the slice of state an observer (originally the dashboard
//! UI) watches: the most recent events, cumulative per-category counters, the
//! simulation run state and the stream connection state. All mutation funnels
//! through the operations here; observers are notified synchronously before
//! the mutating call returns, so there is no queuing or batching to reason
//! about.

use std::collections::VecDeque;
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::events::{EventCategory, StoredEvent};
use crate::stream::ConnectionState;

/// Maximum number of events retained, most-recent-first.
pub const MAX_STORED_EVENTS: usize = 100;

/// Cumulative counters for the known event categories.
///
/// Counters only ever increase, except through [`EventStore::reset_stats`].
/// Events with an unknown category are never counted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventStats {
    pub compte_ouvert: u64,
    pub depot_effectue: u64,
    pub retrait_effectue: u64,
    pub virement_emis: u64,
}

impl EventStats {
    fn increment(&mut self, category: EventCategory) {
        match category {
            EventCategory::CompteOuvert => self.compte_ouvert += 1,
            EventCategory::DepotEffectue => self.depot_effectue += 1,
            EventCategory::RetraitEffectue => self.retrait_effectue += 1,
            EventCategory::VirementEmis => self.virement_emis += 1,
        }
    }

    /// Counter for a single category.
    pub fn count(&self, category: EventCategory) -> u64 {
        match category {
            EventCategory::CompteOuvert => self.compte_ouvert,
            EventCategory::DepotEffectue => self.depot_effectue,
            EventCategory::RetraitEffectue => self.retrait_effectue,
            EventCategory::VirementEmis => self.virement_emis,
        }
    }

    /// Sum of all per-category counters.
    pub fn total(&self) -> u64 {
        self.compte_ouvert + self.depot_effectue + self.retrait_effectue + self.virement_emis
    }
}

/// Lifecycle status of a simulation run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Simulation run state, mutated by REST responses (never by the stream).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    pub status: RunStatus,
    pub run_id: Option<String>,
    pub events_produced: u64,
    pub events_failed: u64,
    pub rate_requested: f64,
    pub rate_actual: f64,
    pub started_at: Option<String>,
}

/// Partial run-state update, shallow-merged into [`RunState`].
///
/// `None` fields are left untouched. The store does not validate
/// monotonicity; callers supply consistent values.
#[derive(Debug, Clone, Default)]
pub struct RunUpdate {
    pub status: Option<RunStatus>,
    pub run_id: Option<String>,
    pub events_produced: Option<u64>,
    pub events_failed: Option<u64>,
    pub rate_requested: Option<f64>,
    pub rate_actual: Option<f64>,
    pub started_at: Option<String>,
}

impl RunState {
    fn merge(&mut self, update: RunUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(run_id) = update.run_id {
            self.run_id = Some(run_id);
        }
        if let Some(produced) = update.events_produced {
            self.events_produced = produced;
        }
        if let Some(failed) = update.events_failed {
            self.events_failed = failed;
        }
        if let Some(rate) = update.rate_requested {
            self.rate_requested = rate;
        }
        if let Some(rate) = update.rate_actual {
            self.rate_actual = rate;
        }
        if let Some(started_at) = update.started_at {
            self.started_at = Some(started_at);
        }
    }
}

/// Which mutation just happened, handed to observers.
#[derive(Debug, Clone)]
pub enum StoreChange {
    /// An event was accepted off the stream and appended.
    EventRecorded(StoredEvent),
    /// The event list was emptied; counters untouched.
    EventsCleared,
    /// All counters were zeroed; the event list untouched.
    StatsReset,
    /// The stream connection state changed.
    ConnectionChanged(ConnectionState),
    /// The run state was merged with a REST response.
    RunUpdated,
}

#[derive(Default)]
struct Inner {
    events: VecDeque<StoredEvent>,
    stats: EventStats,
    connection: ConnectionState,
    run: RunState,
}

type Observer = Box<dyn Fn(&StoreChange) + Send + Sync>;

/// The shared state container.
///
/// Constructed once at application start and shared via `Arc`; never torn
/// down within a session, so subscriptions have no unsubscribe handle.
#[derive(Default)]
pub struct EventStore {
    inner: RwLock<Inner>,
    observers: Mutex<Vec<Observer>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer called synchronously on every mutation.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&StoreChange) + Send + Sync + 'static,
    {
        match self.observers.lock() {
            Ok(mut observers) => observers.push(Box::new(observer)),
            Err(_) => warn!("observer list poisoned, subscription dropped"),
        }
    }

    fn notify(&self, change: StoreChange) {
        if let Ok(observers) = self.observers.lock() {
            for observer in observers.iter() {
                observer(&change);
            }
        }
    }

    fn write<T>(&self, mutate: impl FnOnce(&mut Inner) -> T) -> Option<T> {
        match self.inner.write() {
            Ok(mut inner) => Some(mutate(&mut inner)),
            Err(_) => {
                warn!("store lock poisoned, mutation dropped");
                None
            }
        }
    }

    fn read<T>(&self, view: impl FnOnce(&Inner) -> T) -> T
    where
        T: Default,
    {
        match self.inner.read() {
            Ok(inner) => view(&inner),
            Err(_) => T::default(),
        }
    }

    /// Prepend an event, evict past the cap, bump the matching counter.
    ///
    /// Events whose topic falls outside the known set are stored (so they
    /// still show up in the feed) but counted nowhere.
    pub fn record_event(&self, event: StoredEvent) {
        let recorded = self.write(|inner| {
            inner.events.push_front(event.clone());
            inner.events.truncate(MAX_STORED_EVENTS);
            if let Some(category) = event.category {
                inner.stats.increment(category);
            }
        });
        if recorded.is_some() {
            self.notify(StoreChange::EventRecorded(event));
        }
    }

    /// Empty the event list; counters are untouched.
    pub fn clear_events(&self) {
        if self.write(|inner| inner.events.clear()).is_some() {
            self.notify(StoreChange::EventsCleared);
        }
    }

    /// Zero all counters; the event list is untouched.
    pub fn reset_stats(&self) {
        if self.write(|inner| inner.stats = EventStats::default()).is_some() {
            self.notify(StoreChange::StatsReset);
        }
    }

    /// Overwrite the connection state.
    pub fn set_connection_state(&self, state: ConnectionState) {
        if self.write(|inner| inner.connection = state).is_some() {
            self.notify(StoreChange::ConnectionChanged(state));
        }
    }

    /// Shallow-merge a partial run-state update from a REST response.
    pub fn apply_run_update(&self, update: RunUpdate) {
        if self.write(|inner| inner.run.merge(update)).is_some() {
            self.notify(StoreChange::RunUpdated);
        }
    }

    /// Snapshot of the stored events, most-recent-first.
    pub fn events(&self) -> Vec<StoredEvent> {
        self.read(|inner| inner.events.iter().cloned().collect())
    }

    pub fn stats(&self) -> EventStats {
        self.read(|inner| inner.stats)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.read(|inner| inner.connection)
    }

    pub fn run_state(&self) -> RunState {
        self.read(|inner| inner.run.clone())
    }
}
