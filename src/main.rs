//! Console monitor for the banking simulation.
//!
//! Headless stand-in for the dashboard page: connects to the gateway's event
//! stream, logs every accepted event, keeps the run state fresh via a
//! background status poll, and disconnects cleanly on ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bancaire_console::store::StoreChange;
use bancaire_console::stream::WsConnector;
use bancaire_console::{
    Config, ConnectionManager, EventStore, ManagerConfig, SimulationClient, SimulationController,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    info!(
        stream_url = %config.stream_url,
        api_base_url = %config.api_base_url,
        "starting banking monitor"
    );

    let store = Arc::new(EventStore::new());
    store.subscribe(|change| match change {
        StoreChange::EventRecorded(event) => {
            info!(
                topic = %event.topic,
                category = event.category.map(|c| c.short_name()).unwrap_or("-"),
                timestamp = %event.timestamp,
                "event"
            );
        }
        StoreChange::ConnectionChanged(state) => info!(state = %state, "connection"),
        _ => {}
    });

    let (manager, disconnect) = ConnectionManager::new(
        Box::new(WsConnector::new(config.stream_url.clone())),
        store.clone(),
        ManagerConfig::default(),
    );
    let stream_task = tokio::spawn(manager.run());

    let controller = SimulationController::new(
        SimulationClient::new(config.api_base_url.clone()),
        store.clone(),
    );
    let poll_interval = Duration::from_secs(config.status_poll_secs.max(1));
    let poll_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            controller.refresh_quietly().await;
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }

    info!(
        events_seen = store.stats().total(),
        "shutting down"
    );
    disconnect.disconnect();
    poll_task.abort();
    let _ = stream_task.await;
}
