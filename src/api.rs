//! REST control client for the simulator API.
//!
//! Typed wrapper over the `/api/v1` control surface plus a small controller
//! that applies responses to the store as optimistic run-state updates.
//! Control calls are fire-and-forget from the caller's point of view: a
//! failure is logged and the store simply keeps its previous state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::{EventStore, RunStatus, RunUpdate};

/// Errors raised by the control client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StartSimulationRequest {
    /// Target events per second.
    pub rate: u32,
    /// Run duration in seconds; omitted means run until stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Restrict generation to these event types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartSimulationResponse {
    pub simulation_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopSimulationResponse {
    pub status: RunStatus,
    pub events_produced: u64,
    pub duration_seconds: f64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Full status document returned by `GET /simulation/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationStatus {
    pub id: String,
    pub status: RunStatus,
    pub scenario: String,
    pub events_produced: u64,
    pub events_failed: u64,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub stopped_at: Option<String>,
    pub duration_seconds: f64,
    pub rate_requested: f64,
    pub rate_actual: f64,
    #[serde(default)]
    pub last_event_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProduceEventsRequest {
    pub event_type: String,
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProduceEventsResponse {
    pub events_produced: u64,
    pub event_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    #[serde(default)]
    pub services: Option<std::collections::HashMap<String, String>>,
    #[serde(default)]
    pub websocket: Option<WebSocketHealth>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketHealth {
    pub clients: u64,
}

/// Typed client for the simulator control API.
pub struct SimulationClient {
    base_url: String,
    http: reqwest::Client,
}

impl SimulationClient {
    /// `base_url` includes the `/api/v1` prefix.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn start(
        &self,
        request: &StartSimulationRequest,
    ) -> Result<StartSimulationResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/simulation/start"))
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        decode(response).await
    }

    pub async fn stop(&self) -> Result<StopSimulationResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/simulation/stop"))
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        decode(response).await
    }

    pub async fn status(&self) -> Result<SimulationStatus, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/simulation/status"))
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        decode(response).await
    }

    pub async fn produce(
        &self,
        request: &ProduceEventsRequest,
    ) -> Result<ProduceEventsResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/events/produce"))
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        decode(response).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/health"))
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        decode(response).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Request(e.to_string()))?;

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Pairs the control client with the store.
///
/// Responses update the run state directly (optimistic local update); the
/// event stream never touches it. Failures leave the store untouched.
pub struct SimulationController {
    client: SimulationClient,
    store: Arc<EventStore>,
}

impl SimulationController {
    pub fn new(client: SimulationClient, store: Arc<EventStore>) -> Self {
        Self { client, store }
    }

    pub fn client(&self) -> &SimulationClient {
        &self.client
    }

    /// Start a run and mark the store running under the returned id.
    pub async fn start(&self, rate: u32) -> Result<StartSimulationResponse, ApiError> {
        let request = StartSimulationRequest {
            rate,
            ..Default::default()
        };
        let response = self.client.start(&request).await?;
        info!(simulation_id = %response.simulation_id, rate, "simulation started");
        self.store.apply_run_update(RunUpdate {
            status: Some(response.status),
            run_id: Some(response.simulation_id.clone()),
            rate_requested: Some(f64::from(rate)),
            ..Default::default()
        });
        Ok(response)
    }

    /// Stop the run and record the final counters.
    pub async fn stop(&self) -> Result<StopSimulationResponse, ApiError> {
        let response = self.client.stop().await?;
        info!(
            events_produced = response.events_produced,
            "simulation stopped"
        );
        self.store.apply_run_update(RunUpdate {
            status: Some(response.status),
            events_produced: Some(response.events_produced),
            ..Default::default()
        });
        Ok(response)
    }

    /// Poll the status document and merge it into the store.
    pub async fn refresh(&self) -> Result<SimulationStatus, ApiError> {
        let status = self.client.status().await?;
        self.store.apply_run_update(RunUpdate {
            status: Some(status.status),
            run_id: Some(status.id.clone()),
            events_produced: Some(status.events_produced),
            events_failed: Some(status.events_failed),
            rate_requested: Some(status.rate_requested),
            rate_actual: Some(status.rate_actual),
            started_at: status.started_at.clone(),
        });
        Ok(status)
    }

    /// Best-effort refresh for background polling: failures are logged and
    /// swallowed, the store keeps its previous state.
    pub async fn refresh_quietly(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "status poll failed");
        }
    }

    /// Inject a batch of events by hand.
    pub async fn produce(
        &self,
        event_type: impl Into<String>,
        count: u32,
    ) -> Result<ProduceEventsResponse, ApiError> {
        let request = ProduceEventsRequest {
            event_type: event_type.into(),
            count,
        };
        let response = self.client.produce(&request).await?;
        info!(
            events_produced = response.events_produced,
            event_type = %request.event_type,
            "events produced on demand"
        );
        Ok(response)
    }
}
