//! Environment-driven configuration for the console monitor.

use std::env;

pub const DEFAULT_STREAM_URL: &str = "ws://localhost:8083/ws";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8082/api/v1";
pub const DEFAULT_STATUS_POLL_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket endpoint of the gateway.
    pub stream_url: String,
    /// Base URL of the simulator control API, including `/api/v1`.
    pub api_base_url: String,
    /// Interval between background `GET /simulation/status` polls.
    pub status_poll_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            status_poll_secs: DEFAULT_STATUS_POLL_SECS,
        }
    }
}

impl Config {
    /// Load from the environment, falling back to the local sandbox defaults.
    pub fn from_env() -> Self {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Self {
            stream_url: env::var("BANCAIRE_WS_URL").unwrap_or(defaults.stream_url),
            api_base_url: env::var("BANCAIRE_API_URL").unwrap_or(defaults.api_base_url),
            status_poll_secs: env::var("BANCAIRE_STATUS_POLL_SECS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.status_poll_secs),
        }
    }
}
