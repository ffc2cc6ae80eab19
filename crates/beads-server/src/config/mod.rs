use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::event_bus::{DispatchConfig, HubConfig};

/// Configuration for the live event stream endpoint
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StreamConfig {
    /// Seconds between `:keepalive` comment frames (default: 15)
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

fn default_keepalive_secs() -> u64 {
    15
}

impl StreamConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.max(1))
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required by the API; empty disables authentication
    #[serde(default)]
    pub user_token: String,
    /// PostgreSQL URL for the durable event ledger (in-memory when unset)
    #[serde(default)]
    pub database_url: Option<String>,
    /// Base URL of the external message bus (no-op publisher when unset)
    #[serde(default)]
    pub bus_url: Option<String>,
    /// Live event hub sizing
    #[serde(default)]
    pub hub: HubConfig,
    /// Streaming endpoint behaviour
    #[serde(default)]
    pub stream: StreamConfig,
    /// Limits on the ledger and external bus sinks
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user_token: String::new(),
            database_url: None,
            bus_url: None,
            hub: HubConfig::default(),
            stream: StreamConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with defaults
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (not tracked by git)
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from environment variables (BEADS_PORT, BEADS_HUB__RING_CAPACITY, ...)
            .add_source(
                Environment::with_prefix("BEADS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Whether bearer authentication is enforced at all.
    pub fn auth_enabled(&self) -> bool {
        !self.user_token.is_empty()
    }

    pub fn token_matches(&self, token: &str) -> bool {
        !self.auth_enabled() || token == self.user_token
    }
}
