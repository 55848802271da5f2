//! Settings for the ledger service.
//!
//! Values come from `config/ledger.toml` (optional) and are overridden by
//! `LEDGER__*` environment variables, e.g. `LEDGER__SERVER__PORT=4000`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use server::StaticToken;

const DEFAULT_CONFIG_PATH: &str = "config/ledger";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite("ledger.db".to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
    pub database: Database,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            database: Database::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Notifications {
    pub subscriber_capacity: usize,
    pub keep_alive_secs: u64,
    pub token_ttl_secs: i64,
    /// How often the change log is polled for writes made by other processes.
    pub feed_poll_interval_ms: u64,
}

impl Default for Notifications {
    fn default() -> Self {
        Self {
            subscriber_capacity: server::DEFAULT_SUBSCRIBER_CAPACITY,
            keep_alive_secs: 30,
            token_ttl_secs: engine::DEFAULT_TOKEN_TTL.num_seconds(),
            feed_poll_interval_ms: engine::DEFAULT_FEED_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Auth {
    pub tokens: Vec<StaticToken>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub notifications: Notifications,
    pub auth: Auth,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("LEDGER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let settings = Config::builder()
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("LEDGER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
