//! Server configuration loading from file and environment variables.

use fleetwatch_db::{DbRuntimeSettings, DEFAULT_TABLE_NAME};
use fleetwatch_store::{BackendOptions, MemoryStoreOptions, RetentionPolicy, SqliteStoreOptions};
use fleetwatch_types::StoreProvider;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ingestion, storage and access settings.
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "fleetwatch_store=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Monitoring configuration: backend choice, windows and the API key.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Shared secret expected in `X-Api-Key`. Empty disables the check.
    #[serde(default)]
    pub api_key: String,

    /// Which event store backend to open.
    #[serde(default)]
    pub store_provider: StoreProvider,

    /// Hours an event stays queryable.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,

    /// Minutes since the latest event for a node to count as active.
    #[serde(default = "default_active_window_minutes")]
    pub active_window_minutes: u32,

    /// Per-node capacity of the in-memory backend.
    #[serde(default = "default_max_events_per_node")]
    pub max_events_per_node: usize,

    /// Seconds between periodic retention sweeps. `0` disables the sweep.
    #[serde(default)]
    pub sweep_interval_seconds: u64,

    /// SQLite backend settings; ignored for the in-memory backend.
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

/// SQLite backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Event table name. Characters other than ASCII alphanumerics and `_`
    /// are dropped.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Create or upgrade the event table at startup.
    #[serde(default = "default_true")]
    pub auto_create_schema: bool,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_retention_hours() -> u32 {
    24
}

fn default_active_window_minutes() -> u32 {
    10
}

fn default_max_events_per_node() -> usize {
    5_000
}

fn default_db_path() -> String {
    "fleetwatch.db".to_string()
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            store_provider: StoreProvider::default(),
            retention_hours: default_retention_hours(),
            active_window_minutes: default_active_window_minutes(),
            max_events_per_node: default_max_events_per_node(),
            sweep_interval_seconds: 0,
            sqlite: SqliteConfig::default(),
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            table_name: default_table_name(),
            auto_create_schema: true,
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl MonitoringConfig {
    /// Retention and activity windows shared by both backends.
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            retention_hours: self.retention_hours,
            active_window_minutes: self.active_window_minutes,
        }
    }

    /// Options for the configured backend.
    pub fn backend_options(&self) -> BackendOptions {
        match self.store_provider {
            StoreProvider::InMemory => BackendOptions::InMemory(MemoryStoreOptions {
                retention: self.retention(),
                max_events_per_node: self.max_events_per_node,
            }),
            StoreProvider::Sqlite => BackendOptions::Sqlite(SqliteStoreOptions {
                retention: self.retention(),
                path: self.sqlite.path.clone(),
                table_name: self.sqlite.table_name.clone(),
                auto_create_schema: self.sqlite.auto_create_schema,
                runtime: DbRuntimeSettings {
                    busy_timeout_ms: self.sqlite.busy_timeout_ms,
                    pool_max_size: self.sqlite.pool_max_size,
                },
            }),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parses `raw` into `target`, logging and ignoring values that do not parse.
fn override_parsed<T: std::str::FromStr>(target: &mut T, var: &str, raw: &str) {
    match raw.trim().parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => tracing::warn!(var, value = raw, "ignoring unparseable environment override"),
    }
}

/// Applies `FLEETWATCH_*` environment overrides through `lookup`.
fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("FLEETWATCH_HOST") {
        override_parsed(&mut config.server.host, "FLEETWATCH_HOST", &host);
    }
    if let Some(port) = lookup("FLEETWATCH_PORT") {
        override_parsed(&mut config.server.port, "FLEETWATCH_PORT", &port);
    }
    if let Some(level) = lookup("FLEETWATCH_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("FLEETWATCH_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    let monitoring = &mut config.monitoring;
    if let Some(key) = lookup("FLEETWATCH_API_KEY") {
        monitoring.api_key = key;
    }
    if let Some(provider) = lookup("FLEETWATCH_STORE_PROVIDER") {
        override_parsed(
            &mut monitoring.store_provider,
            "FLEETWATCH_STORE_PROVIDER",
            &provider,
        );
    }
    if let Some(hours) = lookup("FLEETWATCH_RETENTION_HOURS") {
        override_parsed(
            &mut monitoring.retention_hours,
            "FLEETWATCH_RETENTION_HOURS",
            &hours,
        );
    }
    if let Some(minutes) = lookup("FLEETWATCH_ACTIVE_WINDOW_MINUTES") {
        override_parsed(
            &mut monitoring.active_window_minutes,
            "FLEETWATCH_ACTIVE_WINDOW_MINUTES",
            &minutes,
        );
    }
    if let Some(max) = lookup("FLEETWATCH_MAX_EVENTS_PER_NODE") {
        override_parsed(
            &mut monitoring.max_events_per_node,
            "FLEETWATCH_MAX_EVENTS_PER_NODE",
            &max,
        );
    }
    if let Some(path) = lookup("FLEETWATCH_DB_PATH") {
        monitoring.sqlite.path = path;
    }
    if let Some(table) = lookup("FLEETWATCH_TABLE_NAME") {
        monitoring.sqlite.table_name = table;
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `FLEETWATCH_HOST` overrides `server.host`
/// - `FLEETWATCH_PORT` overrides `server.port`
/// - `FLEETWATCH_LOG_LEVEL` overrides `logging.level`
/// - `FLEETWATCH_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `FLEETWATCH_API_KEY` overrides `monitoring.api_key`
/// - `FLEETWATCH_STORE_PROVIDER` overrides `monitoring.store_provider`
/// - `FLEETWATCH_RETENTION_HOURS` overrides `monitoring.retention_hours`
/// - `FLEETWATCH_ACTIVE_WINDOW_MINUTES` overrides `monitoring.active_window_minutes`
/// - `FLEETWATCH_MAX_EVENTS_PER_NODE` overrides `monitoring.max_events_per_node`
/// - `FLEETWATCH_DB_PATH` overrides `monitoring.sqlite.path`
/// - `FLEETWATCH_TABLE_NAME` overrides `monitoring.sqlite.table_name`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}
