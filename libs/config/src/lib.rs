//! Service Configuration Module
//!
//! Loads the Pulse runtime configuration from an optional TOML file with
//! `PULSE_`-prefixed environment overrides on top. Every option has a
//! default, so an empty configuration is a valid one.

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default on-disk location checked when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/pulse.toml";

/// Top-level configuration for the platform.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct PulseConfig {
    pub server: ServerConfig,
    pub analytics: AnalyticsConfig,
    pub monitoring: MonitoringConfig,
    pub log: LogConfig,
}

/// HTTP server settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    /// Ingest-endpoint rate limit; unlimited when absent.
    pub rate_limit_per_sec: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            read_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            idle_timeout_ms: 60_000,
            rate_limit_per_sec: None,
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Engine sizing knobs.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Worker pool size.
    pub workers: usize,
    /// Maximum elements per ingest batch.
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
    /// Capacity of each in-memory store before time-LRU eviction.
    pub cache_size: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            batch_size: 1_000,
            batch_timeout_ms: 1_000,
            cache_size: 10_000,
        }
    }
}

impl AnalyticsConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

/// Observability settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Port of the bare metrics/health server.
    pub metrics_port: u16,
    pub health_check_interval_ms: u64,
    /// Counter name -> threshold; a counter exceeding its threshold at an
    /// evaluation tick records an alert.
    pub alert_thresholds: HashMap<String, u64>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            health_check_interval_ms: 10_000,
            alert_thresholds: HashMap::new(),
        }
    }
}

impl MonitoringConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
        }
    }
}

impl PulseConfig {
    /// Load configuration, layering (lowest to highest precedence):
    /// defaults, the TOML file, `PULSE_`-prefixed environment variables
    /// (`PULSE_SERVER__PORT=9000` style, `__` separating sections).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    info!("Loading configuration from {:?}", default);
                    builder = builder.add_source(File::from(default).required(false));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("PULSE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let config: PulseConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field sanity checks the serde layer cannot express.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.analytics.workers > 0, "analytics.workers must be positive");
        anyhow::ensure!(
            self.analytics.batch_size > 0,
            "analytics.batch_size must be positive"
        );
        anyhow::ensure!(
            self.analytics.cache_size > 0,
            "analytics.cache_size must be positive"
        );
        anyhow::ensure!(
            self.monitoring.health_check_interval_ms > 0,
            "monitoring.health_check_interval must be positive"
        );
        Ok(())
    }
}
