use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub jobs: JobEngineConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfigSection,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Settings for the admission guard, retry policy and worker loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEngineConfig {
    /// Maximum jobs per resource in {queued, running, retrying}
    #[serde(default = "default_max_active_per_resource")]
    pub max_active_per_resource: u64,
    /// Hard ceiling on pending jobs across all resources
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: u64,
    /// Retry-after hint returned when the queue is full
    #[serde(default = "default_queue_full_retry_after")]
    pub queue_full_retry_after: String,
    /// Retry attempts before a job fails permanently
    #[serde(default = "default_max_retries")]
    pub default_max_retries: i32,
    /// Base delay for exponential backoff (doubles per attempt)
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay: String,
    /// Add random jitter to backoff delays
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter: bool,
    /// How long a claimed job may run before its lease expires
    #[serde(default = "default_lease_duration")]
    pub lease_duration: String,
    /// Worker loop polling interval
    #[serde(default = "default_processor_tick_interval")]
    pub tick_interval: String,
    /// How many eligible candidates one tick fetches before claiming
    #[serde(default = "default_dequeue_batch_size")]
    pub dequeue_batch_size: u64,
}

/// Settings for the recurring monitoring loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfigSection {
    /// Monitor loop polling interval
    #[serde(default = "default_monitor_tick_interval")]
    pub tick_interval: String,
    /// Pause between targets within one run (downstream rate limits)
    #[serde(default = "default_target_delay")]
    pub target_delay: String,
    /// Ceiling on unfinished monitoring runs across all configs
    #[serde(default = "default_max_pending_runs")]
    pub max_pending_runs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Per-topic broadcast channel capacity
    #[serde(default = "default_event_buffer_size")]
    pub buffer_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: None,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for JobEngineConfig {
    fn default() -> Self {
        Self {
            max_active_per_resource: default_max_active_per_resource(),
            max_queue_depth: default_max_queue_depth(),
            queue_full_retry_after: default_queue_full_retry_after(),
            default_max_retries: default_max_retries(),
            retry_base_delay: default_retry_base_delay(),
            retry_jitter: default_retry_jitter(),
            lease_duration: default_lease_duration(),
            tick_interval: default_processor_tick_interval(),
            dequeue_batch_size: default_dequeue_batch_size(),
        }
    }
}

impl Default for MonitoringConfigSection {
    fn default() -> Self {
        Self {
            tick_interval: default_monitor_tick_interval(),
            target_delay: default_target_delay(),
            max_pending_runs: default_max_pending_runs(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_event_buffer_size(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}

/// Parse a humantime duration string ("5m", "2s", "1h 30m")
pub fn parse_duration(value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| anyhow::anyhow!("Invalid duration '{}': {}", value, e))
}

impl JobEngineConfig {
    pub fn retry_base_delay(&self) -> Result<Duration> {
        parse_duration(&self.retry_base_delay)
    }

    pub fn lease_duration(&self) -> Result<Duration> {
        parse_duration(&self.lease_duration)
    }

    pub fn tick_interval(&self) -> Result<Duration> {
        parse_duration(&self.tick_interval)
    }

    pub fn queue_full_retry_after(&self) -> Result<Duration> {
        parse_duration(&self.queue_full_retry_after)
    }
}

impl MonitoringConfigSection {
    pub fn tick_interval(&self) -> Result<Duration> {
        parse_duration(&self.tick_interval)
    }

    pub fn target_delay(&self) -> Result<Duration> {
        parse_duration(&self.target_delay)
    }
}
