//! Configuration loading

use anyhow::{Context, Result};
use regproxy_proxy::{DnsCacheConfig, TransportConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Storage location that keeps the registry in memory only
pub const MEMORY_STORAGE: &str = "memory";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Budget for reading an inbound request body
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Budget for a whole fan-out before the caller gets a 500
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// Upstream client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_client_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,
    /// TCP keep-alive interval; 0 disables keep-alive probes
    #[serde(default)]
    pub keepalive_secs: u64,
    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: usize,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_client_timeout_secs(),
            dial_timeout_secs: default_dial_timeout_secs(),
            keepalive_secs: 0,
            max_idle_conns: default_max_idle_conns(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

/// DNS cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default = "default_true")]
    pub cache: bool,
    #[serde(default = "default_dns_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default = "default_dns_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            cache: true,
            refresh_secs: default_dns_refresh_secs(),
            lookup_timeout_secs: default_dns_lookup_timeout_secs(),
        }
    }
}

/// Registry storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File path, or `"memory"` for an in-memory registry
    #[serde(default = "default_storage_location")]
    pub location: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            location: default_storage_location(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address of the exporter listener, disabled when unset
    #[serde(default)]
    pub listen_address: Option<String>,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9876
}

fn default_read_timeout_secs() -> u64 {
    1
}

fn default_write_timeout_secs() -> u64 {
    40
}

fn default_max_body_size() -> usize {
    64 * 1024 * 1024 // 64 MiB
}

fn default_client_timeout_secs() -> u64 {
    40
}

fn default_dial_timeout_secs() -> u64 {
    1
}

fn default_max_idle_conns() -> usize {
    1
}

fn default_idle_timeout_secs() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_dns_refresh_secs() -> u64 {
    100 * 60 * 60 // 100 hours
}

fn default_dns_lookup_timeout_secs() -> u64 {
    5
}

fn default_storage_location() -> String {
    MEMORY_STORAGE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a file, falling back to defaults if it is missing
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Settings for the upstream transport
    pub fn transport(&self) -> TransportConfig {
        let client = &self.client;
        TransportConfig {
            request_timeout: Duration::from_secs(client.timeout_secs),
            connect_timeout: Duration::from_secs(client.dial_timeout_secs),
            tcp_keepalive: (client.keepalive_secs > 0)
                .then(|| Duration::from_secs(client.keepalive_secs)),
            pool_idle_timeout: Duration::from_secs(client.idle_timeout_secs),
            pool_max_idle_per_host: client.max_idle_conns,
            dns_cache: self.dns.cache.then(|| DnsCacheConfig {
                refresh_interval: Duration::from_secs(self.dns.refresh_secs),
                lookup_timeout: Duration::from_secs(self.dns.lookup_timeout_secs),
            }),
        }
    }
}
