//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (TUBEVAULT_*)
//! - TOML configuration file
//! - `--config` on the command line

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tubevault_api::{api_base, ApiConfig};
use tubevault_core::RouterConfig;
use tubevault_transport::{activity_endpoint, ChannelConfig};
use url::Url;

/// Client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Activity channel.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// URL router.
    #[serde(default)]
    pub router: RouterSection,

    /// Preference storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Backend connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Origin the UI is served from; the API base is derived from it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Activity channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Open the activity channel in `watch`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Keepalive interval in seconds; 0 disables the keepalive.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Reconnect delay in milliseconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

/// Router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSection {
    /// Retained navigation entries.
    #[serde(default = "default_navigation_log_capacity")]
    pub navigation_log_capacity: usize,

    /// Delay before routing anomalies are shipped, in milliseconds.
    #[serde(default = "default_log_flush_delay")]
    pub log_flush_delay_ms: u64,
}

/// Preference storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding preferences. `~` is expanded.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_origin() -> String {
    std::env::var("TUBEVAULT_ORIGIN").unwrap_or_else(|_| "http://localhost:8032".to_string())
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_ping_interval() -> u64 {
    25
}

fn default_reconnect_delay() -> u64 {
    3_000
}

fn default_navigation_log_capacity() -> usize {
    50
}

fn default_log_flush_delay() -> u64 {
    5_000
}

fn default_storage_path() -> String {
    "~/.config/tubevault/prefs.json".to_string()
}

fn default_metrics_port() -> u16 {
    std::env::var("TUBEVAULT_METRICS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9090)
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ping_interval_secs: default_ping_interval(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            navigation_log_capacity: default_navigation_log_capacity(),
            log_flush_delay_ms: default_log_flush_delay(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "tubevault.toml",
            "/etc/tubevault/tubevault.toml",
            "~/.config/tubevault/tubevault.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Page origin as a URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `backend.origin` is not a URL.
    pub fn origin(&self) -> Result<Url> {
        Url::parse(&self.backend.origin)
            .with_context(|| format!("Invalid backend origin: {}", self.backend.origin))
    }

    /// API client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no API base can be derived from the origin.
    pub fn api_config(&self) -> Result<ApiConfig> {
        let base = api_base(&self.origin()?)?;
        Ok(ApiConfig {
            base_url: base,
            timeout: Duration::from_secs(self.backend.timeout_secs),
        })
    }

    /// Activity channel endpoint, derived from the API base.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin is not HTTP(S).
    pub fn activity_url(&self) -> Result<Url> {
        let base = api_base(&self.origin()?)?;
        Ok(activity_endpoint(&base)?)
    }

    #[must_use]
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            ping_interval: Duration::from_secs(self.realtime.ping_interval_secs),
            reconnect_delay: Duration::from_millis(self.realtime.reconnect_delay_ms),
        }
    }

    #[must_use]
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            navigation_log_capacity: self.router.navigation_log_capacity,
            log_flush_delay: Duration::from_millis(self.router.log_flush_delay_ms),
        }
    }

    /// Preference file with `~` expanded.
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.path).as_ref())
    }
}
