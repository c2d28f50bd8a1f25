//! Daemon configuration file
//!
//! Loaded from TOML; every section and field has a default so a partial
//! (or missing) file is valid.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogConfig, Source};
use crate::error::{Error, Result};
use crate::matrix::MatrixConfig;
use crate::monitor::MonitorConfig;
use crate::server::ServerConfig;

/// Top-level configuration loaded from a TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub matrix: MatrixSection,
    pub discovery: DiscoveryConfig,
    pub monitor: MonitorSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Control API bind address
    pub bind: String,
    /// Permissive CORS for browser clients
    pub cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixSection {
    /// Number of source slots
    pub source_slots: u32,
    /// Destinations created at startup
    pub default_destinations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Seconds between catalog refreshes
    pub refresh_interval_secs: u64,
    /// Case-insensitive name fragment marking studio monitors
    pub studio_monitor_pattern: String,
    /// Sources announced by the built-in static discovery
    pub sources: Vec<SourceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Milliseconds between capture ticks
    pub capture_period_ms: u64,
    /// Milliseconds one capture call may wait for a frame
    pub capture_timeout_ms: u64,
    /// Test pattern frame size
    pub pattern_width: u32,
    pub pattern_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            cors: true,
        }
    }
}

impl Default for MatrixSection {
    fn default() -> Self {
        let defaults = MatrixConfig::default();
        Self {
            source_slots: defaults.source_slots,
            default_destinations: defaults.default_destinations,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let defaults = CatalogConfig::default();
        Self {
            refresh_interval_secs: defaults.refresh_interval.as_secs(),
            studio_monitor_pattern: defaults.studio_monitor_pattern,
            sources: Vec::new(),
        }
    }
}

impl Default for MonitorSection {
    fn default() -> Self {
        let defaults = MonitorConfig::default();
        Self {
            capture_period_ms: defaults.capture_period.as_millis() as u64,
            capture_timeout_ms: defaults.capture_timeout.as_millis() as u64,
            pattern_width: 64,
            pattern_height: 36,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Self::default()
            }),
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
        }
    }

    /// Parse configuration text
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Render as TOML (for `--gen-config`)
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn server_config(&self) -> Result<ServerConfig> {
        let addr: SocketAddr = self
            .network
            .bind
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address {:?}: {}", self.network.bind, e)))?;

        let config = ServerConfig::with_addr(addr);
        Ok(if self.network.cors {
            config
        } else {
            config.disable_cors()
        })
    }

    pub fn matrix_config(&self) -> MatrixConfig {
        MatrixConfig::default()
            .source_slots(self.matrix.source_slots)
            .default_destinations(self.matrix.default_destinations.iter().cloned())
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig::default()
            .refresh_interval(Duration::from_secs(self.discovery.refresh_interval_secs.max(1)))
            .studio_monitor_pattern(self.discovery.studio_monitor_pattern.clone())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::default()
            .capture_period(Duration::from_millis(self.monitor.capture_period_ms))
            .capture_timeout(Duration::from_millis(self.monitor.capture_timeout_ms))
    }

    /// Sources for the static discovery backend
    pub fn static_sources(&self) -> Vec<Source> {
        self.discovery
            .sources
            .iter()
            .map(|s| Source::new(s.name.clone(), s.url.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let text = AppConfig::default().to_toml().unwrap();
        assert!(text.contains("source_slots"));
        assert!(text.contains("capture_period_ms"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [matrix]
            default_destinations = ["Program", "Preview"]

            [[discovery.sources]]
            name = "CAM-A"
            url = "10.0.0.5:5961"
            "#,
        )
        .unwrap();

        assert_eq!(config.matrix.source_slots, 8);
        assert_eq!(config.network.bind, "0.0.0.0:8080");
        assert_eq!(
            config.matrix_config().default_destinations,
            vec!["Program", "Preview"]
        );
        assert_eq!(config.static_sources(), vec![Source::new("CAM-A", "10.0.0.5:5961")]);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            AppConfig::from_toml("matrix = 5"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.network.bind = "not-an-address".into();
        assert!(matches!(config.server_config(), Err(Error::Config(_))));

        config.network.bind = "127.0.0.1:9000".into();
        config.network.cors = false;
        let server = config.server_config().unwrap();
        assert_eq!(server.bind_addr.port(), 9000);
        assert!(!server.cors_enabled);
    }

    #[test]
    fn test_conversions_clamp() {
        let mut config = AppConfig::default();
        config.discovery.refresh_interval_secs = 0;
        config.matrix.source_slots = 0;

        assert_eq!(config.catalog_config().refresh_interval, Duration::from_secs(1));
        assert_eq!(config.matrix_config().source_slots, 1);
        assert_eq!(
            config.monitor_config().capture_period,
            Duration::from_millis(100)
        );
    }
}
