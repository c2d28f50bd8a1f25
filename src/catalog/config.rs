//! Source catalog configuration

use std::time::Duration;

/// Shortest refresh interval the background task accepts
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for [`SourceCatalog`](super::SourceCatalog)
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// How often the background task re-polls discovery
    pub refresh_interval: Duration,

    /// Case-insensitive name fragment identifying studio-monitor sources
    pub studio_monitor_pattern: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(5),
            studio_monitor_pattern: "studio monitor".into(),
        }
    }
}

impl CatalogConfig {
    /// Set the refresh interval, at least [`MIN_REFRESH_INTERVAL`]
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval.max(MIN_REFRESH_INTERVAL);
        self
    }

    /// Set the studio-monitor name pattern
    pub fn studio_monitor_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.studio_monitor_pattern = pattern.into();
        self
    }
}
