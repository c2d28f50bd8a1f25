//! Discoverable source types and the discovery collaborator
//!
//! The native discovery library is consumed through [`Discovery`]. Only the
//! "list what is visible right now" call is needed; the engine never asks the
//! library to mutate anything.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::matrix::MatrixError;

/// A source currently visible on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    /// Advertised source name (e.g., "STUDIO-PC (Camera 1)")
    pub name: String,
    /// Network locator (address:port or URL) reported by discovery
    #[serde(rename = "url")]
    pub locator: String,
    /// Whether discovery currently reports the source as reachable
    pub connected: bool,
}

impl Source {
    /// Create a connected source
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            connected: true,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.locator.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} @ {}", self.name, self.locator)
        }
    }
}

/// External discovery collaborator
///
/// Implementations wrap the native finder and return its current view.
/// Polls run on the blocking pool, so the call may block.
pub trait Discovery: Send + Sync + 'static {
    /// List the sources visible right now
    ///
    /// Returns [`MatrixError::NotConnected`] when the finder is unavailable.
    fn current_sources(&self) -> Result<Vec<Source>, MatrixError>;
}

/// Discovery backed by a fixed, mutable list
///
/// Used by the daemon when sources are declared in the config file, and by
/// tests to simulate sources appearing, vanishing and the finder going away.
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    inner: Mutex<StaticInner>,
}

#[derive(Debug, Default)]
struct StaticInner {
    sources: Vec<Source>,
    offline: bool,
}

impl StaticDiscovery {
    /// Create a discovery that reports the given sources
    pub fn new(sources: Vec<Source>) -> Self {
        Self {
            inner: Mutex::new(StaticInner {
                sources,
                offline: false,
            }),
        }
    }

    /// Replace the reported sources
    pub fn set_sources(&self, sources: Vec<Source>) {
        self.lock().sources = sources;
    }

    /// Add a single source
    pub fn add(&self, source: Source) {
        self.lock().sources.push(source);
    }

    /// Remove a source by name
    pub fn remove(&self, name: &str) {
        self.lock().sources.retain(|s| s.name != name);
    }

    /// Simulate the finder becoming unreachable (or reachable again)
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StaticInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Discovery for StaticDiscovery {
    fn current_sources(&self) -> Result<Vec<Source>, MatrixError> {
        let inner = self.lock();
        if inner.offline {
            return Err(MatrixError::NotConnected("source discovery".into()));
        }
        Ok(inner.sources.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_discovery_mutation() {
        let discovery = StaticDiscovery::new(vec![Source::new("CAM-A", "10.0.0.5:5961")]);
        discovery.add(Source::new("CAM-B", "10.0.0.6:5961"));
        discovery.remove("CAM-A");

        let names: Vec<_> = discovery
            .current_sources()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["CAM-B".to_string()]);
    }

    #[test]
    fn test_static_discovery_offline() {
        let discovery = StaticDiscovery::new(vec![Source::new("CAM-A", "")]);
        discovery.set_offline(true);

        assert!(matches!(
            discovery.current_sources(),
            Err(MatrixError::NotConnected(_))
        ));
    }

    #[test]
    fn test_source_serializes_locator_as_url() {
        let json = serde_json::to_value(Source::new("CAM-A", "10.0.0.5:5961")).unwrap();
        assert_eq!(json["url"], "10.0.0.5:5961");
        assert_eq!(json["connected"], true);
    }
}
