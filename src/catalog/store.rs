//! Source catalog implementation
//!
//! Caches the discovery collaborator's view so request handlers never call
//! into the native finder on the hot path. Refreshed periodically by a
//! background task, or on demand when a lookup misses.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use super::config::{CatalogConfig, MIN_REFRESH_INTERVAL};
use super::source::{Discovery, Source};
use crate::matrix::MatrixError;

/// Cached view of currently discoverable sources
pub struct SourceCatalog {
    discovery: Arc<dyn Discovery>,

    /// Last successful (or emptied-on-failure) snapshot
    sources: RwLock<Snapshot>,

    config: CatalogConfig,
}

#[derive(Debug, Default)]
struct Snapshot {
    sources: Vec<Source>,
    refreshed_at: Option<Instant>,
    reachable: bool,
}

impl SourceCatalog {
    /// Create a catalog over the given discovery collaborator
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self::with_config(discovery, CatalogConfig::default())
    }

    /// Create a catalog with custom configuration
    pub fn with_config(discovery: Arc<dyn Discovery>, config: CatalogConfig) -> Self {
        Self {
            discovery,
            sources: RwLock::new(Snapshot::default()),
            config,
        }
    }

    /// Get the catalog configuration
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Poll discovery and replace the cached snapshot
    ///
    /// A failed poll empties the catalog rather than keeping names that may
    /// have vanished, and the error is returned to the caller.
    pub async fn refresh(&self) -> Result<Vec<Source>, MatrixError> {
        let discovery = Arc::clone(&self.discovery);
        let polled = match tokio::task::spawn_blocking(move || discovery.current_sources()).await {
            Ok(polled) => polled,
            Err(e) => Err(MatrixError::NotConnected(format!("discovery task failed: {}", e))),
        };
        let mut snapshot = self.sources.write().await;
        snapshot.refreshed_at = Some(Instant::now());

        match polled {
            Ok(mut sources) => {
                let mut seen = HashSet::new();
                sources.retain(|s| !s.name.is_empty() && seen.insert(s.name.clone()));

                if !snapshot.reachable || snapshot.sources.len() != sources.len() {
                    tracing::debug!(count = sources.len(), "Source catalog refreshed");
                }

                snapshot.reachable = true;
                snapshot.sources = sources.clone();
                Ok(sources)
            }
            Err(e) => {
                if snapshot.reachable {
                    tracing::warn!(error = %e, "Source discovery unavailable, catalog emptied");
                }
                snapshot.reachable = false;
                snapshot.sources.clear();
                Err(e)
            }
        }
    }

    /// List the cached sources
    pub async fn list(&self) -> Vec<Source> {
        self.sources.read().await.sources.clone()
    }

    /// Whether the last poll reached the discovery collaborator
    pub async fn is_reachable(&self) -> bool {
        self.sources.read().await.reachable
    }

    /// When discovery was last polled, if ever
    pub async fn last_refreshed(&self) -> Option<Instant> {
        self.sources.read().await.refreshed_at
    }

    /// Resolve a source name to a plain value
    ///
    /// Looks in the cached snapshot first and re-polls once on a miss, so a
    /// source that appeared since the last tick can be used immediately.
    pub async fn lookup(&self, name: &str) -> Result<Source, MatrixError> {
        if let Some(source) = self.find_cached(name).await {
            return Ok(source);
        }

        let sources = self.refresh().await?;
        sources
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| MatrixError::UnknownSource(name.to_string()))
    }

    /// Sources whose name matches the studio-monitor pattern
    pub async fn studio_monitors(&self) -> Vec<Source> {
        let pattern = self.config.studio_monitor_pattern.to_lowercase();
        self.list()
            .await
            .into_iter()
            .filter(|s| s.name.to_lowercase().contains(&pattern))
            .collect()
    }

    async fn find_cached(&self, name: &str) -> Option<Source> {
        let snapshot = self.sources.read().await;
        snapshot.sources.iter().find(|s| s.name == name).cloned()
    }

    /// Spawn background refresh task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_refresh_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let catalog = Arc::clone(self);
        let interval = catalog.config.refresh_interval.max(MIN_REFRESH_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                // Failures are logged in refresh()
                let _ = catalog.refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::super::source::StaticDiscovery;
    use super::*;

    fn catalog_with(sources: Vec<Source>) -> (Arc<StaticDiscovery>, SourceCatalog) {
        let discovery = Arc::new(StaticDiscovery::new(sources));
        let catalog = SourceCatalog::new(discovery.clone());
        (discovery, catalog)
    }

    #[tokio::test]
    async fn test_list_is_empty_before_refresh() {
        let (_, catalog) = catalog_with(vec![Source::new("CAM-A", "")]);
        assert!(catalog.list().await.is_empty());

        catalog.refresh().await.unwrap();
        assert_eq!(catalog.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_refreshes_on_miss() {
        let (discovery, catalog) = catalog_with(vec![]);
        catalog.refresh().await.unwrap();

        discovery.add(Source::new("CAM-B", "10.0.0.6:5961"));
        let found = catalog.lookup("CAM-B").await.unwrap();
        assert_eq!(found.locator, "10.0.0.6:5961");

        let missing = catalog.lookup("CAM-Z").await;
        assert_eq!(missing, Err(MatrixError::UnknownSource("CAM-Z".into())));
    }

    #[tokio::test]
    async fn test_failed_refresh_empties_catalog() {
        let (discovery, catalog) = catalog_with(vec![Source::new("CAM-A", "")]);
        assert_ok!(catalog.refresh().await);
        assert!(catalog.is_reachable().await);

        discovery.set_offline(true);
        let error = assert_err!(catalog.refresh().await);
        assert!(matches!(error, MatrixError::NotConnected(_)));
        assert!(catalog.list().await.is_empty());
        assert!(!catalog.is_reachable().await);
    }

    #[tokio::test]
    async fn test_refresh_drops_blank_and_duplicate_names() {
        let (_, catalog) = catalog_with(vec![
            Source::new("", "10.0.0.1:5961"),
            Source::new("CAM-A", "10.0.0.5:5961"),
            Source::new("CAM-A", "10.0.0.5:5961"),
        ]);

        let sources = catalog.refresh().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "CAM-A");
    }

    #[tokio::test]
    async fn test_studio_monitors_case_insensitive() {
        let (_, catalog) = catalog_with(vec![
            Source::new("BOOTH (Studio Monitor 1)", ""),
            Source::new("CAM-A", ""),
            Source::new("gallery STUDIO MONITOR", ""),
        ]);
        catalog.refresh().await.unwrap();

        let monitors = catalog.studio_monitors().await;
        assert_eq!(monitors.len(), 2);
        assert!(monitors.iter().all(|s| s.name != "CAM-A"));
    }

    async fn wait_for_sources(catalog: &SourceCatalog, count: usize) -> bool {
        for _ in 0..200 {
            if catalog.list().await.len() == count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_refresh_task_picks_up_new_sources() {
        let discovery = Arc::new(StaticDiscovery::new(vec![]));
        let catalog = Arc::new(SourceCatalog::with_config(
            discovery.clone(),
            CatalogConfig::default().refresh_interval(Duration::from_millis(10)),
        ));

        let handle = catalog.spawn_refresh_task();
        assert!(wait_for_sources(&catalog, 0).await);

        discovery.add(Source::new("CAM-A", ""));
        assert!(wait_for_sources(&catalog, 1).await);

        handle.abort();
    }

    #[tokio::test]
    async fn test_refresh_task_survives_zero_interval() {
        let discovery = Arc::new(StaticDiscovery::new(vec![Source::new("CAM-A", "")]));
        let mut config = CatalogConfig::default();
        config.refresh_interval = Duration::ZERO;
        let catalog = Arc::new(SourceCatalog::with_config(discovery, config));

        let handle = catalog.spawn_refresh_task();
        assert!(wait_for_sources(&catalog, 1).await);
        assert!(!handle.is_finished());

        handle.abort();
        let error = assert_err!(handle.await);
        assert!(error.is_cancelled());
    }

    struct SlowDiscovery(Duration);

    impl Discovery for SlowDiscovery {
        fn current_sources(&self) -> Result<Vec<Source>, MatrixError> {
            std::thread::sleep(self.0);
            Ok(vec![Source::new("CAM-A", "")])
        }
    }

    #[tokio::test]
    async fn test_slow_discovery_does_not_stall_runtime() {
        let catalog = Arc::new(SourceCatalog::new(Arc::new(SlowDiscovery(
            Duration::from_millis(300),
        ))));

        let refresh = tokio::spawn({
            let catalog = Arc::clone(&catalog);
            async move { catalog.refresh().await }
        });
        tokio::task::yield_now().await;

        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(started.elapsed() < Duration::from_millis(150));

        assert_ok!(refresh.await.unwrap());
        assert_eq!(catalog.list().await.len(), 1);
    }
}
