//! Routing engine
//!
//! The one mutating authority over the routing matrix. Every operation
//! resolves catalog lookups first, then runs to completion under a single
//! write lock; signal commands produced by the change are pushed to the
//! router after the lock is released.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::MatrixConfig;
use super::destination::Destination;
use super::error::MatrixError;
use super::route::{BulkRouteOutcome, Route, RouteCreation, RouteOutcome};
use super::signal::{SignalDispatcher, SignalRouter};
use super::slot::SourceSlot;
use super::state::{DestinationRemoval, MatrixState, SlotRelease};
use crate::catalog::{Source, SourceCatalog};
use crate::monitor::{ClearedPointer, MonitorService, PointerKind, PointerState, PreviewFrame};
use crate::stats::{MatrixStats, ServiceStats};

/// Owner of the routing matrix and entry point for every control call
pub struct RoutingEngine {
    /// Slot table, destinations and routes behind one lock
    state: RwLock<MatrixState>,

    catalog: Arc<SourceCatalog>,

    monitors: Arc<MonitorService>,

    signals: SignalDispatcher,

    config: MatrixConfig,
}

impl RoutingEngine {
    /// Create an engine, advertising the configured default destinations
    pub fn new(
        config: MatrixConfig,
        catalog: Arc<SourceCatalog>,
        monitors: Arc<MonitorService>,
        router: Arc<dyn SignalRouter>,
    ) -> Self {
        let mut state = MatrixState::new(&config);
        for (n, name) in config.default_destinations.iter().enumerate() {
            let description = format!("Matrix destination {}", n + 1);
            if let Err(e) = state.create_destination(name.clone(), Some(description)) {
                tracing::warn!(destination = %name, error = %e, "Skipping default destination");
            }
        }

        let signals = SignalDispatcher::new(router);
        signals.apply_blocking(state.take_signals());

        tracing::info!(
            source_slots = config.source_slots,
            destinations = config.default_destinations.len(),
            "Routing engine initialized"
        );

        Self {
            state: RwLock::new(state),
            catalog,
            monitors,
            signals,
            config,
        }
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<SourceCatalog> {
        &self.catalog
    }

    pub fn monitors(&self) -> &Arc<MonitorService> {
        &self.monitors
    }

    /// Run a mutation under the write lock and dispatch its signals in order
    async fn commit<T>(
        &self,
        op: impl FnOnce(&mut MatrixState) -> Result<T, MatrixError>,
    ) -> Result<T, MatrixError> {
        let mut state = self.state.write().await;
        let result = op(&mut *state);
        let dispatched = self.signals.enqueue(state.take_signals());
        drop(state);
        dispatched.applied().await;

        result
    }

    // ---- queries -------------------------------------------------------

    /// Discoverable sources, without the destinations this engine advertises
    pub async fn list_sources(&self) -> Vec<Source> {
        let sources = self.catalog.list().await;
        self.without_own_outputs(sources).await
    }

    /// Discoverable studio monitors
    pub async fn studio_monitors(&self) -> Vec<Source> {
        let monitors = self.catalog.studio_monitors().await;
        self.without_own_outputs(monitors).await
    }

    async fn without_own_outputs(&self, mut sources: Vec<Source>) -> Vec<Source> {
        let state = self.state.read().await;
        sources.retain(|s| !state.is_destination_name(&s.name));
        sources
    }

    pub async fn source_slots(&self) -> Vec<SourceSlot> {
        self.state.read().await.source_slots()
    }

    pub async fn destinations(&self) -> Vec<Destination> {
        self.state.read().await.destinations()
    }

    pub async fn routes(&self) -> Vec<Route> {
        self.state.read().await.routes()
    }

    /// Destination slots currently fed by a source slot
    pub async fn destinations_for_source(&self, source_slot: u32) -> Result<Vec<u32>, MatrixError> {
        self.state.read().await.destinations_for_source(source_slot)
    }

    pub async fn matrix_stats(&self) -> MatrixStats {
        self.state.read().await.stats()
    }

    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            matrix: self.matrix_stats().await,
            catalog_sources: self.list_sources().await.len(),
            discovery_reachable: self.catalog.is_reachable().await,
            preview: self.monitors.stats(PointerKind::Preview),
            monitor: self.monitors.stats(PointerKind::Monitor),
        }
    }

    // ---- source slots --------------------------------------------------

    /// Bind a currently discoverable source to a slot
    pub async fn assign_source(
        &self,
        slot: u32,
        source_name: &str,
        display_name: Option<String>,
    ) -> Result<SourceSlot, MatrixError> {
        let source = self.catalog.lookup(source_name).await?;

        let assigned = self
            .commit(|state| state.assign_source(slot, source.name, display_name))
            .await?;

        tracing::info!(
            slot = slot,
            source = ?assigned.bound_source_name,
            display = %assigned.display_name,
            "Source assigned"
        );
        Ok(assigned)
    }

    /// Clear a slot, its routes, and any pointer showing its source
    pub async fn unassign_slot(&self, slot: u32) -> Result<SlotRelease, MatrixError> {
        let (mut release, detached) = self
            .commit(|state| {
                let release = state.unassign_slot(slot)?;
                let detached = release
                    .previous_source
                    .as_deref()
                    .map(|name| self.monitors.detach_source(name));
                Ok((release, detached))
            })
            .await?;

        if let Some(detached) = detached {
            release.cleared_pointers = detached.join().await;
        }

        tracing::info!(
            slot = slot,
            source = ?release.previous_source,
            routes_removed = release.removed_routes.len(),
            pointers_cleared = release.cleared_pointers.len(),
            "Source slot unassigned"
        );
        Ok(release)
    }

    // ---- destinations --------------------------------------------------

    pub async fn create_destination(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<Destination, MatrixError> {
        let destination = self
            .commit(|state| state.create_destination(name.to_string(), description))
            .await?;

        tracing::info!(
            destination = destination.slot_number,
            name = %destination.name,
            "Destination created"
        );
        Ok(destination)
    }

    pub async fn delete_destination(&self, slot: u32) -> Result<DestinationRemoval, MatrixError> {
        let removal = self.commit(|state| state.delete_destination(slot)).await?;

        tracing::info!(
            destination = slot,
            name = %removal.destination.name,
            route_removed = removal.removed_route.is_some(),
            "Destination deleted"
        );
        Ok(removal)
    }

    /// Remove the route into a destination without deleting it
    pub async fn unassign_destination(&self, slot: u32) -> Result<Option<Route>, MatrixError> {
        let removed = self.commit(|state| state.unassign_destination(slot)).await?;
        if let Some(route) = &removed {
            tracing::info!(
                destination = slot,
                source_slot = route.source_slot,
                "Destination unassigned"
            );
        }
        Ok(removed)
    }

    pub async fn set_destination_enabled(
        &self,
        slot: u32,
        enabled: bool,
    ) -> Result<Destination, MatrixError> {
        let destination = self
            .commit(|state| state.set_destination_enabled(slot, enabled))
            .await?;
        tracing::info!(destination = slot, enabled = enabled, "Destination enable changed");
        Ok(destination)
    }

    // ---- routes --------------------------------------------------------

    pub async fn create_route(
        &self,
        source_slot: u32,
        destination_slot: u32,
    ) -> Result<RouteCreation, MatrixError> {
        let created = self
            .commit(|state| state.create_route(source_slot, destination_slot))
            .await?;

        match created.outcome {
            RouteOutcome::Created => tracing::info!(
                source_slot = source_slot,
                destination = destination_slot,
                route = %created.route.id,
                "Route created"
            ),
            RouteOutcome::Replaced {
                previous_source_slot,
            } => tracing::info!(
                source_slot = source_slot,
                destination = destination_slot,
                previous_source_slot = previous_source_slot,
                route = %created.route.id,
                "Route replaced"
            ),
            RouteOutcome::Unchanged => tracing::debug!(
                source_slot = source_slot,
                destination = destination_slot,
                "Route already present"
            ),
        }
        Ok(created)
    }

    /// Remove one route; absent routes are not an error
    pub async fn remove_route(&self, source_slot: u32, destination_slot: u32) -> Option<Route> {
        let removed = self
            .commit(|state| Ok(state.remove_route(source_slot, destination_slot)))
            .await
            .ok()
            .flatten();

        if removed.is_some() {
            tracing::info!(
                source_slot = source_slot,
                destination = destination_slot,
                "Route removed"
            );
        }
        removed
    }

    /// Replace all routes from a source with routes to `destination_slots`
    pub async fn create_multiple_routes(
        &self,
        source_slot: u32,
        destination_slots: &[u32],
    ) -> Result<BulkRouteOutcome, MatrixError> {
        let outcome = self
            .commit(|state| state.create_multiple_routes(source_slot, destination_slots))
            .await?;

        tracing::info!(
            source_slot = source_slot,
            routes = outcome.routes.len(),
            removed = outcome.removed.len(),
            replaced = outcome.replaced.len(),
            "Bulk routes applied"
        );
        Ok(outcome)
    }

    pub async fn remove_all_routes_from_source(
        &self,
        source_slot: u32,
    ) -> Result<Vec<Route>, MatrixError> {
        let removed = self
            .commit(|state| state.remove_all_routes_from_source(source_slot))
            .await?;

        if !removed.is_empty() {
            tracing::info!(
                source_slot = source_slot,
                removed = removed.len(),
                "Routes from source removed"
            );
        }
        Ok(removed)
    }

    // ---- preview / studio monitor -------------------------------------

    /// Point preview or monitor at a discoverable source
    pub async fn set_pointer(
        &self,
        kind: PointerKind,
        source_name: &str,
    ) -> Result<PointerState, MatrixError> {
        let source = self.catalog.lookup(source_name).await?;
        if self.state.read().await.is_destination_name(&source.name) {
            return Err(MatrixError::UnknownSource(source.name));
        }
        Ok(self.monitors.set_pointer(kind, source).await)
    }

    pub async fn clear_pointer(&self, kind: PointerKind) -> Option<String> {
        self.monitors.clear(kind).await
    }

    pub fn toggle_pointer(&self, kind: PointerKind) -> bool {
        self.monitors.toggle_visibility(kind)
    }

    pub fn pointer(&self, kind: PointerKind) -> PointerState {
        self.monitors.pointer(kind)
    }

    /// Latest visible frame, or `None` if nothing has been captured yet
    pub fn frame(&self, kind: PointerKind) -> Option<PreviewFrame> {
        self.monitors.frame(kind)
    }

    /// Clear every bound pointer
    pub async fn reset_monitors(&self) -> Vec<ClearedPointer> {
        self.monitors.reset_all().await
    }

    /// Stop background capture
    pub async fn shutdown(&self) {
        self.monitors.shutdown().await;
        tracing::info!("Routing engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::catalog::StaticDiscovery;
    use crate::matrix::signal::{RecordingRouter, SignalCommand};
    use crate::monitor::{MonitorConfig, TestPatternCapture};

    struct Harness {
        discovery: Arc<StaticDiscovery>,
        router: Arc<RecordingRouter>,
        engine: Arc<RoutingEngine>,
    }

    fn harness_with(config: MatrixConfig) -> Harness {
        let discovery = Arc::new(StaticDiscovery::new(
            ["CAM-A", "CAM-B", "CAM-C", "STUDIO MONITOR 1"]
                .into_iter()
                .map(|n| Source::new(n, "10.0.0.1:5961"))
                .collect(),
        ));
        let router = Arc::new(RecordingRouter::new());
        let catalog = Arc::new(SourceCatalog::new(discovery.clone()));
        let monitors = Arc::new(MonitorService::with_config(
            Arc::new(TestPatternCapture::new(4, 2)),
            MonitorConfig::default().capture_period(Duration::from_millis(5)),
        ));
        let engine = Arc::new(RoutingEngine::new(config, catalog, monitors, router.clone()));
        Harness {
            discovery,
            router,
            engine,
        }
    }

    fn harness() -> Harness {
        harness_with(MatrixConfig::default())
    }

    #[tokio::test]
    async fn test_bulk_failure_leaves_route_unchanged() {
        let h = harness();
        let e = &h.engine;

        e.assign_source(1, "CAM-A", None).await.unwrap();
        let program = e.create_destination("Program", None).await.unwrap();
        assert_eq!(program.slot_number, 1);

        let created = e.create_route(1, 1).await.unwrap();
        assert_eq!(created.outcome, RouteOutcome::Created);
        assert_eq!(e.destinations().await[0].routed_source_slot, Some(1));

        assert_eq!(
            e.create_multiple_routes(1, &[1, 2]).await,
            Err(MatrixError::UnknownDestination(2))
        );
        assert_eq!(e.destinations().await[0].routed_source_slot, Some(1));
        assert_eq!(e.routes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_route_replaces_upstream() {
        let h = harness();
        let e = &h.engine;
        e.assign_source(1, "CAM-A", None).await.unwrap();
        e.assign_source(3, "CAM-C", None).await.unwrap();
        e.create_destination("Program", None).await.unwrap();
        e.create_destination("Stream", None).await.unwrap();
        e.create_destination("Record", None).await.unwrap();
        e.create_route(3, 2).await.unwrap();
        e.create_route(3, 3).await.unwrap();

        let replaced = e.create_route(1, 2).await.unwrap();
        assert_eq!(
            replaced.outcome,
            RouteOutcome::Replaced {
                previous_source_slot: 3
            }
        );
        assert_eq!(e.destinations_for_source(3).await.unwrap(), vec![3]);
        assert_eq!(
            e.routes()
                .await
                .iter()
                .filter(|r| r.destination_slot == 2)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_assign_requires_visible_source() {
        let h = harness();
        assert_eq!(
            h.engine.assign_source(1, "CAM-Z", None).await,
            Err(MatrixError::UnknownSource("CAM-Z".into()))
        );
        assert_eq!(
            h.engine.assign_source(9, "CAM-A", None).await,
            Err(MatrixError::UnknownSlot(9))
        );

        // Appears after the last refresh: found by the re-poll on miss
        h.discovery.add(Source::new("CAM-Z", ""));
        assert!(h.engine.assign_source(1, "CAM-Z", None).await.is_ok());

        h.discovery.set_offline(true);
        assert!(matches!(
            h.engine.assign_source(2, "CAM-Y", None).await,
            Err(MatrixError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn test_unassign_slot_clears_matching_pointers() {
        let h = harness();
        let e = &h.engine;
        e.catalog().refresh().await.unwrap();

        e.assign_source(1, "CAM-A", None).await.unwrap();
        e.create_destination("Program", None).await.unwrap();
        e.create_route(1, 1).await.unwrap();
        e.set_pointer(PointerKind::Monitor, "CAM-A").await.unwrap();
        e.set_pointer(PointerKind::Preview, "CAM-B").await.unwrap();

        let release = e.unassign_slot(1).await.unwrap();
        assert_eq!(release.removed_routes.len(), 1);
        assert_eq!(
            release.cleared_pointers,
            vec![ClearedPointer {
                pointer: PointerKind::Monitor,
                source: "CAM-A".into()
            }]
        );
        assert!(e.pointer(PointerKind::Monitor).source.is_none());
        assert!(e.frame(PointerKind::Monitor).is_none());
        assert_eq!(
            e.pointer(PointerKind::Preview).source.as_deref(),
            Some("CAM-B")
        );
        assert_eq!(e.destinations().await[0].routed_source_slot, None);
        e.shutdown().await;
    }

    #[tokio::test]
    async fn test_signals_follow_commits() {
        let h = harness();
        let e = &h.engine;

        e.assign_source(1, "CAM-A", None).await.unwrap();
        e.create_destination("Program", None).await.unwrap();
        e.create_route(1, 1).await.unwrap();
        e.assign_source(1, "CAM-B", None).await.unwrap();
        e.delete_destination(1).await.unwrap();

        assert_eq!(
            h.router.take(),
            vec![
                SignalCommand::Advertise {
                    destination: "Program".into()
                },
                SignalCommand::Switch {
                    destination: "Program".into(),
                    source: "CAM-A".into()
                },
                SignalCommand::Switch {
                    destination: "Program".into(),
                    source: "CAM-B".into()
                },
                SignalCommand::Withdraw {
                    destination: "Program".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_default_destinations_advertised() {
        let h = harness_with(
            MatrixConfig::default().default_destinations(["NDI Output 1", "NDI Output 2"]),
        );
        let destinations = h.engine.destinations().await;
        assert_eq!(destinations.len(), 2);
        assert_eq!(destinations[1].slot_number, 2);
        assert_eq!(
            destinations[0].description.as_deref(),
            Some("Matrix destination 1")
        );
        assert_eq!(h.router.take().len(), 2);
    }

    #[tokio::test]
    async fn test_own_outputs_hidden_from_sources() {
        let h = harness();
        h.discovery.add(Source::new("Program", "127.0.0.1:5961"));
        h.engine.create_destination("Program", None).await.unwrap();
        h.engine.catalog().refresh().await.unwrap();

        let names: Vec<String> = h
            .engine
            .list_sources()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert!(!names.contains(&"Program".to_string()));
        assert!(names.contains(&"CAM-A".to_string()));

        assert_eq!(
            h.engine.assign_source(1, "Program", None).await,
            Err(MatrixError::UnknownSource("Program".into()))
        );
        assert_eq!(
            h.engine.set_pointer(PointerKind::Preview, "Program").await,
            Err(MatrixError::UnknownSource("Program".into()))
        );

        let monitors = h.engine.studio_monitors().await;
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].name, "STUDIO MONITOR 1");
    }

    #[tokio::test]
    async fn test_reset_monitors_clears_all_pointers() {
        let h = harness();
        let e = &h.engine;
        e.set_pointer(PointerKind::Preview, "CAM-A").await.unwrap();
        e.set_pointer(PointerKind::Monitor, "STUDIO MONITOR 1").await.unwrap();

        assert_eq!(e.reset_monitors().await.len(), 2);
        assert_eq!(e.pointer(PointerKind::Preview), PointerState::default());
        assert!(e.reset_monitors().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bulk_routes_keep_invariants() {
        let h = harness();
        let e = &h.engine;
        for (slot, name) in [(1, "CAM-A"), (2, "CAM-B"), (3, "CAM-C")] {
            e.assign_source(slot, name, None).await.unwrap();
        }
        for n in 1..=6 {
            e.create_destination(&format!("OUT-{}", n), None).await.unwrap();
        }

        let mut tasks = Vec::new();
        for i in 0..60u32 {
            let engine = Arc::clone(&h.engine);
            tasks.push(tokio::spawn(async move {
                let source = 1 + i % 3;
                let targets: Vec<u32> = (1..=6).filter(|d| (d + i) % 2 == 0).collect();
                engine
                    .create_multiple_routes(source, &targets)
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        e.state.read().await.assert_consistent();
        let stats = e.matrix_stats().await;
        assert!(stats.active_routes <= stats.destinations);
    }

    /// Router whose switch call stands in for slow network I/O
    struct SlowRouter {
        inner: RecordingRouter,
        delay: Duration,
    }

    impl SignalRouter for SlowRouter {
        fn advertise(&self, destination: &str) -> Result<(), MatrixError> {
            self.inner.advertise(destination)
        }

        fn withdraw(&self, destination: &str) -> Result<(), MatrixError> {
            self.inner.withdraw(destination)
        }

        fn switch(&self, destination: &str, source: &str) -> Result<(), MatrixError> {
            std::thread::sleep(self.delay);
            self.inner.switch(destination, source)
        }

        fn clear(&self, destination: &str) -> Result<(), MatrixError> {
            self.inner.clear(destination)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reads_not_blocked_by_router_io() {
        let discovery = Arc::new(StaticDiscovery::new(vec![Source::new("CAM-A", "10.0.0.1:5961")]));
        let router = Arc::new(SlowRouter {
            inner: RecordingRouter::new(),
            delay: Duration::from_millis(400),
        });
        let engine = Arc::new(RoutingEngine::new(
            MatrixConfig::default(),
            Arc::new(SourceCatalog::new(discovery)),
            Arc::new(MonitorService::new(Arc::new(TestPatternCapture::new(4, 2)))),
            router.clone(),
        ));
        engine.assign_source(1, "CAM-A", None).await.unwrap();
        engine.create_destination("OUT-1", None).await.unwrap();
        engine.create_destination("OUT-2", None).await.unwrap();
        router.inner.take();

        let first = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.create_route(1, 1).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.create_route(1, 2).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Both commits are in flight and the router is still busy with the first
        let routes = tokio::time::timeout(Duration::from_millis(100), engine.routes()).await;
        assert_eq!(tokio_test::assert_ok!(routes).len(), 2);

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(
            router.inner.take(),
            vec![
                SignalCommand::Switch {
                    destination: "OUT-1".into(),
                    source: "CAM-A".into()
                },
                SignalCommand::Switch {
                    destination: "OUT-2".into(),
                    source: "CAM-A".into()
                },
            ]
        );
        engine.shutdown().await;
    }
}
