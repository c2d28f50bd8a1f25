//! Routing matrix aggregate
//!
//! Slot table, destination registry and route table live in one owned value
//! so every invariant that spans them is checked and maintained in a single
//! place. Each operation validates everything it needs before its first
//! write; an `Err` return therefore never leaves partial state behind.
//!
//! The route table is keyed by destination slot, which makes
//! "at most one source per destination" structural rather than checked.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::config::MatrixConfig;
use super::destination::Destination;
use super::error::MatrixError;
use super::route::{BulkRouteOutcome, Route, RouteCreation, RouteId, RouteOutcome};
use super::signal::SignalCommand;
use super::slot::SourceSlot;
use crate::monitor::ClearedPointer;
use crate::stats::MatrixStats;

/// Result of unassigning a source slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRelease {
    /// The slot after the unassignment
    pub slot: SourceSlot,
    /// Name that was bound before
    pub previous_source: Option<String>,
    /// Routes removed by the cascade
    pub removed_routes: Vec<Route>,
    /// Preview/monitor pointers reset by the cascade
    pub cleared_pointers: Vec<ClearedPointer>,
}

/// Result of deleting a destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRemoval {
    pub destination: Destination,
    pub removed_route: Option<Route>,
}

/// Slot table, destination registry and route table
#[derive(Debug)]
pub(crate) struct MatrixState {
    /// Index `n - 1` holds slot `n`
    slots: Vec<SourceSlot>,

    destinations: BTreeMap<u32, Destination>,

    /// Keyed by destination slot
    routes: BTreeMap<u32, Route>,

    /// Monotonic, never reused
    next_destination_slot: u32,

    next_route_seq: u64,

    /// Commands produced by committed changes, drained by the engine
    pending: Vec<SignalCommand>,
}

impl MatrixState {
    pub(crate) fn new(config: &MatrixConfig) -> Self {
        Self {
            slots: (1..=config.source_slots).map(SourceSlot::empty).collect(),
            destinations: BTreeMap::new(),
            routes: BTreeMap::new(),
            next_destination_slot: 1,
            next_route_seq: 0,
            pending: Vec::new(),
        }
    }

    // ---- queries -------------------------------------------------------

    pub(crate) fn source_slots(&self) -> Vec<SourceSlot> {
        self.slots.clone()
    }

    pub(crate) fn destinations(&self) -> Vec<Destination> {
        self.destinations.values().cloned().collect()
    }

    pub(crate) fn routes(&self) -> Vec<Route> {
        self.routes.values().cloned().collect()
    }

    pub(crate) fn destinations_for_source(&self, source_slot: u32) -> Result<Vec<u32>, MatrixError> {
        self.slot_index(source_slot)?;
        Ok(self
            .routes
            .values()
            .filter(|r| r.source_slot == source_slot)
            .map(|r| r.destination_slot)
            .collect())
    }

    pub(crate) fn is_destination_name(&self, name: &str) -> bool {
        self.destinations.values().any(|d| d.name == name)
    }

    pub(crate) fn stats(&self) -> MatrixStats {
        MatrixStats {
            source_slots: self.slots.len() as u32,
            bound_slots: self.slots.iter().filter(|s| s.is_bound()).count() as u32,
            destinations: self.destinations.len(),
            enabled_destinations: self.destinations.values().filter(|d| d.enabled).count(),
            active_routes: self.routes.len(),
        }
    }

    pub(crate) fn take_signals(&mut self) -> Vec<SignalCommand> {
        std::mem::take(&mut self.pending)
    }

    // ---- source slots --------------------------------------------------

    /// Bind a catalog source to a slot
    ///
    /// Existing routes from the slot stay in place; their destinations are
    /// switched to the new source.
    pub(crate) fn assign_source(
        &mut self,
        slot: u32,
        source_name: String,
        display_name: Option<String>,
    ) -> Result<SourceSlot, MatrixError> {
        let idx = self.slot_index(slot)?;
        if self.is_destination_name(&source_name) {
            // One of our own outputs; binding it would feed the matrix into itself
            return Err(MatrixError::UnknownSource(source_name));
        }

        let changed = self.slots[idx].bound_source_name.as_deref() != Some(source_name.as_str());
        self.slots[idx].bind(source_name.clone(), display_name);

        if changed {
            let switches: Vec<SignalCommand> = self
                .routes
                .values()
                .filter(|r| r.source_slot == slot)
                .filter_map(|r| self.destinations.get(&r.destination_slot))
                .filter(|d| d.enabled)
                .map(|d| SignalCommand::Switch {
                    destination: d.name.clone(),
                    source: source_name.clone(),
                })
                .collect();
            self.pending.extend(switches);
        }

        Ok(self.slots[idx].clone())
    }

    /// Clear a slot binding and cascade to every route it feeds
    pub(crate) fn unassign_slot(&mut self, slot: u32) -> Result<SlotRelease, MatrixError> {
        let idx = self.slot_index(slot)?;
        let removed_routes = self.detach_source_routes(slot);
        let previous_source = self.slots[idx].unbind();

        Ok(SlotRelease {
            slot: self.slots[idx].clone(),
            previous_source,
            removed_routes,
            cleared_pointers: Vec::new(),
        })
    }

    // ---- destinations --------------------------------------------------

    pub(crate) fn create_destination(
        &mut self,
        name: String,
        description: Option<String>,
    ) -> Result<Destination, MatrixError> {
        if self.is_destination_name(&name) {
            return Err(MatrixError::DuplicateName(name));
        }

        let slot = self.next_destination_slot;
        self.next_destination_slot += 1;

        let destination = Destination::new(slot, name, description);
        self.pending.push(SignalCommand::Advertise {
            destination: destination.name.clone(),
        });
        self.destinations.insert(slot, destination.clone());

        Ok(destination)
    }

    pub(crate) fn delete_destination(&mut self, slot: u32) -> Result<DestinationRemoval, MatrixError> {
        let destination = self
            .destinations
            .remove(&slot)
            .ok_or(MatrixError::UnknownDestination(slot))?;
        let removed_route = self.routes.remove(&slot);

        self.pending.push(SignalCommand::Withdraw {
            destination: destination.name.clone(),
        });

        Ok(DestinationRemoval {
            destination: Destination {
                routed_source_slot: None,
                ..destination
            },
            removed_route,
        })
    }

    /// Drop the route into a destination, keeping the destination
    pub(crate) fn unassign_destination(&mut self, slot: u32) -> Result<Option<Route>, MatrixError> {
        if !self.destinations.contains_key(&slot) {
            return Err(MatrixError::UnknownDestination(slot));
        }
        Ok(self.unlink(slot))
    }

    pub(crate) fn set_destination_enabled(
        &mut self,
        slot: u32,
        enabled: bool,
    ) -> Result<Destination, MatrixError> {
        let destination = self
            .destinations
            .get_mut(&slot)
            .ok_or(MatrixError::UnknownDestination(slot))?;

        if destination.enabled != enabled {
            destination.enabled = enabled;

            let upstream = destination
                .routed_source_slot
                .and_then(|s| self.slots.get(s as usize - 1))
                .and_then(|s| s.bound_source_name.clone());

            match (enabled, upstream) {
                (true, Some(source)) => self.pending.push(SignalCommand::Switch {
                    destination: destination.name.clone(),
                    source,
                }),
                (false, Some(_)) => self.pending.push(SignalCommand::Clear {
                    destination: destination.name.clone(),
                }),
                (_, None) => {}
            }
        }

        Ok(destination.clone())
    }

    // ---- routes --------------------------------------------------------

    /// Route a source slot into a destination, replacing any other upstream
    pub(crate) fn create_route(
        &mut self,
        source_slot: u32,
        destination_slot: u32,
    ) -> Result<RouteCreation, MatrixError> {
        let idx = self.slot_index(source_slot)?;
        if !self.destinations.contains_key(&destination_slot) {
            return Err(MatrixError::UnknownDestination(destination_slot));
        }
        let source_name = self.slots[idx]
            .bound_source_name
            .clone()
            .ok_or(MatrixError::SourceNotBound(source_slot))?;

        Ok(self.link(source_slot, destination_slot, &source_name))
    }

    /// Remove one route; absent routes are not an error
    pub(crate) fn remove_route(&mut self, source_slot: u32, destination_slot: u32) -> Option<Route> {
        match self.routes.get(&destination_slot) {
            Some(route) if route.source_slot == source_slot => self.unlink(destination_slot),
            _ => None,
        }
    }

    /// Replace the full outgoing route set of a source in one step
    ///
    /// All destinations are validated before anything changes, so a bad
    /// element leaves the source's routes exactly as they were.
    pub(crate) fn create_multiple_routes(
        &mut self,
        source_slot: u32,
        destination_slots: &[u32],
    ) -> Result<BulkRouteOutcome, MatrixError> {
        let idx = self.slot_index(source_slot)?;
        if let Some(missing) = destination_slots
            .iter()
            .find(|d| !self.destinations.contains_key(*d))
        {
            return Err(MatrixError::UnknownDestination(*missing));
        }
        let source_name = self.slots[idx]
            .bound_source_name
            .clone()
            .ok_or(MatrixError::SourceNotBound(source_slot))?;

        let wanted: BTreeSet<u32> = destination_slots.iter().copied().collect();

        let dropped: Vec<u32> = self
            .routes
            .values()
            .filter(|r| r.source_slot == source_slot && !wanted.contains(&r.destination_slot))
            .map(|r| r.destination_slot)
            .collect();
        for destination_slot in &dropped {
            self.unlink(*destination_slot);
        }

        let mut outcome = BulkRouteOutcome {
            removed: dropped,
            ..Default::default()
        };
        for destination_slot in wanted {
            let created = self.link(source_slot, destination_slot, &source_name);
            if let RouteOutcome::Replaced {
                previous_source_slot,
            } = created.outcome
            {
                outcome.replaced.push((destination_slot, previous_source_slot));
            }
            outcome.routes.push(created.route);
        }

        Ok(outcome)
    }

    pub(crate) fn remove_all_routes_from_source(
        &mut self,
        source_slot: u32,
    ) -> Result<Vec<Route>, MatrixError> {
        self.slot_index(source_slot)?;
        Ok(self.detach_source_routes(source_slot))
    }

    // ---- internals -----------------------------------------------------

    fn slot_index(&self, slot: u32) -> Result<usize, MatrixError> {
        if slot == 0 || slot as usize > self.slots.len() {
            return Err(MatrixError::UnknownSlot(slot));
        }
        Ok(slot as usize - 1)
    }

    /// Install `source_slot -> destination_slot`; both ends already validated
    fn link(&mut self, source_slot: u32, destination_slot: u32, source_name: &str) -> RouteCreation {
        if let Some(existing) = self.routes.get(&destination_slot) {
            if existing.source_slot == source_slot {
                return RouteCreation {
                    route: existing.clone(),
                    outcome: RouteOutcome::Unchanged,
                };
            }
        }

        let route = Route {
            id: RouteId::from_sequence(self.next_route_seq),
            source_slot,
            destination_slot,
            active: true,
        };
        self.next_route_seq += 1;

        let previous = self.routes.insert(destination_slot, route.clone());

        if let Some(destination) = self.destinations.get_mut(&destination_slot) {
            destination.routed_source_slot = Some(source_slot);
            if destination.enabled {
                self.pending.push(SignalCommand::Switch {
                    destination: destination.name.clone(),
                    source: source_name.to_string(),
                });
            }
        }

        let outcome = match previous {
            Some(prev) => RouteOutcome::Replaced {
                previous_source_slot: prev.source_slot,
            },
            None => RouteOutcome::Created,
        };
        RouteCreation { route, outcome }
    }

    /// Remove the route into a destination and clear its derived field
    fn unlink(&mut self, destination_slot: u32) -> Option<Route> {
        let route = self.routes.remove(&destination_slot)?;

        if let Some(destination) = self.destinations.get_mut(&destination_slot) {
            destination.routed_source_slot = None;
            if destination.enabled {
                self.pending.push(SignalCommand::Clear {
                    destination: destination.name.clone(),
                });
            }
        }

        Some(route)
    }

    fn detach_source_routes(&mut self, source_slot: u32) -> Vec<Route> {
        let affected: Vec<u32> = self
            .routes
            .values()
            .filter(|r| r.source_slot == source_slot)
            .map(|r| r.destination_slot)
            .collect();

        affected
            .into_iter()
            .filter_map(|destination_slot| self.unlink(destination_slot))
            .collect()
    }

    /// Panic if any cross-table invariant is broken
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for (destination_slot, route) in &self.routes {
            assert_eq!(*destination_slot, route.destination_slot);
            assert!(route.active);
            assert!(
                self.destinations.contains_key(destination_slot),
                "route into missing destination {}",
                destination_slot
            );
            let slot = &self.slots[route.source_slot as usize - 1];
            assert!(slot.is_bound(), "route from unbound slot {}", route.source_slot);
        }
        for destination in self.destinations.values() {
            assert_eq!(
                destination.routed_source_slot,
                self.routes
                    .get(&destination.slot_number)
                    .map(|r| r.source_slot),
                "derived field out of sync for destination {}",
                destination.slot_number
            );
        }
    }
}
