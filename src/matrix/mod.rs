//! Routing matrix
//!
//! A fixed table of numbered source slots, a registry of named destinations,
//! and the routes between them. The matrix is owned by a single
//! [`RoutingEngine`]; every mutation runs under one write lock so invariants
//! that span the three tables never observe a half-applied change.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<RoutingEngine>
//!              ┌──────────────────────────────────┐
//!              │ state: RwLock<MatrixState {      │
//!              │   slots:        [SourceSlot; N], │
//!              │   destinations: {slot → Dest},   │
//!              │   routes:       {dest → Route},  │
//!              │ }>                               │
//!              └───────┬───────────────┬──────────┘
//!                      │               │
//!        catalog.lookup()        signal commands
//!        (before the lock)       (after the lock)
//!                      │               │
//!                      ▼               ▼
//!              [SourceCatalog]   [SignalRouter]
//! ```
//!
//! # Invariants
//!
//! - A destination has at most one upstream route (routes are keyed by
//!   destination slot).
//! - Routes only reference bound source slots and existing destinations.
//! - `Destination::routed_source_slot` always mirrors the route table.
//! - Failed operations change nothing.

pub mod config;
pub mod destination;
pub mod engine;
pub mod error;
pub mod route;
pub mod signal;
pub mod slot;
pub mod state;

pub use config::MatrixConfig;
pub use destination::Destination;
pub use engine::RoutingEngine;
pub use error::MatrixError;
pub use route::{BulkRouteOutcome, Route, RouteCreation, RouteId, RouteOutcome};
pub use signal::{NullRouter, RecordingRouter, SignalCommand, SignalRouter};
pub use slot::SourceSlot;
pub use state::{DestinationRemoval, SlotRelease};
