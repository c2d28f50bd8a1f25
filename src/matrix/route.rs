//! Route table types
//!
//! A route is a directed edge from a bound source slot to a destination.
//! Routes are either present (active) or absent; there is no pending state.

use serde::Serialize;

/// Opaque route identifier handed to clients for reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RouteId(String);

impl RouteId {
    /// Derive an identifier from a never-reused sequence number
    ///
    /// Formatted as two 4-digit hex groups ("3f2a-09c1"); the sequence is
    /// scrambled so adjacent routes do not look alike.
    pub(crate) fn from_sequence(seq: u64) -> Self {
        let mixed = (seq.wrapping_add(1)).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let bits = (mixed >> 32) as u32;
        Self(format!("{:04x}-{:04x}", bits >> 16, bits & 0xffff))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An active edge in the routing matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: RouteId,
    pub source_slot: u32,
    pub destination_slot: u32,
    /// Always true for routes visible in a snapshot
    pub active: bool,
}

/// Result of creating a single route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RouteOutcome {
    /// Destination had no upstream; a new route was added
    Created,
    /// Destination was fed by another slot; that route was replaced
    #[serde(rename_all = "camelCase")]
    Replaced { previous_source_slot: u32 },
    /// The exact route already existed
    Unchanged,
}

/// A route together with how it came to be
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteCreation {
    pub route: Route,
    #[serde(flatten)]
    pub outcome: RouteOutcome,
}

/// Result of atomically replacing a source's outgoing routes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRouteOutcome {
    /// Routes from the source after the operation
    pub routes: Vec<Route>,
    /// Destinations that lost this source
    pub removed: Vec<u32>,
    /// Destinations taken over from another source, with that source slot
    pub replaced: Vec<(u32, u32)>,
}
