//! Statistics for the routing matrix and capture loops

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time counts for the routing matrix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixStats {
    /// Configured source slots
    pub source_slots: u32,
    /// Slots with a source bound
    pub bound_slots: u32,
    /// Existing destinations
    pub destinations: usize,
    /// Destinations currently enabled
    pub enabled_destinations: usize,
    /// Active routes
    pub active_routes: usize,
}

/// Snapshot of a capture loop's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStats {
    /// Frames stored into the cache
    pub frames_captured: u64,
    /// Ticks where the source had no new frame
    pub empty_ticks: u64,
    /// Ticks that failed (connect, capture or decode error)
    pub failed_ticks: u64,
    /// Frames discarded because the pointer moved on mid-capture
    pub stale_discards: u64,
}

/// Everything `/api/stats` reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub matrix: MatrixStats,
    /// Sources currently in the catalog (own outputs excluded)
    pub catalog_sources: usize,
    /// Whether the last discovery poll succeeded
    pub discovery_reachable: bool,
    pub preview: CaptureStats,
    pub monitor: CaptureStats,
}

/// Live counters updated by a capture task
#[derive(Debug, Default)]
pub struct CaptureCounters {
    frames_captured: AtomicU64,
    empty_ticks: AtomicU64,
    failed_ticks: AtomicU64,
    stale_discards: AtomicU64,
}

impl CaptureCounters {
    pub fn record_frame(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty(&self) {
        self.empty_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            empty_ticks: self.empty_ticks.load(Ordering::Relaxed),
            failed_ticks: self.failed_ticks.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
        }
    }
}
