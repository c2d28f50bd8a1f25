//! Observability snapshots

pub mod metrics;

pub use metrics::{CaptureCounters, CaptureStats, MatrixStats, ServiceStats};
