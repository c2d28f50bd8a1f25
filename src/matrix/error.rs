//! Matrix error types
//!
//! Error types for routing-matrix operations.

/// Error type for routing-matrix operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    /// Source slot number outside the configured slot table
    UnknownSlot(u32),
    /// Source name not present in the current catalog
    UnknownSource(String),
    /// No destination with this slot number
    UnknownDestination(u32),
    /// A destination with this name already exists
    DuplicateName(String),
    /// Source slot has no source bound to it
    SourceNotBound(u32),
    /// External discovery/capture collaborator unreachable
    NotConnected(String),
}

impl MatrixError {
    /// Stable machine-readable kind, used by the control surface
    pub fn kind(&self) -> &'static str {
        match self {
            MatrixError::UnknownSlot(_) => "unknown_slot",
            MatrixError::UnknownSource(_) => "unknown_source",
            MatrixError::UnknownDestination(_) => "unknown_destination",
            MatrixError::DuplicateName(_) => "duplicate_name",
            MatrixError::SourceNotBound(_) => "source_not_bound",
            MatrixError::NotConnected(_) => "not_connected",
        }
    }
}

impl std::fmt::Display for MatrixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixError::UnknownSlot(slot) => write!(f, "Unknown source slot: {}", slot),
            MatrixError::UnknownSource(name) => write!(f, "Unknown source: {}", name),
            MatrixError::UnknownDestination(slot) => {
                write!(f, "Unknown destination: {}", slot)
            }
            MatrixError::DuplicateName(name) => {
                write!(f, "Destination name already in use: {}", name)
            }
            MatrixError::SourceNotBound(slot) => {
                write!(f, "Source slot {} has no source bound", slot)
            }
            MatrixError::NotConnected(what) => write!(f, "Not connected: {}", what),
        }
    }
}

impl std::error::Error for MatrixError {}
