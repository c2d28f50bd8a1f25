//! Routing matrix configuration

/// Configuration for the routing matrix
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    /// Number of source slots (numbered 1..=source_slots)
    pub source_slots: u32,

    /// Destinations created when the engine starts, in slot order
    pub default_destinations: Vec<String>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            source_slots: 8,
            default_destinations: Vec::new(),
        }
    }
}

impl MatrixConfig {
    /// Set the number of source slots (at least one)
    pub fn source_slots(mut self, count: u32) -> Self {
        self.source_slots = count.max(1);
        self
    }

    /// Set the destinations created at startup
    pub fn default_destinations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_destinations = names.into_iter().map(Into::into).collect();
        self
    }
}
