//! Destination registry entries

use serde::Serialize;

/// A named virtual output advertised on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Allocated on creation, never reused
    pub slot_number: u32,
    /// Advertised output name, unique (case-sensitive)
    pub name: String,
    pub description: Option<String>,
    /// Disabled outputs keep their route but carry no signal
    pub enabled: bool,
    /// Source slot currently routed here
    ///
    /// Derived from the route table; only the engine writes it.
    pub routed_source_slot: Option<u32>,
}

impl Destination {
    pub(crate) fn new(slot_number: u32, name: String, description: Option<String>) -> Self {
        Self {
            slot_number,
            name,
            description: description.filter(|d| !d.is_empty()),
            enabled: true,
            routed_source_slot: None,
        }
    }
}
