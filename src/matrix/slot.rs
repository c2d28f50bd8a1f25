//! Source slot table entries

use serde::Serialize;

/// A numbered source-side position in the matrix
///
/// Slots are created once at engine start and never destroyed; only their
/// binding changes. Routes refer to the slot number, not the bound name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSlot {
    /// Stable slot identity (1..=N)
    pub slot_number: u32,
    /// Catalog source currently bound to this slot
    pub bound_source_name: Option<String>,
    /// Operator-facing label
    pub display_name: String,
}

impl SourceSlot {
    /// Create an unbound slot with the default label
    pub(crate) fn empty(slot_number: u32) -> Self {
        Self {
            slot_number,
            bound_source_name: None,
            display_name: Self::default_label(slot_number),
        }
    }

    /// Label shown for an unbound slot
    pub fn default_label(slot_number: u32) -> String {
        format!("Slot {}", slot_number)
    }

    /// Whether a source is bound
    pub fn is_bound(&self) -> bool {
        self.bound_source_name.is_some()
    }

    pub(crate) fn bind(&mut self, source_name: String, display_name: Option<String>) {
        self.display_name = match display_name {
            Some(label) if !label.trim().is_empty() => label,
            _ => source_name.clone(),
        };
        self.bound_source_name = Some(source_name);
    }

    /// Clear the binding, returning the previously bound name
    pub(crate) fn unbind(&mut self) -> Option<String> {
        self.display_name = Self::default_label(self.slot_number);
        self.bound_source_name.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_defaults_label_to_source_name() {
        let mut slot = SourceSlot::empty(3);
        assert_eq!(slot.display_name, "Slot 3");

        slot.bind("CAM-A".into(), None);
        assert_eq!(slot.display_name, "CAM-A");

        slot.bind("CAM-B".into(), Some("  ".into()));
        assert_eq!(slot.display_name, "CAM-B");

        slot.bind("CAM-C".into(), Some("Wide".into()));
        assert_eq!(slot.display_name, "Wide");
        assert!(slot.is_bound());
    }

    #[test]
    fn test_unbind_restores_label() {
        let mut slot = SourceSlot::empty(1);
        slot.bind("CAM-A".into(), Some("Host".into()));

        assert_eq!(slot.unbind(), Some("CAM-A".to_string()));
        assert_eq!(slot.display_name, "Slot 1");
        assert!(!slot.is_bound());
        assert_eq!(slot.unbind(), None);
    }
}
