//! Hydrometer: a named measurement device, assignable to one active batch.

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// A hydrometer record.
///
/// `current_batch` is a weak back-reference: when `Some`, the referenced
/// batch must reference this hydrometer in turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hydrometer {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "batch")]
    pub current_batch: Option<EntityId>,
    #[serde(default)]
    pub archived: bool,
}

impl Hydrometer {
    /// Build an unassigned, unarchived hydrometer with a fresh identity.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            description: description.into(),
            current_batch: None,
            archived: false,
        }
    }

    /// Whether the hydrometer is free to be attached to a batch.
    pub fn is_unassigned(&self) -> bool {
        self.current_batch.is_none()
    }

    /// Whether the hydrometer is currently attached to `batch_id`.
    pub fn is_assigned_to(&self, batch_id: &EntityId) -> bool {
        self.current_batch.as_ref() == Some(batch_id)
    }

    /// Whether the hydrometer can be listed as available for new batches.
    pub fn is_available(&self) -> bool {
        self.is_unassigned() && !self.archived
    }

    pub(crate) fn release(&mut self) {
        self.current_batch = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_hydrometer_is_available() {
        let h = Hydrometer::new("Green Hydrometer", "green plastic");
        assert!(h.is_unassigned());
        assert!(h.is_available());
    }

    #[test]
    fn archived_hydrometer_is_not_available() {
        let mut h = Hydrometer::new("Blue Hydrometer", "");
        h.archived = true;
        assert!(h.is_unassigned());
        assert!(!h.is_available());
    }

    #[test]
    fn missing_batch_field_deserializes_as_unassigned() {
        let id = EntityId::new();
        let raw = format!(r#"{{"id":"{id}","name":"Blue Hydrometer"}}"#);
        let h: Hydrometer = serde_json::from_str(&raw).expect("hydrometer should parse");
        assert!(h.is_unassigned());
        assert!(!h.archived);
        assert_eq!(h.description, "");
    }
}
