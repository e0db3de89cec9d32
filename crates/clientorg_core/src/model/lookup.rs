//! Read-only (id, label) pairs used to populate selection lists.

use super::EntityId;
use serde::Serialize;

/// Label shown for the synthetic "no association" choice.
pub const NULL_LOOKUP_DISPLAY: &str = " - ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupItem {
    /// `None` only for the synthetic null item.
    pub id: Option<EntityId>,
    pub display_member: String,
}

impl LookupItem {
    pub fn new(id: EntityId, display_member: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            display_member: display_member.into(),
        }
    }

    /// The "no association" choice prepended to every foreign-key lookup.
    pub fn null() -> Self {
        Self {
            id: None,
            display_member: NULL_LOOKUP_DISPLAY.to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.id.is_none()
    }
}
