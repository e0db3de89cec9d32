//! Meeting record and its client participants.
//!
//! # Invariants
//! - `date_to` is never earlier than `date_from` (epoch milliseconds).
//! - `client_ids` is an association: removing a participant never deletes
//!   the client row.

use super::{Entity, EntityId, RowVersioned};
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Meeting {
    pub id: EntityId,
    pub title: String,
    /// Unix epoch milliseconds.
    pub date_from: i64,
    /// Unix epoch milliseconds.
    pub date_to: i64,
    pub row_version: i64,
    /// Participants, sorted ascending after a load.
    pub client_ids: Vec<EntityId>,
}

impl Meeting {
    pub fn new(title: impl Into<String>, date_from: i64, date_to: i64) -> Self {
        Self {
            title: title.into(),
            date_from,
            date_to,
            ..Self::default()
        }
    }

    /// Adds a participant once; repeated adds are ignored.
    pub fn add_client(&mut self, client_id: EntityId) {
        if !self.client_ids.contains(&client_id) {
            self.client_ids.push(client_id);
        }
    }

    pub fn remove_client(&mut self, client_id: EntityId) {
        self.client_ids.retain(|id| *id != client_id);
    }
}

impl RowVersioned for Meeting {
    fn row_id(&self) -> EntityId {
        self.id
    }

    fn row_version(&self) -> i64 {
        self.row_version
    }
}

impl Entity for Meeting {
    const TYPE: &'static str = "Meeting";

    type Snapshot = Meeting;

    fn snapshot(&self) -> Meeting {
        self.clone()
    }

    fn restore(&mut self, snapshot: &Meeting) {
        *self = snapshot.clone();
    }
}
