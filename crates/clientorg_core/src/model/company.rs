//! Company record referenced by clients.

use super::{Entity, EntityId, RowVersioned};
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    pub id: EntityId,
    pub name: String,
    pub row_version: i64,
}

impl Company {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl RowVersioned for Company {
    fn row_id(&self) -> EntityId {
        self.id
    }

    fn row_version(&self) -> i64 {
        self.row_version
    }
}

impl Entity for Company {
    const TYPE: &'static str = "Company";

    type Snapshot = Company;

    fn snapshot(&self) -> Company {
        self.clone()
    }

    fn restore(&mut self, snapshot: &Company) {
        *self = snapshot.clone();
    }
}
