//! Client aggregate and its owned phone numbers.
//!
//! # Invariants
//! - `phone_numbers` order is the storage order (`id ASC`) after a load and
//!   append order for numbers added in memory.
//! - A phone number belongs to exactly one client; `client_id` is assigned
//!   by storage on save.

use super::{lock, shared, Entity, EntityId, RowVersioned, Shared};
use serde::Serialize;

/// Client record edited by the client detail view.
#[derive(Debug, Default)]
pub struct Client {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// Optional association to a company; `None` is the "no company" choice.
    pub company_id: Option<EntityId>,
    pub row_version: i64,
    pub phone_numbers: Vec<Shared<ClientPhoneNumber>>,
}

/// One phone number owned by a client.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ClientPhoneNumber {
    pub id: EntityId,
    pub client_id: EntityId,
    pub number: String,
}

/// Detached copy of a client and all of its phone numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub company_id: Option<EntityId>,
    pub row_version: i64,
    pub phone_numbers: Vec<ClientPhoneNumber>,
}

impl Client {
    /// Creates an unsaved client with no phone numbers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Display label used for titles and notifications.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name,
            self.last_name.as_deref().unwrap_or_default()
        )
    }

    /// Appends an in-memory phone number and returns its shared handle.
    pub fn push_phone_number(&mut self, phone: ClientPhoneNumber) -> Shared<ClientPhoneNumber> {
        let handle = shared(phone);
        self.phone_numbers.push(handle.clone());
        handle
    }

    /// Removes the given phone handle from the owned collection.
    ///
    /// Returns `false` when the handle is not part of this client.
    pub fn detach_phone_number(&mut self, phone: &Shared<ClientPhoneNumber>) -> bool {
        let before = self.phone_numbers.len();
        self.phone_numbers
            .retain(|candidate| !std::sync::Arc::ptr_eq(candidate, phone));
        self.phone_numbers.len() != before
    }
}

impl ClientPhoneNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            ..Self::default()
        }
    }
}

impl RowVersioned for Client {
    fn row_id(&self) -> EntityId {
        self.id
    }

    fn row_version(&self) -> i64 {
        self.row_version
    }
}

impl RowVersioned for ClientSnapshot {
    fn row_id(&self) -> EntityId {
        self.id
    }

    fn row_version(&self) -> i64 {
        self.row_version
    }
}

impl Entity for Client {
    const TYPE: &'static str = "Client";

    type Snapshot = ClientSnapshot;

    fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            company_id: self.company_id,
            row_version: self.row_version,
            phone_numbers: self
                .phone_numbers
                .iter()
                .map(|phone| lock(phone).clone())
                .collect(),
        }
    }

    fn restore(&mut self, snapshot: &ClientSnapshot) {
        self.id = snapshot.id;
        self.first_name = snapshot.first_name.clone();
        self.last_name = snapshot.last_name.clone();
        self.email = snapshot.email.clone();
        self.company_id = snapshot.company_id;
        self.row_version = snapshot.row_version;
        for (handle, saved) in self.phone_numbers.iter().zip(&snapshot.phone_numbers) {
            *lock(handle) = saved.clone();
        }
    }
}
