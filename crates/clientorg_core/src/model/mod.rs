//! Domain model for clients, companies and meetings.
//!
//! # Responsibility
//! - Define the persisted records edited through detail view models.
//! - Define the snapshot contract used by change tracking.
//!
//! # Invariants
//! - Identity key `0` means "not persisted yet".
//! - `row_version` is owned by storage; callers never bump it themselves.
//! - A wrapper and the change tracker always share the same `Shared<T>`
//!   handle, so edits made through the wrapper are seen by the tracker.

use serde::Serialize;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub mod client;
pub mod company;
pub mod lookup;
pub mod meeting;

/// Identity key of a persisted row.
pub type EntityId = i64;

/// Backing entity shared between wrappers and the change tracker.
pub type Shared<T> = Arc<Mutex<T>>;

/// Moves a freshly built entity behind a shared handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Locks a shared entity, recovering the data from a poisoned lock.
pub fn lock<T>(value: &Shared<T>) -> MutexGuard<'_, T> {
    value.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Row identity and optimistic-concurrency token.
pub trait RowVersioned {
    fn row_id(&self) -> EntityId;
    fn row_version(&self) -> i64;
}

/// Persisted aggregate root tracked by a repository.
///
/// `Snapshot` is a detached, comparable copy of every persisted value,
/// including owned child rows. Change detection compares snapshots against
/// the values captured at load/save time.
pub trait Entity: RowVersioned + Send + 'static {
    /// Stable type tag used in logs, conflicts and notifications.
    const TYPE: &'static str;

    type Snapshot: RowVersioned + Clone + PartialEq + Debug + Serialize + Send + Sync;

    fn snapshot(&self) -> Self::Snapshot;

    /// Writes snapshot values back into this entity.
    ///
    /// Child rows are restored positionally; callers only restore snapshots
    /// taken from the same entity with an unchanged child cardinality.
    fn restore(&mut self, snapshot: &Self::Snapshot);
}
