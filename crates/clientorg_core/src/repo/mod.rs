//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Translate detail-view use cases (get, list, add, remove, reload, save)
//!   into SQLite calls.
//! - Track in-memory edits per repository and report unsaved changes.
//! - Detect stale writes with `row_version` and report them as
//!   [`ConcurrencyConflict`] instead of silently overwriting.
//!
//! # Invariants
//! - `add`/`remove` only stage work; every write happens inside `save`.
//! - `save` is atomic: on failure nothing is written and in-memory keys and
//!   versions are back to their pre-save values.
//! - `has_changes` is computed from the tracker on every call.

use crate::db::DbError;
use crate::model::{EntityId, Shared};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod client_repo;
pub mod company_repo;
pub mod lookup_repo;
pub mod meeting_repo;
mod sqlite_repo;
mod table;
mod tracker;

pub use sqlite_repo::SqliteRepository;
pub use table::SqlTable;
pub use tracker::{ChangeTracker, ChildRemoval, EntryState};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for tracked persistence operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: EntityId,
    },
    #[error(transparent)]
    ConcurrencyConflict(#[from] ConcurrencyConflict),
    /// The store rejected a constraint (check, not-null, foreign key).
    #[error("{entity_type} rejected by store: {message}")]
    Validation {
        entity_type: &'static str,
        message: String,
    },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("snapshot serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl RepoError {
    pub fn not_found(entity_type: &'static str, id: EntityId) -> Self {
        Self::NotFound { entity_type, id }
    }

    /// Reclassifies constraint violations raised while writing `entity_type`.
    pub(crate) fn into_write_error(self, entity_type: &'static str) -> Self {
        match self {
            Self::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, message)))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Validation {
                    entity_type,
                    message: message.unwrap_or_else(|| failure.to_string()),
                }
            }
            other => other,
        }
    }
}

/// One stale row detected while saving.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictEntry {
    pub entity_type: &'static str,
    pub id: EntityId,
    /// Values the write was based on.
    pub original_values: Value,
    /// Current row in storage; `None` when another writer deleted it.
    pub database_values: Option<Value>,
}

/// Stale-write failure raised by `save`.
///
/// Storage rejects the first stale row it meets, so `entries` holds exactly
/// one element when produced by [`SqliteRepository`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} was changed by another writer", describe(.entries))]
pub struct ConcurrencyConflict {
    pub entries: Vec<ConflictEntry>,
}

impl ConcurrencyConflict {
    pub fn single(entry: ConflictEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }

    /// Returns `true` when a conflicting row no longer exists in storage.
    pub fn is_deleted_in_store(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.database_values.is_none())
    }
}

fn describe(entries: &[ConflictEntry]) -> String {
    match entries {
        [entry] => format!("{} {}", entry.entity_type, entry.id),
        _ => format!("{} rows", entries.len()),
    }
}

/// Generic tracked repository over one entity type.
///
/// Handles returned by `get_by_id`/`get_all` are the tracked instances:
/// loading an id that is already tracked returns the same handle.
#[async_trait]
pub trait Repository<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Loads one entity with its declared associations.
    ///
    /// # Errors
    /// - `NotFound` when no row matches `id`.
    async fn get_by_id(&self, id: EntityId) -> RepoResult<Shared<T>>;

    async fn get_all(&self) -> RepoResult<Vec<Shared<T>>>;

    /// Stages a new entity for insertion on the next `save`.
    fn add(&self, entity: Shared<T>);

    /// Stages an entity for deletion on the next `save`.
    fn remove(&self, entity: &Shared<T>);

    /// Takes back a deletion staged by `remove`, e.g. after its `save` failed.
    fn cancel_remove(&self, entity: &Shared<T>);

    /// Discards in-memory edits of a tracked entity and re-reads it.
    ///
    /// No-op when `id` is not tracked.
    async fn reload(&self, id: EntityId) -> RepoResult<()>;

    /// Replaces the tracked original values of `id` with the current
    /// database values so the next `save` overwrites them.
    async fn refresh_original_values(&self, id: EntityId) -> RepoResult<()>;

    /// Flushes all staged work in one transaction.
    ///
    /// # Errors
    /// - `ConcurrencyConflict` when a row changed since it was loaded.
    /// - `Validation` when the store rejects a constraint.
    async fn save(&self) -> RepoResult<()>;

    fn has_changes(&self) -> bool;
}
