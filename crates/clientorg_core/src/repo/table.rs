//! Row mapping contract between an entity and its SQLite tables.

use super::RepoResult;
use crate::model::{Entity, EntityId};
use rusqlite::{Connection, Transaction};

/// SQL mapping used by [`super::SqliteRepository`].
///
/// Write methods run inside the repository's save transaction and may assign
/// storage-generated keys and versions on the entity; the repository rolls
/// those back if the transaction does not commit.
pub trait SqlTable: Entity + Sized {
    /// Reads one row and its declared associations.
    fn fetch(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>>;

    fn fetch_all(conn: &Connection) -> RepoResult<Vec<Self>>;

    /// Inserts a new row and owned children, assigning ids and `row_version`.
    fn insert(tx: &Transaction<'_>, entity: &mut Self) -> RepoResult<()>;

    /// Updates the row when storage still holds `expected_version`.
    ///
    /// Returns `false` without writing when the version check fails.
    fn update(tx: &Transaction<'_>, entity: &mut Self, expected_version: i64) -> RepoResult<bool>;

    /// Deletes the row when storage still holds `expected_version`.
    ///
    /// Returns `false` without writing when the version check fails.
    fn delete(tx: &Transaction<'_>, id: EntityId, expected_version: i64) -> RepoResult<bool>;
}
