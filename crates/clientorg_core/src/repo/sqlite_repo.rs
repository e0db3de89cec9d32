//! Generic SQLite repository with change tracking and optimistic concurrency.
//!
//! # Responsibility
//! - Implement [`Repository`] once for every [`SqlTable`] entity.
//! - Flush staged work in one immediate transaction.
//! - Turn a failed `row_version` guard into a [`ConcurrencyConflict`] that
//!   carries both the original and the current database values.
//!
//! # Invariants
//! - Lock order is tracker first, connection second.
//! - A failed save leaves storage untouched and restores in-memory keys and
//!   versions assigned during the attempt.

use super::tracker::{ChangeTracker, EntryState, TrackedEntry};
use super::{ConcurrencyConflict, ConflictEntry, RepoError, RepoResult, Repository, SqlTable};
use crate::db::{lock_conn, SharedConnection};
use crate::model::{lock, Entity, EntityId, RowVersioned, Shared};
use async_trait::async_trait;
use log::{debug, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Tracked repository over one entity type sharing the session connection.
pub struct SqliteRepository<T: SqlTable> {
    conn: SharedConnection,
    tracker: Mutex<ChangeTracker<T>>,
}

impl<T: SqlTable> SqliteRepository<T> {
    pub fn new(conn: SharedConnection) -> Self {
        Self {
            conn,
            tracker: Mutex::new(ChangeTracker::new()),
        }
    }

    pub(crate) fn connection(&self) -> &SharedConnection {
        &self.conn
    }

    pub(crate) fn tracker(&self) -> MutexGuard<'_, ChangeTracker<T>> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the staged state of a handle, if tracked by this repository.
    pub fn entry_state(&self, entity: &Shared<T>) -> Option<EntryState> {
        self.tracker().state_of(entity)
    }

    fn flush(conn: &Connection, tracker: &ChangeTracker<T>) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

        for removal in tracker.child_removals() {
            tx.execute(
                &format!("DELETE FROM {} WHERE id = ?1;", removal.table),
                [removal.id],
            )?;
        }

        for entry in tracker.entries() {
            match entry.state {
                EntryState::Added => {
                    let mut entity = lock(&entry.entity);
                    T::insert(&tx, &mut entity).map_err(|err| err.into_write_error(T::TYPE))?;
                }
                EntryState::Deleted => {
                    let id = lock(&entry.entity).row_id();
                    let deleted = T::delete(&tx, id, entry.expected_version())
                        .map_err(|err| err.into_write_error(T::TYPE))?;
                    if !deleted {
                        return Err(Self::conflict(&tx, entry)?.into());
                    }
                }
                EntryState::Unchanged if entry.is_modified() => {
                    let expected = entry.expected_version();
                    let updated = {
                        let mut entity = lock(&entry.entity);
                        T::update(&tx, &mut entity, expected)
                            .map_err(|err| err.into_write_error(T::TYPE))?
                    };
                    if !updated {
                        return Err(Self::conflict(&tx, entry)?.into());
                    }
                }
                EntryState::Unchanged => {}
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn conflict(conn: &Connection, entry: &TrackedEntry<T>) -> RepoResult<ConcurrencyConflict> {
        let current = lock(&entry.entity).snapshot();
        let id = current.row_id();
        let original = entry.original.clone().unwrap_or(current);
        let database_values = T::fetch(conn, id)?
            .map(|row| serde_json::to_value(row.snapshot()))
            .transpose()?;

        Ok(ConcurrencyConflict::single(ConflictEntry {
            entity_type: T::TYPE,
            id,
            original_values: serde_json::to_value(original)?,
            database_values,
        }))
    }
}

#[async_trait]
impl<T: SqlTable> Repository<T> for SqliteRepository<T> {
    async fn get_by_id(&self, id: EntityId) -> RepoResult<Shared<T>> {
        let mut tracker = self.tracker();
        if let Some(tracked) = tracker.find(id) {
            return Ok(tracked);
        }

        let fetched = {
            let conn = lock_conn(&self.conn);
            T::fetch(&conn, id)?
        };
        match fetched {
            Some(entity) => Ok(tracker.attach(entity)),
            None => Err(RepoError::not_found(T::TYPE, id)),
        }
    }

    async fn get_all(&self) -> RepoResult<Vec<Shared<T>>> {
        let mut tracker = self.tracker();
        let rows = {
            let conn = lock_conn(&self.conn);
            T::fetch_all(&conn)?
        };

        Ok(rows
            .into_iter()
            .map(|row| match tracker.find(row.row_id()) {
                Some(tracked) => tracked,
                None => tracker.attach(row),
            })
            .collect())
    }

    fn add(&self, entity: Shared<T>) {
        debug!("event=repo_add module=repo entity={}", T::TYPE);
        self.tracker().stage_added(entity);
    }

    fn remove(&self, entity: &Shared<T>) {
        debug!(
            "event=repo_remove module=repo entity={} id={}",
            T::TYPE,
            lock(entity).row_id()
        );
        self.tracker().stage_removed(entity);
    }

    fn cancel_remove(&self, entity: &Shared<T>) {
        if self.tracker().unstage_removed(entity) {
            debug!(
                "event=repo_remove module=repo status=cancelled entity={} id={}",
                T::TYPE,
                lock(entity).row_id()
            );
        }
    }

    async fn reload(&self, id: EntityId) -> RepoResult<()> {
        let mut tracker = self.tracker();
        if !tracker.is_tracked(id) {
            debug!(
                "event=repo_reload module=repo status=skipped entity={} id={id} reason=not_tracked",
                T::TYPE
            );
            return Ok(());
        }

        let fresh = {
            let conn = lock_conn(&self.conn);
            T::fetch(&conn, id)?
        };
        let status = if fresh.is_some() { "ok" } else { "detached" };
        tracker.reload(id, fresh);
        info!(
            "event=repo_reload module=repo status={status} entity={} id={id}",
            T::TYPE
        );
        Ok(())
    }

    async fn refresh_original_values(&self, id: EntityId) -> RepoResult<()> {
        let mut tracker = self.tracker();
        let database = {
            let conn = lock_conn(&self.conn);
            T::fetch(&conn, id)?
        }
        .ok_or_else(|| RepoError::not_found(T::TYPE, id))?;

        if !tracker.replace_original(id, database.snapshot()) {
            return Err(RepoError::not_found(T::TYPE, id));
        }
        info!(
            "event=repo_refresh_original module=repo status=ok entity={} id={id} row_version={}",
            T::TYPE,
            database.row_version()
        );
        Ok(())
    }

    async fn save(&self) -> RepoResult<()> {
        let started_at = Instant::now();
        let mut tracker = self.tracker();
        if !tracker.has_changes() {
            debug!(
                "event=repo_save module=repo status=skipped entity={} reason=no_changes",
                T::TYPE
            );
            return Ok(());
        }

        let before = tracker.current_snapshots();
        let result = {
            let conn = lock_conn(&self.conn);
            Self::flush(&conn, &tracker)
        };

        match result {
            Ok(()) => {
                tracker.accept_changes();
                info!(
                    "event=repo_save module=repo status=ok entity={} duration_ms={}",
                    T::TYPE,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                tracker.restore_current(&before);
                let error_code = match &err {
                    RepoError::ConcurrencyConflict(_) => "concurrency_conflict",
                    RepoError::Validation { .. } => "validation",
                    _ => "save_failed",
                };
                warn!(
                    "event=repo_save module=repo status=error entity={} duration_ms={} error_code={error_code} error={err}",
                    T::TYPE,
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn has_changes(&self) -> bool {
        self.tracker().has_changes()
    }
}
