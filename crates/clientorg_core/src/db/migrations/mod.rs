//! Schema migrations tracked in `PRAGMA user_version`.
//!
//! # Invariants
//! - Versions start at 1 and increase by exactly one per migration.
//! - All pending migrations of one open run in a single transaction; the
//!   stored version only moves forward when every step succeeded.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "clients",
        sql: include_str!("0001_clients.sql"),
    },
    Migration {
        version: 2,
        name: "meetings",
        sql: include_str!("0002_meetings.sql"),
    },
];

/// Newest schema version this build understands.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the schema up to [`latest_version`].
///
/// Returns how many migrations were applied.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let from = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let to = latest_version();
    if from > to {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: to,
        });
    }

    let pending = pending(from);
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for migration in pending {
        tx.execute_batch(migration.sql)?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.pragma_update(None, "user_version", to)?;
    tx.commit()?;

    info!("event=db_migrate module=db status=done from={from} to={to}");
    Ok(pending.len())
}

fn pending(current: u32) -> &'static [Migration] {
    let start = MIGRATIONS
        .iter()
        .position(|migration| migration.version > current)
        .unwrap_or(MIGRATIONS.len());
    &MIGRATIONS[start..]
}
