//! Meeting repository contract and SQLite mapping.
//!
//! # Invariants
//! - Participants are stored in `meeting_clients` and read in
//!   `client_id ASC` order.
//! - Participant rows are replaced wholesale on every meeting write.

use super::{RepoResult, Repository, SqlTable, SqliteRepository};
use crate::db::lock_conn;
use crate::model::client::Client;
use crate::model::meeting::Meeting;
use crate::model::EntityId;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

const MEETING_SELECT_SQL: &str = "SELECT
    id,
    title,
    date_from,
    date_to,
    row_version
FROM meetings";

#[async_trait]
pub trait MeetingRepository: Repository<Meeting> {
    /// Reads every client as a participant candidate.
    ///
    /// The returned clients are detached copies; edit clients through a
    /// client repository.
    async fn get_all_clients(&self) -> RepoResult<Vec<Client>>;
}

pub type SqliteMeetingRepository = SqliteRepository<Meeting>;

#[async_trait]
impl MeetingRepository for SqliteRepository<Meeting> {
    async fn get_all_clients(&self) -> RepoResult<Vec<Client>> {
        let conn = lock_conn(self.connection());
        Client::fetch_all(&conn)
    }
}

impl SqlTable for Meeting {
    fn fetch(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        let meeting = conn
            .query_row(
                &format!("{MEETING_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_meeting_row,
            )
            .optional()?;

        match meeting {
            Some(mut meeting) => {
                meeting.client_ids = fetch_participants(conn, meeting.id)?;
                Ok(Some(meeting))
            }
            None => Ok(None),
        }
    }

    fn fetch_all(conn: &Connection) -> RepoResult<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("{MEETING_SELECT_SQL} ORDER BY date_from ASC, id ASC;"))?;
        let meetings = stmt
            .query_map([], parse_meeting_row)?
            .collect::<Result<Vec<_>, _>>()?;

        meetings
            .into_iter()
            .map(|mut meeting| {
                meeting.client_ids = fetch_participants(conn, meeting.id)?;
                Ok(meeting)
            })
            .collect()
    }

    fn insert(tx: &Transaction<'_>, entity: &mut Self) -> RepoResult<()> {
        tx.execute(
            "INSERT INTO meetings (title, date_from, date_to, row_version)
             VALUES (?1, ?2, ?3, 1);",
            params![entity.title.as_str(), entity.date_from, entity.date_to],
        )?;
        entity.id = tx.last_insert_rowid();
        entity.row_version = 1;
        replace_participants(tx, entity)
    }

    fn update(tx: &Transaction<'_>, entity: &mut Self, expected_version: i64) -> RepoResult<bool> {
        let changed = tx.execute(
            "UPDATE meetings
             SET
                title = ?1,
                date_from = ?2,
                date_to = ?3,
                row_version = row_version + 1
             WHERE id = ?4 AND row_version = ?5;",
            params![
                entity.title.as_str(),
                entity.date_from,
                entity.date_to,
                entity.id,
                expected_version,
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        entity.row_version = expected_version + 1;
        replace_participants(tx, entity)?;
        Ok(true)
    }

    fn delete(tx: &Transaction<'_>, id: EntityId, expected_version: i64) -> RepoResult<bool> {
        let changed = tx.execute(
            "DELETE FROM meetings WHERE id = ?1 AND row_version = ?2;",
            params![id, expected_version],
        )?;
        Ok(changed == 1)
    }
}

fn replace_participants(tx: &Transaction<'_>, meeting: &Meeting) -> RepoResult<()> {
    tx.execute(
        "DELETE FROM meeting_clients WHERE meeting_id = ?1;",
        [meeting.id],
    )?;
    for client_id in &meeting.client_ids {
        tx.execute(
            "INSERT INTO meeting_clients (meeting_id, client_id) VALUES (?1, ?2);",
            params![meeting.id, client_id],
        )?;
    }
    Ok(())
}

fn fetch_participants(conn: &Connection, meeting_id: EntityId) -> RepoResult<Vec<EntityId>> {
    let mut stmt = conn.prepare(
        "SELECT client_id FROM meeting_clients WHERE meeting_id = ?1 ORDER BY client_id ASC;",
    )?;
    let ids = stmt
        .query_map([meeting_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn parse_meeting_row(row: &Row<'_>) -> rusqlite::Result<Meeting> {
    Ok(Meeting {
        id: row.get("id")?,
        title: row.get("title")?,
        date_from: row.get("date_from")?,
        date_to: row.get("date_to")?,
        row_version: row.get("row_version")?,
        client_ids: Vec::new(),
    })
}
