//! Client repository contract and SQLite mapping.
//!
//! # Responsibility
//! - Map `Client` and its owned phone numbers to `clients` /
//!   `client_phone_numbers`.
//! - Answer the meeting-participation check used by the delete guard.
//!
//! # Invariants
//! - Phone numbers are read in `id ASC` order.
//! - Removing a phone number from the client collection alone does not delete
//!   the row; the removal must be staged via `remove_phone_number`.
//! - Every client write bumps `row_version` by one.
//! - A client update whose persisted phone row was deleted elsewhere is a
//!   concurrency conflict, not a silent skip.

use super::{ChildRemoval, RepoResult, Repository, SqlTable, SqliteRepository};
use crate::db::lock_conn;
use crate::model::client::{Client, ClientPhoneNumber};
use crate::model::{lock, shared, EntityId, Shared};
use async_trait::async_trait;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

const CLIENT_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    email,
    company_id,
    row_version
FROM clients";

pub(crate) const PHONE_NUMBER_TABLE: &str = "client_phone_numbers";

/// Client persistence with the client-specific use cases.
#[async_trait]
pub trait ClientRepository: Repository<Client> {
    /// Returns whether the client participates in at least one meeting.
    async fn has_meetings(&self, client_id: EntityId) -> RepoResult<bool>;

    /// Stages a persisted phone number row for deletion on the next save.
    fn remove_phone_number(&self, phone: &Shared<ClientPhoneNumber>);
}

/// SQLite-backed client repository.
pub type SqliteClientRepository = SqliteRepository<Client>;

#[async_trait]
impl ClientRepository for SqliteRepository<Client> {
    async fn has_meetings(&self, client_id: EntityId) -> RepoResult<bool> {
        let conn = lock_conn(self.connection());
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM meeting_clients WHERE client_id = ?1);",
            [client_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn remove_phone_number(&self, phone: &Shared<ClientPhoneNumber>) {
        let (id, owner_id) = {
            let phone = lock(phone);
            (phone.id, phone.client_id)
        };
        debug!("event=repo_remove_child module=repo entity=ClientPhoneNumber id={id}");
        self.tracker().stage_child_removal(ChildRemoval {
            table: PHONE_NUMBER_TABLE,
            id,
            owner_id,
        });
    }
}

impl SqlTable for Client {
    fn fetch(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        let client = conn
            .query_row(
                &format!("{CLIENT_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_client_row,
            )
            .optional()?;

        match client {
            Some(mut client) => {
                client.phone_numbers = fetch_phone_numbers(conn, client.id)?;
                Ok(Some(client))
            }
            None => Ok(None),
        }
    }

    fn fetch_all(conn: &Connection) -> RepoResult<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("{CLIENT_SELECT_SQL} ORDER BY id ASC;"))?;
        let clients = stmt
            .query_map([], parse_client_row)?
            .collect::<Result<Vec<_>, _>>()?;

        clients
            .into_iter()
            .map(|mut client| {
                client.phone_numbers = fetch_phone_numbers(conn, client.id)?;
                Ok(client)
            })
            .collect()
    }

    fn insert(tx: &Transaction<'_>, entity: &mut Self) -> RepoResult<()> {
        tx.execute(
            "INSERT INTO clients (first_name, last_name, email, company_id, row_version)
             VALUES (?1, ?2, ?3, ?4, 1);",
            params![
                entity.first_name.as_str(),
                entity.last_name.as_deref(),
                entity.email.as_deref(),
                entity.company_id,
            ],
        )?;
        entity.id = tx.last_insert_rowid();
        entity.row_version = 1;
        write_phone_numbers(tx, entity)
    }

    fn update(tx: &Transaction<'_>, entity: &mut Self, expected_version: i64) -> RepoResult<bool> {
        if !phone_rows_present(tx, entity)? {
            return Ok(false);
        }
        let changed = tx.execute(
            "UPDATE clients
             SET
                first_name = ?1,
                last_name = ?2,
                email = ?3,
                company_id = ?4,
                row_version = row_version + 1
             WHERE id = ?5 AND row_version = ?6;",
            params![
                entity.first_name.as_str(),
                entity.last_name.as_deref(),
                entity.email.as_deref(),
                entity.company_id,
                entity.id,
                expected_version,
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        entity.row_version = expected_version + 1;
        write_phone_numbers(tx, entity)?;
        Ok(true)
    }

    fn delete(tx: &Transaction<'_>, id: EntityId, expected_version: i64) -> RepoResult<bool> {
        let changed = tx.execute(
            "DELETE FROM clients WHERE id = ?1 AND row_version = ?2;",
            params![id, expected_version],
        )?;
        Ok(changed == 1)
    }
}

/// Inserts new phone numbers and updates existing ones.
fn write_phone_numbers(tx: &Transaction<'_>, client: &Client) -> RepoResult<()> {
    for handle in &client.phone_numbers {
        let mut phone = lock(handle);
        if phone.id == 0 {
            tx.execute(
                "INSERT INTO client_phone_numbers (client_id, number) VALUES (?1, ?2);",
                params![client.id, phone.number.as_str()],
            )?;
            phone.id = tx.last_insert_rowid();
            phone.client_id = client.id;
            continue;
        }

        tx.execute(
            "UPDATE client_phone_numbers SET number = ?1 WHERE id = ?2 AND client_id = ?3;",
            params![phone.number.as_str(), phone.id, client.id],
        )?;
    }
    Ok(())
}

/// Checks that every persisted phone number of `client` still has its row.
///
/// A row deleted by another writer makes the whole client write stale.
fn phone_rows_present(tx: &Transaction<'_>, client: &Client) -> RepoResult<bool> {
    let mut stmt = tx.prepare_cached(
        "SELECT EXISTS(SELECT 1 FROM client_phone_numbers WHERE id = ?1 AND client_id = ?2);",
    )?;
    for handle in &client.phone_numbers {
        let id = lock(handle).id;
        if id == 0 {
            continue;
        }
        let exists: i64 = stmt.query_row(params![id, client.id], |row| row.get(0))?;
        if exists == 0 {
            warn!(
                "event=repo_write_child module=repo status=conflict entity=ClientPhoneNumber id={id} reason=row_missing"
            );
            return Ok(false);
        }
    }
    Ok(true)
}

fn fetch_phone_numbers(
    conn: &Connection,
    client_id: EntityId,
) -> RepoResult<Vec<Shared<ClientPhoneNumber>>> {
    let mut stmt = conn.prepare(
        "SELECT id, client_id, number
         FROM client_phone_numbers
         WHERE client_id = ?1
         ORDER BY id ASC;",
    )?;
    let phones = stmt
        .query_map([client_id], |row| {
            Ok(ClientPhoneNumber {
                id: row.get("id")?,
                client_id: row.get("client_id")?,
                number: row.get("number")?,
            })
        })?
        .map(|phone| phone.map(shared))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(phones)
}

fn parse_client_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        email: row.get("email")?,
        company_id: row.get("company_id")?,
        row_version: row.get("row_version")?,
        phone_numbers: Vec::new(),
    })
}
