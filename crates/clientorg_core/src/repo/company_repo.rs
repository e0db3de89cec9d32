//! Company SQLite mapping.
//!
//! Companies need no use cases beyond the generic repository.

use super::{RepoResult, SqlTable, SqliteRepository};
use crate::model::company::Company;
use crate::model::EntityId;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

pub type SqliteCompanyRepository = SqliteRepository<Company>;

impl SqlTable for Company {
    fn fetch(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        let company = conn
            .query_row(
                "SELECT id, name, row_version FROM companies WHERE id = ?1;",
                [id],
                parse_company_row,
            )
            .optional()?;
        Ok(company)
    }

    fn fetch_all(conn: &Connection) -> RepoResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT id, name, row_version FROM companies ORDER BY name ASC, id ASC;")?;
        let companies = stmt
            .query_map([], parse_company_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(companies)
    }

    fn insert(tx: &Transaction<'_>, entity: &mut Self) -> RepoResult<()> {
        tx.execute(
            "INSERT INTO companies (name, row_version) VALUES (?1, 1);",
            [entity.name.as_str()],
        )?;
        entity.id = tx.last_insert_rowid();
        entity.row_version = 1;
        Ok(())
    }

    fn update(tx: &Transaction<'_>, entity: &mut Self, expected_version: i64) -> RepoResult<bool> {
        let changed = tx.execute(
            "UPDATE companies
             SET name = ?1, row_version = row_version + 1
             WHERE id = ?2 AND row_version = ?3;",
            params![entity.name.as_str(), entity.id, expected_version],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        entity.row_version = expected_version + 1;
        Ok(true)
    }

    fn delete(tx: &Transaction<'_>, id: EntityId, expected_version: i64) -> RepoResult<bool> {
        let changed = tx.execute(
            "DELETE FROM companies WHERE id = ?1 AND row_version = ?2;",
            params![id, expected_version],
        )?;
        Ok(changed == 1)
    }
}

fn parse_company_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get("id")?,
        name: row.get("name")?,
        row_version: row.get("row_version")?,
    })
}
