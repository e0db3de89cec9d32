//! Lookup data service for selection lists.
//!
//! # Responsibility
//! - Read lightweight (id, label) pairs without tracking entities.
//!
//! # Invariants
//! - Results never contain the synthetic null item; callers prepend it.
//! - Company lookup is sorted by name, client lookup by last then first name.

use super::RepoResult;
use crate::db::{lock_conn, SharedConnection};
use crate::model::lookup::LookupItem;
use async_trait::async_trait;

#[async_trait]
pub trait LookupDataService: Send + Sync {
    async fn company_lookup(&self) -> RepoResult<Vec<LookupItem>>;

    async fn client_lookup(&self) -> RepoResult<Vec<LookupItem>>;
}

/// SQLite-backed lookup reads sharing the session connection.
pub struct SqliteLookupDataService {
    conn: SharedConnection,
}

impl SqliteLookupDataService {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str) -> RepoResult<Vec<LookupItem>> {
        let conn = lock_conn(&self.conn);
        let mut stmt = conn.prepare(sql)?;
        let items = stmt
            .query_map([], |row| {
                Ok(LookupItem::new(
                    row.get(0)?,
                    row.get::<_, String>(1)?.trim_end().to_string(),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

#[async_trait]
impl LookupDataService for SqliteLookupDataService {
    async fn company_lookup(&self) -> RepoResult<Vec<LookupItem>> {
        self.query("SELECT id, name FROM companies ORDER BY name ASC, id ASC;")
    }

    async fn client_lookup(&self) -> RepoResult<Vec<LookupItem>> {
        self.query(
            "SELECT id, first_name || ' ' || COALESCE(last_name, '')
             FROM clients
             ORDER BY COALESCE(last_name, '') ASC, first_name ASC, id ASC;",
        )
    }
}
