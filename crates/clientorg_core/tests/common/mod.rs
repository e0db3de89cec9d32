#![allow(dead_code)]

use async_trait::async_trait;
use clientorg_core::db::lock_conn;
use clientorg_core::repo::client_repo::{ClientRepository, SqliteClientRepository};
use clientorg_core::repo::ConflictEntry;
use clientorg_core::{
    Client, ClientPhoneNumber, ConcurrencyConflict, EntityId, MessageDialogResult,
    MessageDialogService, RepoResult, Repository, Shared, SharedConnection,
};
use rusqlite::params;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One dialog shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Info(String),
    OkCancel { message: String, title: String },
}

/// Dialog double answering Ok/Cancel questions from a script.
///
/// Unscripted questions are answered with `Ok`.
#[derive(Debug, Default)]
pub struct ScriptedDialogs {
    answers: Mutex<VecDeque<MessageDialogResult>>,
    shown: Mutex<Vec<Shown>>,
}

impl ScriptedDialogs {
    pub fn answering(answers: impl IntoIterator<Item = MessageDialogResult>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.shown()
            .into_iter()
            .filter_map(|shown| match shown {
                Shown::Info(message) => Some(message),
                Shown::OkCancel { .. } => None,
            })
            .collect()
    }

    pub fn questions(&self) -> Vec<String> {
        self.shown()
            .into_iter()
            .filter_map(|shown| match shown {
                Shown::OkCancel { message, .. } => Some(message),
                Shown::Info(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessageDialogService for ScriptedDialogs {
    async fn show_info(&self, message: &str) {
        self.shown
            .lock()
            .unwrap()
            .push(Shown::Info(message.to_string()));
    }

    async fn show_ok_cancel(&self, message: &str, title: &str) -> MessageDialogResult {
        self.shown.lock().unwrap().push(Shown::OkCancel {
            message: message.to_string(),
            title: title.to_string(),
        });
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MessageDialogResult::Ok)
    }
}

/// Client repository double over SQLite that counts calls and can fail a
/// number of saves with a stale-write conflict first.
pub struct CountingClients {
    inner: Arc<SqliteClientRepository>,
    adds: AtomicUsize,
    saves: AtomicUsize,
    conflicting_saves: AtomicUsize,
    conflict_id: EntityId,
}

impl CountingClients {
    pub fn new(inner: Arc<SqliteClientRepository>) -> Self {
        Self {
            inner,
            adds: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            conflicting_saves: AtomicUsize::new(0),
            conflict_id: 0,
        }
    }

    /// Makes the next `count` saves report a conflict on client `id`.
    pub fn conflicting(mut self, id: EntityId, count: usize) -> Self {
        self.conflict_id = id;
        self.conflicting_saves = AtomicUsize::new(count);
        self
    }

    pub fn adds(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository<Client> for CountingClients {
    async fn get_by_id(&self, id: EntityId) -> RepoResult<Shared<Client>> {
        self.inner.get_by_id(id).await
    }

    async fn get_all(&self) -> RepoResult<Vec<Shared<Client>>> {
        self.inner.get_all().await
    }

    fn add(&self, entity: Shared<Client>) {
        self.adds.fetch_add(1, Ordering::SeqCst);
        self.inner.add(entity);
    }

    fn remove(&self, entity: &Shared<Client>) {
        self.inner.remove(entity);
    }

    fn cancel_remove(&self, entity: &Shared<Client>) {
        self.inner.cancel_remove(entity);
    }

    async fn reload(&self, id: EntityId) -> RepoResult<()> {
        self.inner.reload(id).await
    }

    async fn refresh_original_values(&self, id: EntityId) -> RepoResult<()> {
        self.inner.refresh_original_values(id).await
    }

    async fn save(&self) -> RepoResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .conflicting_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if scripted {
            return Err(ConcurrencyConflict::single(ConflictEntry {
                entity_type: "Client",
                id: self.conflict_id,
                original_values: serde_json::json!({ "id": self.conflict_id }),
                database_values: Some(serde_json::json!({ "id": self.conflict_id })),
            })
            .into());
        }
        self.inner.save().await
    }

    fn has_changes(&self) -> bool {
        self.inner.has_changes()
    }
}

#[async_trait]
impl ClientRepository for CountingClients {
    async fn has_meetings(&self, client_id: EntityId) -> RepoResult<bool> {
        self.inner.has_meetings(client_id).await
    }

    fn remove_phone_number(&self, phone: &Shared<ClientPhoneNumber>) {
        self.inner.remove_phone_number(phone);
    }
}

pub fn insert_company(conn: &SharedConnection, name: &str) -> EntityId {
    let conn = lock_conn(conn);
    conn.execute(
        "INSERT INTO companies (name, row_version) VALUES (?1, 1);",
        [name],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_client(
    conn: &SharedConnection,
    first_name: &str,
    last_name: &str,
    phone_numbers: &[&str],
) -> EntityId {
    let conn = lock_conn(conn);
    conn.execute(
        "INSERT INTO clients (first_name, last_name, row_version) VALUES (?1, ?2, 1);",
        params![first_name, last_name],
    )
    .unwrap();
    let client_id = conn.last_insert_rowid();
    for number in phone_numbers {
        conn.execute(
            "INSERT INTO client_phone_numbers (client_id, number) VALUES (?1, ?2);",
            params![client_id, number],
        )
        .unwrap();
    }
    client_id
}

pub fn insert_meeting(conn: &SharedConnection, title: &str, client_ids: &[EntityId]) -> EntityId {
    let conn = lock_conn(conn);
    conn.execute(
        "INSERT INTO meetings (title, date_from, date_to, row_version) VALUES (?1, 0, 3600, 1);",
        [title],
    )
    .unwrap();
    let meeting_id = conn.last_insert_rowid();
    for client_id in client_ids {
        conn.execute(
            "INSERT INTO meeting_clients (meeting_id, client_id) VALUES (?1, ?2);",
            params![meeting_id, client_id],
        )
        .unwrap();
    }
    meeting_id
}

/// Simulates another writer editing a client row.
pub fn external_rename(conn: &SharedConnection, client_id: EntityId, first_name: &str) {
    lock_conn(conn)
        .execute(
            "UPDATE clients SET first_name = ?1, row_version = row_version + 1 WHERE id = ?2;",
            params![first_name, client_id],
        )
        .unwrap();
}

/// Simulates another writer deleting a client row.
pub fn external_delete(conn: &SharedConnection, client_id: EntityId) {
    lock_conn(conn)
        .execute("DELETE FROM clients WHERE id = ?1;", [client_id])
        .unwrap();
}

pub fn stored_first_name(conn: &SharedConnection, client_id: EntityId) -> Option<String> {
    use rusqlite::OptionalExtension;
    lock_conn(conn)
        .query_row(
            "SELECT first_name FROM clients WHERE id = ?1;",
            [client_id],
            |row| row.get(0),
        )
        .optional()
        .unwrap()
}

/// Simulates another writer deleting one phone number row.
pub fn external_phone_delete(conn: &SharedConnection, client_id: EntityId, number: &str) {
    lock_conn(conn)
        .execute(
            "DELETE FROM client_phone_numbers WHERE client_id = ?1 AND number = ?2;",
            params![client_id, number],
        )
        .unwrap();
}

pub fn phone_number_count(conn: &SharedConnection, client_id: EntityId) -> i64 {
    lock_conn(conn)
        .query_row(
            "SELECT COUNT(*) FROM client_phone_numbers WHERE client_id = ?1;",
            [client_id],
            |row| row.get(0),
        )
        .unwrap()
}
