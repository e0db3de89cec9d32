//! Session wiring: one connection and one notification hub per session.
//!
//! Every repository or view model created from the same session shares the
//! connection and sees the same notifications. Each repository has its own
//! change tracker.

use crate::config::AppConfig;
use crate::db::{into_shared, open_db, open_db_in_memory, DbResult, SharedConnection};
use crate::dialog::MessageDialogService;
use crate::events::EventAggregator;
use crate::repo::client_repo::SqliteClientRepository;
use crate::repo::company_repo::SqliteCompanyRepository;
use crate::repo::lookup_repo::SqliteLookupDataService;
use crate::repo::meeting_repo::SqliteMeetingRepository;
use crate::view_model::ClientDetailViewModel;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Session {
    conn: SharedConnection,
    events: EventAggregator,
}

impl Session {
    /// Opens the configured database, or an in-memory one when no path is set.
    pub fn open(config: &AppConfig) -> DbResult<Self> {
        let conn = match &config.database_path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        Ok(Self {
            conn: into_shared(conn),
            events: EventAggregator::new(config.notification_capacity),
        })
    }

    pub fn in_memory() -> DbResult<Self> {
        Self::open(&AppConfig::default())
    }

    pub fn connection(&self) -> &SharedConnection {
        &self.conn
    }

    pub fn events(&self) -> &EventAggregator {
        &self.events
    }

    pub fn client_repository(&self) -> Arc<SqliteClientRepository> {
        Arc::new(SqliteClientRepository::new(Arc::clone(&self.conn)))
    }

    pub fn company_repository(&self) -> Arc<SqliteCompanyRepository> {
        Arc::new(SqliteCompanyRepository::new(Arc::clone(&self.conn)))
    }

    pub fn meeting_repository(&self) -> Arc<SqliteMeetingRepository> {
        Arc::new(SqliteMeetingRepository::new(Arc::clone(&self.conn)))
    }

    pub fn lookups(&self) -> Arc<SqliteLookupDataService> {
        Arc::new(SqliteLookupDataService::new(Arc::clone(&self.conn)))
    }

    /// Creates a client detail view model with a fresh client repository.
    pub fn client_detail(&self, dialogs: Arc<dyn MessageDialogService>) -> ClientDetailViewModel {
        ClientDetailViewModel::for_client(
            self.client_repository(),
            self.lookups(),
            self.events.clone(),
            dialogs,
        )
    }
}
