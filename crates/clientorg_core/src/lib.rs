//! Core of the client organizer: tracked repositories, observable wrappers
//! and detail view models with optimistic-concurrency saves.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod dialog;
pub mod events;
pub mod logging;
pub mod model;
pub mod observable;
pub mod repo;
pub mod session;
pub mod view_model;
pub mod wrapper;

pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, SharedConnection};
pub use dialog::{MessageDialogResult, MessageDialogService};
pub use events::{
    AfterCollectionSaved, AfterDetailClosed, AfterDetailDeleted, AfterDetailSaved,
    EventAggregator,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::client::{Client, ClientPhoneNumber};
pub use model::company::Company;
pub use model::lookup::LookupItem;
pub use model::meeting::Meeting;
pub use model::{EntityId, Shared};
pub use repo::{ConcurrencyConflict, RepoError, RepoResult, Repository};
pub use session::Session;
pub use view_model::{
    ClientDetail, ClientDetailViewModel, DetailError, DetailState, DetailViewModel, SaveOutcome,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
