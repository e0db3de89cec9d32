//! Generic detail lifecycle with optimistic-concurrency save.
//!
//! # Responsibility
//! - Drive load, save, delete and close of one entity through a
//!   [`DetailBehavior`].
//! - Resolve stale-write conflicts with the user: overwrite or reload.
//! - Publish saved, deleted and closed notifications.
//!
//! # Invariants
//! - `save` runs only when [`DetailViewModel::save_enabled`] holds and keeps
//!   `is_saving` set for its whole duration.
//! - A successful save publishes exactly one `AfterDetailSaved`.
//! - A conflict is retried at most once, and only after the user chose
//!   overwrite.
//! - Once the entity is known to be deleted, no further save is attempted.

use crate::dialog::{MessageDialogResult, MessageDialogService};
use crate::events::{AfterDetailClosed, AfterDetailDeleted, AfterDetailSaved, EventAggregator};
use crate::model::EntityId;
use crate::observable::{ListenerId, PropertyChanged, PropertyNotifier};
use crate::repo::{ConcurrencyConflict, RepoError, RepoResult};
use async_trait::async_trait;
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

pub const HAS_CHANGES: &str = "has_changes";
pub const TITLE: &str = "title";
pub const SAVE_CAN_EXECUTE: &str = "save_can_execute";

const QUESTION_TITLE: &str = "Question";
const DELETED_BY_OTHER_MESSAGE: &str = "The entity has been deleted by another user";
const CONFLICT_MESSAGE: &str = "The entity has been changed in the meantime by someone else. \
Click OK to save your changes anyway, click Cancel to reload the entity from the database.";
const CLOSE_WITH_CHANGES_MESSAGE: &str = "You've made changes. Close this item?";

pub type DetailResult<T> = Result<T, DetailError>;

#[derive(Debug, Error)]
pub enum DetailError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("detail view has no loaded entity")]
    NotLoaded,
}

/// Lifecycle state of a detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailState {
    Unloaded,
    Loading,
    Loaded,
    Saving,
    ConflictDetected,
    Deleting,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Save was not enabled; nothing happened.
    NotExecuted,
    Saved { id: EntityId },
    /// Another writer deleted the entity.
    DeletedInStore,
    /// The user discarded local edits in favor of the stored values.
    Reloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// A dependent record prevents deletion.
    Blocked,
    Cancelled,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Cancelled,
    Closed,
}

#[derive(Debug, Default)]
struct StatusState {
    has_changes: bool,
    saving: bool,
    title: String,
}

/// Observable status shared between a detail view model and the listeners
/// its behavior attaches to wrappers.
///
/// Clones share state and listeners.
#[derive(Debug, Clone, Default)]
pub struct DetailStatus {
    state: Arc<Mutex<StatusState>>,
    notifier: PropertyNotifier,
}

impl DetailStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_changes(&self) -> bool {
        self.state().has_changes
    }

    /// Updates the dirty flag; a change raises `has_changes` and
    /// `save_can_execute`.
    pub fn set_has_changes(&self, value: bool) {
        {
            let mut state = self.state();
            if state.has_changes == value {
                return;
            }
            state.has_changes = value;
        }
        self.notifier.notify(HAS_CHANGES);
        self.raise_save_can_execute();
    }

    pub fn is_saving(&self) -> bool {
        self.state().saving
    }

    fn set_saving(&self, value: bool) {
        self.state().saving = value;
        self.raise_save_can_execute();
    }

    pub fn title(&self) -> String {
        self.state().title.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.state().title = title.into();
        self.notifier.notify(TITLE);
    }

    pub fn raise_save_can_execute(&self) {
        self.notifier.notify(SAVE_CAN_EXECUTE);
    }

    /// Raises a behavior-specific property, e.g. a refreshed lookup.
    pub fn raise_property_changed(&self, property: &'static str) {
        self.notifier.notify(property);
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&PropertyChanged) + Send + Sync + 'static,
    ) -> ListenerId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    fn state(&self) -> MutexGuard<'_, StatusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Entity-specific half of a detail view.
///
/// Implementations own the repository and wrappers; the lifecycle in
/// [`DetailViewModel`] decides when each hook runs.
#[async_trait]
pub trait DetailBehavior: Send + Sync {
    /// Name carried by published notifications.
    fn view_model_name(&self) -> &'static str;

    /// Human name of the entity kind, e.g. `Client`.
    fn entity_kind(&self) -> &'static str;

    /// Loads `id`, or creates and stages a new entity when `id <= 0`.
    async fn load(&mut self, id: EntityId) -> RepoResult<()>;

    /// Returns `true` when no wrapper reports a validation error.
    fn can_save(&self) -> bool;

    async fn try_save(&self) -> RepoResult<()>;

    /// Unsaved work according to the repository.
    fn has_changes(&self) -> bool;

    /// Key of the loaded entity; `0` before its first save.
    fn entity_id(&self) -> EntityId;

    /// Label published with `AfterDetailSaved`.
    fn display_label(&self) -> String;

    /// Adopts the database values as the base of the next write.
    async fn accept_database_values(&self, conflict: &ConcurrencyConflict) -> RepoResult<()>;

    /// Discards local edits of the conflicting entities.
    async fn discard_changes(&self, conflict: &ConcurrencyConflict) -> RepoResult<()>;

    /// Returns a message when a dependent record forbids deletion.
    async fn deletion_veto(&self) -> RepoResult<Option<String>>;

    /// Stages removal of the entity and saves.
    ///
    /// On error the staged removal is taken back, leaving the entity
    /// editable and saveable as before.
    async fn try_delete(&self) -> RepoResult<()>;
}

/// Detail lifecycle over one behavior.
pub struct DetailViewModel<B> {
    behavior: B,
    status: DetailStatus,
    events: EventAggregator,
    dialogs: Arc<dyn MessageDialogService>,
    state: DetailState,
    id: EntityId,
}

impl<B: DetailBehavior> DetailViewModel<B> {
    /// `status` must be the instance the behavior reports into.
    pub fn new(
        behavior: B,
        status: DetailStatus,
        events: EventAggregator,
        dialogs: Arc<dyn MessageDialogService>,
    ) -> Self {
        Self {
            behavior,
            status,
            events,
            dialogs,
            state: DetailState::Unloaded,
            id: 0,
        }
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    pub fn status(&self) -> &DetailStatus {
        &self.status
    }

    pub fn state(&self) -> DetailState {
        self.state
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn has_changes(&self) -> bool {
        self.status.has_changes()
    }

    pub fn title(&self) -> String {
        self.status.title()
    }

    /// Loads an existing entity (`id > 0`) or starts a new one.
    ///
    /// # Errors
    /// - `Repo(NotFound)` when `id` does not exist.
    pub async fn load(&mut self, id: EntityId) -> DetailResult<()> {
        let previous = self.state;
        self.state = DetailState::Loading;
        if let Err(err) = self.behavior.load(id).await {
            self.state = previous;
            warn!(
                "event=detail_load module=view_model status=error view_model={} id={id} error={err}",
                self.behavior.view_model_name()
            );
            return Err(err.into());
        }

        self.id = id;
        self.state = DetailState::Loaded;
        self.status.set_has_changes(self.behavior.has_changes());
        self.status.raise_save_can_execute();
        info!(
            "event=detail_load module=view_model status=ok view_model={} id={id}",
            self.behavior.view_model_name()
        );
        Ok(())
    }

    pub fn save_enabled(&self) -> bool {
        self.state == DetailState::Loaded
            && !self.status.is_saving()
            && self.behavior.can_save()
            && self.status.has_changes()
    }

    /// Saves pending edits, resolving a stale write with the user.
    ///
    /// # Errors
    /// - The store rejected the write, or the single overwrite retry failed.
    ///   The user has already been informed.
    pub async fn save(&mut self) -> DetailResult<SaveOutcome> {
        if !self.save_enabled() {
            return Ok(SaveOutcome::NotExecuted);
        }

        self.status.set_saving(true);
        self.state = DetailState::Saving;
        let result = match self.behavior.try_save().await {
            Ok(()) => Ok(self.after_save()),
            Err(RepoError::ConcurrencyConflict(conflict)) => self.resolve_conflict(conflict).await,
            Err(err) => self.fail(err, "save", "saved").await,
        };
        self.status.set_saving(false);
        result
    }

    /// Deletes the entity after the dependency check and a confirmation.
    pub async fn delete(&mut self) -> DetailResult<DeleteOutcome> {
        if self.state != DetailState::Loaded {
            return Err(DetailError::NotLoaded);
        }

        if let Some(message) = self.behavior.deletion_veto().await? {
            info!(
                "event=detail_delete module=view_model status=blocked view_model={} id={}",
                self.behavior.view_model_name(),
                self.id
            );
            self.dialogs.show_info(&message).await;
            return Ok(DeleteOutcome::Blocked);
        }

        let question = format!(
            "Do you really want to delete the {}?",
            self.behavior.entity_kind()
        );
        if self.dialogs.show_ok_cancel(&question, QUESTION_TITLE).await
            == MessageDialogResult::Cancel
        {
            return Ok(DeleteOutcome::Cancelled);
        }

        self.state = DetailState::Deleting;
        let id = self.behavior.entity_id();
        if let Err(err) = self.behavior.try_delete().await {
            return self.fail(err, "delete", "deleted").await;
        }

        self.mark_deleted(id);
        info!(
            "event=detail_delete module=view_model status=ok view_model={} id={id}",
            self.behavior.view_model_name()
        );
        Ok(DeleteOutcome::Deleted)
    }

    /// Closes the view, asking first when there are unsaved edits.
    pub async fn close_detail_view(&mut self) -> CloseOutcome {
        if self.status.has_changes()
            && self
                .dialogs
                .show_ok_cancel(CLOSE_WITH_CHANGES_MESSAGE, QUESTION_TITLE)
                .await
                == MessageDialogResult::Cancel
        {
            return CloseOutcome::Cancelled;
        }

        self.events.publish(AfterDetailClosed {
            id: self.id,
            view_model_name: self.behavior.view_model_name(),
        });
        CloseOutcome::Closed
    }

    async fn resolve_conflict(&mut self, conflict: ConcurrencyConflict) -> DetailResult<SaveOutcome> {
        self.state = DetailState::ConflictDetected;
        let name = self.behavior.view_model_name();

        if conflict.is_deleted_in_store() {
            info!(
                "event=detail_save module=view_model status=deleted_in_store view_model={name} id={}",
                self.id
            );
            self.dialogs.show_info(DELETED_BY_OTHER_MESSAGE).await;
            self.mark_deleted(self.id);
            return Ok(SaveOutcome::DeletedInStore);
        }

        match self
            .dialogs
            .show_ok_cancel(CONFLICT_MESSAGE, QUESTION_TITLE)
            .await
        {
            MessageDialogResult::Ok => {
                info!(
                    "event=detail_save module=view_model status=overwrite view_model={name} id={}",
                    self.id
                );
                if let Err(err) = self.behavior.accept_database_values(&conflict).await {
                    return self.fail(err, "save", "saved").await;
                }
                match self.behavior.try_save().await {
                    Ok(()) => Ok(self.after_save()),
                    Err(err) => self.fail(err, "save", "saved").await,
                }
            }
            MessageDialogResult::Cancel => {
                info!(
                    "event=detail_save module=view_model status=reload view_model={name} id={}",
                    self.id
                );
                if let Err(err) = self.behavior.discard_changes(&conflict).await {
                    return self.fail(err, "save", "saved").await;
                }
                self.state = DetailState::Loaded;
                self.load(self.id).await?;
                Ok(SaveOutcome::Reloaded)
            }
        }
    }

    fn after_save(&mut self) -> SaveOutcome {
        self.id = self.behavior.entity_id();
        self.state = DetailState::Loaded;
        self.status.set_has_changes(self.behavior.has_changes());
        let name = self.behavior.view_model_name();
        self.events.publish(AfterDetailSaved {
            id: self.id,
            display_member: self.behavior.display_label(),
            view_model_name: name,
        });
        info!(
            "event=detail_save module=view_model status=ok view_model={name} id={}",
            self.id
        );
        SaveOutcome::Saved { id: self.id }
    }

    fn mark_deleted(&mut self, id: EntityId) {
        self.state = DetailState::Deleted;
        self.status.set_has_changes(false);
        self.events.publish(AfterDetailDeleted {
            id,
            view_model_name: self.behavior.view_model_name(),
        });
    }

    /// Logs a failed store call, informs the user and returns the error.
    async fn fail<T>(
        &mut self,
        err: RepoError,
        operation: &str,
        past_tense: &str,
    ) -> DetailResult<T> {
        self.state = DetailState::Loaded;
        warn!(
            "event=detail_{operation} module=view_model status=error view_model={} id={} error={err}",
            self.behavior.view_model_name(),
            self.id
        );
        let message = format!(
            "The {} could not be {past_tense}: {err}",
            self.behavior.entity_kind()
        );
        self.dialogs.show_info(&message).await;
        Err(err.into())
    }
}
