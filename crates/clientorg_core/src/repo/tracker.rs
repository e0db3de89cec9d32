//! In-memory change tracker for one repository.
//!
//! # Responsibility
//! - Keep the identity map of loaded entities.
//! - Remember the values each entity had at load/save time.
//! - Stage inserts, deletes and owned-child removals until `save`.
//!
//! # Invariants
//! - One tracked entry per entity handle; lookups by id skip deleted entries.
//! - `Added` entries have no original values; every other entry has them.
//! - An entry is modified iff its current snapshot differs from its
//!   original snapshot; nothing caches that answer.

use crate::model::{lock, Entity, EntityId, RowVersioned, Shared};
use std::sync::Arc;

/// Persistence state of one tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Staged for insertion.
    Added,
    /// Loaded from storage; may hold in-memory edits.
    Unchanged,
    /// Staged for deletion.
    Deleted,
}

/// Owned child row staged for deletion, e.g. a removed phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRemoval {
    pub table: &'static str,
    pub id: EntityId,
    pub owner_id: EntityId,
}

pub(crate) struct TrackedEntry<T: Entity> {
    pub(crate) entity: Shared<T>,
    pub(crate) state: EntryState,
    pub(crate) original: Option<T::Snapshot>,
}

impl<T: Entity> TrackedEntry<T> {
    fn id(&self) -> EntityId {
        lock(&self.entity).row_id()
    }

    pub(crate) fn is_modified(&self) -> bool {
        match (&self.state, &self.original) {
            (EntryState::Unchanged, Some(original)) => lock(&self.entity).snapshot() != *original,
            _ => false,
        }
    }

    /// Version the next guarded write must match.
    pub(crate) fn expected_version(&self) -> i64 {
        self.original
            .as_ref()
            .map_or_else(|| lock(&self.entity).row_version(), RowVersioned::row_version)
    }
}

/// Change tracker keyed by entity handle.
pub struct ChangeTracker<T: Entity> {
    entries: Vec<TrackedEntry<T>>,
    child_removals: Vec<ChildRemoval>,
}

impl<T: Entity> Default for ChangeTracker<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            child_removals: Vec::new(),
        }
    }
}

impl<T: Entity> ChangeTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the tracked handle for a persisted id.
    pub fn find(&self, id: EntityId) -> Option<Shared<T>> {
        self.position(id)
            .map(|index| Arc::clone(&self.entries[index].entity))
    }

    pub fn is_tracked(&self, id: EntityId) -> bool {
        self.position(id).is_some()
    }

    pub fn state_of(&self, entity: &Shared<T>) -> Option<EntryState> {
        self.entries
            .iter()
            .find(|entry| Arc::ptr_eq(&entry.entity, entity))
            .map(|entry| entry.state)
    }

    /// Starts tracking a freshly loaded entity and returns its handle.
    pub fn attach(&mut self, entity: T) -> Shared<T> {
        let original = entity.snapshot();
        let handle = crate::model::shared(entity);
        self.entries.push(TrackedEntry {
            entity: Arc::clone(&handle),
            state: EntryState::Unchanged,
            original: Some(original),
        });
        handle
    }

    pub fn stage_added(&mut self, entity: Shared<T>) {
        if self.state_of(&entity).is_some() {
            return;
        }
        self.entries.push(TrackedEntry {
            entity,
            state: EntryState::Added,
            original: None,
        });
    }

    /// Stages deletion; a never-saved entity is simply forgotten.
    pub fn stage_removed(&mut self, entity: &Shared<T>) {
        let Some(index) = self
            .entries
            .iter()
            .position(|entry| Arc::ptr_eq(&entry.entity, entity))
        else {
            let original = lock(entity).snapshot();
            self.entries.push(TrackedEntry {
                entity: Arc::clone(entity),
                state: EntryState::Deleted,
                original: Some(original),
            });
            return;
        };

        if self.entries[index].state == EntryState::Added {
            self.entries.remove(index);
        } else {
            self.entries[index].state = EntryState::Deleted;
        }
    }

    /// Takes back a staged deletion so the entity is tracked as loaded again.
    ///
    /// Returns `false` when the handle was not staged for deletion.
    pub fn unstage_removed(&mut self, entity: &Shared<T>) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| Arc::ptr_eq(&entry.entity, entity))
        {
            Some(entry) if entry.state == EntryState::Deleted => {
                entry.state = EntryState::Unchanged;
                true
            }
            _ => false,
        }
    }

    /// Stages an owned child row for deletion. Unsaved children are ignored.
    pub fn stage_child_removal(&mut self, removal: ChildRemoval) {
        if removal.id <= 0 || self.child_removals.contains(&removal) {
            return;
        }
        self.child_removals.push(removal);
    }

    pub fn child_removals(&self) -> &[ChildRemoval] {
        &self.child_removals
    }

    pub fn has_changes(&self) -> bool {
        !self.child_removals.is_empty()
            || self.entries.iter().any(|entry| {
                matches!(entry.state, EntryState::Added | EntryState::Deleted)
                    || entry.is_modified()
            })
    }

    pub(crate) fn entries(&self) -> &[TrackedEntry<T>] {
        &self.entries
    }

    /// Captures current values of every entry, in entry order.
    pub(crate) fn current_snapshots(&self) -> Vec<T::Snapshot> {
        self.entries
            .iter()
            .map(|entry| lock(&entry.entity).snapshot())
            .collect()
    }

    /// Puts back values captured by [`Self::current_snapshots`].
    pub(crate) fn restore_current(&self, snapshots: &[T::Snapshot]) {
        for (entry, snapshot) in self.entries.iter().zip(snapshots) {
            lock(&entry.entity).restore(snapshot);
        }
    }

    /// Marks every entry as persisted after a committed save.
    pub(crate) fn accept_changes(&mut self) {
        self.entries
            .retain(|entry| entry.state != EntryState::Deleted);
        for entry in &mut self.entries {
            entry.state = EntryState::Unchanged;
            entry.original = Some(lock(&entry.entity).snapshot());
        }
        self.child_removals.clear();
    }

    /// Replaces the original values of a tracked entry.
    ///
    /// Returns `false` when `id` is not tracked.
    pub(crate) fn replace_original(&mut self, id: EntityId, database: T::Snapshot) -> bool {
        match self.position(id) {
            Some(index) => {
                self.entries[index].original = Some(database);
                true
            }
            None => false,
        }
    }

    /// Overwrites a tracked entity with freshly read values, or detaches it
    /// when the row is gone. Staged child removals of the entity are dropped.
    pub(crate) fn reload(&mut self, id: EntityId, fresh: Option<T>) {
        let Some(index) = self.position(id) else {
            return;
        };
        self.child_removals
            .retain(|removal| removal.owner_id != id);

        match fresh {
            Some(fresh) => {
                let entry = &mut self.entries[index];
                entry.original = Some(fresh.snapshot());
                entry.state = EntryState::Unchanged;
                *lock(&entry.entity) = fresh;
            }
            None => {
                self.entries.remove(index);
            }
        }
    }

    fn position(&self, id: EntityId) -> Option<usize> {
        if id <= 0 {
            return None;
        }
        self.entries
            .iter()
            .position(|entry| entry.state != EntryState::Deleted && entry.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeTracker, ChildRemoval, EntryState};
    use crate::model::company::Company;
    use crate::model::{lock, shared};

    fn persisted(id: i64, name: &str) -> Company {
        Company {
            id,
            name: name.to_string(),
            row_version: 1,
        }
    }

    #[test]
    fn attached_entity_is_clean_until_edited() {
        let mut tracker = ChangeTracker::new();
        let handle = tracker.attach(persisted(1, "Initech"));
        assert!(!tracker.has_changes());

        lock(&handle).name = "Initrode".to_string();
        assert!(tracker.has_changes());

        lock(&handle).name = "Initech".to_string();
        assert!(!tracker.has_changes(), "reverting an edit clears the change");
    }

    #[test]
    fn find_returns_same_handle() {
        let mut tracker = ChangeTracker::new();
        let handle = tracker.attach(persisted(4, "Hooli"));
        let found = tracker.find(4).expect("tracked entity should be found");
        assert!(std::sync::Arc::ptr_eq(&handle, &found));
        assert!(tracker.find(5).is_none());
        assert!(tracker.find(0).is_none());
    }

    #[test]
    fn removing_added_entity_forgets_it() {
        let mut tracker = ChangeTracker::new();
        let handle = shared(Company::new("Pied Piper"));
        tracker.stage_added(handle.clone());
        assert_eq!(tracker.state_of(&handle), Some(EntryState::Added));
        assert!(tracker.has_changes());

        tracker.stage_removed(&handle);
        assert!(tracker.is_empty());
        assert!(!tracker.has_changes());
    }

    #[test]
    fn removing_persisted_entity_stages_delete() {
        let mut tracker = ChangeTracker::new();
        let handle = tracker.attach(persisted(2, "Globex"));
        tracker.stage_removed(&handle);
        assert_eq!(tracker.state_of(&handle), Some(EntryState::Deleted));
        assert!(!tracker.is_tracked(2));
        assert!(tracker.has_changes());
    }

    #[test]
    fn unstaged_delete_is_found_by_id_again() {
        let mut tracker = ChangeTracker::new();
        let handle = tracker.attach(persisted(2, "Globex"));
        tracker.stage_removed(&handle);
        assert!(tracker.unstage_removed(&handle));

        assert_eq!(tracker.state_of(&handle), Some(EntryState::Unchanged));
        assert!(tracker.is_tracked(2));
        assert!(!tracker.has_changes());
        assert!(tracker.replace_original(2, persisted(2, "Globex Corp")));
        assert!(!tracker.unstage_removed(&handle), "nothing left to unstage");
    }

    #[test]
    fn child_removals_count_as_changes_and_ignore_unsaved_rows() {
        let mut tracker: ChangeTracker<Company> = ChangeTracker::new();
        tracker.stage_child_removal(ChildRemoval {
            table: "client_phone_numbers",
            id: 0,
            owner_id: 1,
        });
        assert!(!tracker.has_changes());

        let removal = ChildRemoval {
            table: "client_phone_numbers",
            id: 3,
            owner_id: 1,
        };
        tracker.stage_child_removal(removal.clone());
        tracker.stage_child_removal(removal);
        assert_eq!(tracker.child_removals().len(), 1);
        assert!(tracker.has_changes());
    }

    #[test]
    fn reload_discards_edits_and_detaches_missing_rows() {
        let mut tracker = ChangeTracker::new();
        let handle = tracker.attach(persisted(1, "Initech"));
        lock(&handle).name = "edited".to_string();

        tracker.reload(1, Some(persisted(1, "Initech Ltd")));
        assert_eq!(lock(&handle).name, "Initech Ltd");
        assert!(!tracker.has_changes());

        tracker.reload(1, None);
        assert!(!tracker.is_tracked(1));
    }

    #[test]
    fn accept_changes_drops_deleted_and_resets_originals() {
        let mut tracker = ChangeTracker::new();
        let kept = tracker.attach(persisted(1, "Kept"));
        let gone = tracker.attach(persisted(2, "Gone"));
        lock(&kept).name = "Kept 2".to_string();
        tracker.stage_removed(&gone);

        tracker.accept_changes();
        assert_eq!(tracker.len(), 1);
        assert!(!tracker.has_changes());
    }
}
