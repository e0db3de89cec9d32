//! Observable, validating adapters over shared entities.
//!
//! # Responsibility
//! - Expose entity fields to the presentation layer with change
//!   notification and per-property validation errors.
//!
//! # Invariants
//! - A wrapper never copies entity storage; every setter writes through to
//!   the shared entity.
//! - The entity lock is released before listeners run.
//! - A change of the error set raises [`HAS_ERRORS`] after the property
//!   notification.

use crate::model::{lock, Shared};
use crate::observable::{ListenerId, PropertyChanged, PropertyNotifier};
use std::collections::BTreeMap;

pub mod client_wrapper;
pub mod phone_number_wrapper;

pub use client_wrapper::ClientWrapper;
pub use phone_number_wrapper::ClientPhoneNumberWrapper;

/// Property name raised when the error set changes.
pub const HAS_ERRORS: &str = "has_errors";

/// Field-level validation rules of a wrapped entity.
pub trait Validate {
    /// Every property that has rules, validated by [`ModelWrapper::validate`].
    const VALIDATED_PROPERTIES: &'static [&'static str];

    /// Returns the error messages of one property; empty when valid.
    fn validate_property(&self, property: &str) -> Vec<String>;
}

/// Generic wrapper over one shared entity.
#[derive(Debug)]
pub struct ModelWrapper<T> {
    model: Shared<T>,
    notifier: PropertyNotifier,
    errors: BTreeMap<&'static str, Vec<String>>,
}

impl<T: Validate> ModelWrapper<T> {
    pub fn new(model: Shared<T>) -> Self {
        Self {
            model,
            notifier: PropertyNotifier::new(),
            errors: BTreeMap::new(),
        }
    }

    /// Shared handle of the wrapped entity.
    pub fn model(&self) -> &Shared<T> {
        &self.model
    }

    /// Reads a value from the wrapped entity.
    pub fn read<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&lock(&self.model))
    }

    /// Writes a value through to the entity, notifies, then validates.
    ///
    /// Assigning an equal value is skipped.
    pub fn set_value<V: PartialEq>(
        &mut self,
        property: &'static str,
        value: V,
        field: impl FnOnce(&mut T) -> &mut V,
    ) {
        {
            let mut model = lock(&self.model);
            let slot = field(&mut *model);
            if *slot == value {
                return;
            }
            *slot = value;
        }
        self.notifier.notify(property);
        self.validate_property(property);
    }

    /// Runs every validation rule and refreshes the error state.
    pub fn validate(&mut self) {
        for property in T::VALIDATED_PROPERTIES {
            self.validate_property(*property);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self, property: &str) -> &[String] {
        self.errors.get(property).map(Vec::as_slice).unwrap_or(&[])
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

    pub fn listener_count(&self) -> usize {
        self.notifier.listener_count()
    }

    fn validate_property(&mut self, property: &'static str) {
        let messages = lock(&self.model).validate_property(property);
        let previous = self.errors.get(property).cloned().unwrap_or_default();
        if previous == messages {
            return;
        }

        if messages.is_empty() {
            self.errors.remove(property);
        } else {
            self.errors.insert(property, messages);
        }
        self.notifier.notify(HAS_ERRORS);
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelWrapper, Validate, HAS_ERRORS};
    use crate::model::{lock, shared};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Note {
        title: String,
    }

    impl Validate for Note {
        const VALIDATED_PROPERTIES: &'static [&'static str] = &["title"];

        fn validate_property(&self, property: &str) -> Vec<String> {
            match property {
                "title" if self.title.is_empty() => vec!["title is required".to_string()],
                _ => Vec::new(),
            }
        }
    }

    #[test]
    fn set_value_writes_through_and_raises_property_then_errors() {
        let model = shared(Note::default());
        let mut wrapper = ModelWrapper::new(Arc::clone(&model));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        wrapper.subscribe(move |change| sink.lock().unwrap().push(change.property));

        wrapper.set_value("title", "draft".to_string(), |note| &mut note.title);
        assert_eq!(lock(&model).title, "draft");
        assert!(!wrapper.has_errors());

        wrapper.set_value("title", String::new(), |note| &mut note.title);
        assert!(wrapper.has_errors());
        assert_eq!(wrapper.errors("title"), ["title is required"]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["title", "title", HAS_ERRORS],
        );
    }

    #[test]
    fn equal_assignment_is_ignored() {
        let mut wrapper = ModelWrapper::new(shared(Note {
            title: "same".to_string(),
        }));
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        wrapper.subscribe(move |_| *sink.lock().unwrap() += 1);

        wrapper.set_value("title", "same".to_string(), |note| &mut note.title);
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn validate_reports_errors_without_any_assignment() {
        let mut wrapper = ModelWrapper::new(shared(Note::default()));
        assert!(!wrapper.has_errors());
        wrapper.validate();
        assert!(wrapper.has_errors());
    }
}
