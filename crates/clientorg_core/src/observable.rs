//! Property-changed notification plumbing.
//!
//! # Responsibility
//! - Let view models observe wrapper and view-model property changes.
//!
//! # Invariants
//! - Every `subscribe` hands out a unique `ListenerId`; owners must
//!   `unsubscribe` it when the observed object leaves their collection.
//! - Listeners run outside the internal lock, so a listener may subscribe,
//!   unsubscribe or notify again without deadlocking.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle returned by [`PropertyNotifier::subscribe`].
pub type ListenerId = u64;

/// One property-changed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyChanged {
    pub property: &'static str,
}

type Listener = Arc<dyn Fn(&PropertyChanged) + Send + Sync>;

#[derive(Default)]
struct NotifierState {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, Listener)>,
}

/// Multi-listener property-changed source.
///
/// Clones share the same listener list.
#[derive(Clone, Default)]
pub struct PropertyNotifier {
    state: Arc<Mutex<NotifierState>>,
}

impl PropertyNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&PropertyChanged) + Send + Sync + 'static,
    ) -> ListenerId {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut state = self.state();
        let before = state.listeners.len();
        state.listeners.retain(|(candidate, _)| *candidate != id);
        state.listeners.len() != before
    }

    pub fn notify(&self, property: &'static str) {
        let listeners: Vec<Listener> = self
            .state()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        let event = PropertyChanged { property };
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    fn state(&self) -> MutexGuard<'_, NotifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PropertyNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
