//! In-process publish/subscribe between detail views and their lists.
//!
//! # Responsibility
//! - Deliver "saved", "deleted", "closed" and "collection saved" events to
//!   every subscriber of the same session.
//!
//! # Invariants
//! - Each payload type is one topic backed by one `tokio::sync::broadcast`
//!   channel, created lazily on first use.
//! - Publishing without subscribers is not an error.
//! - A subscriber only sees events published after it subscribed.

use crate::model::EntityId;
use log::debug;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Default buffer of every topic channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Payload carried on one topic.
pub trait Notification: Clone + Send + Sync + 'static {
    const TOPIC: &'static str;
}

/// A detail view saved its entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfterDetailSaved {
    pub id: EntityId,
    pub display_member: String,
    pub view_model_name: &'static str,
}

/// A detail view's entity is gone, deleted locally or by another writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfterDetailDeleted {
    pub id: EntityId,
    pub view_model_name: &'static str,
}

/// A detail view was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfterDetailClosed {
    pub id: EntityId,
    pub view_model_name: &'static str,
}

/// A collection editor saved its whole list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfterCollectionSaved {
    pub view_model_name: &'static str,
}

impl Notification for AfterDetailSaved {
    const TOPIC: &'static str = "after_detail_saved";
}

impl Notification for AfterDetailDeleted {
    const TOPIC: &'static str = "after_detail_deleted";
}

impl Notification for AfterDetailClosed {
    const TOPIC: &'static str = "after_detail_closed";
}

impl Notification for AfterCollectionSaved {
    const TOPIC: &'static str = "after_collection_saved";
}

/// Session-scoped typed topic registry.
///
/// Clones share the same topics.
#[derive(Clone)]
pub struct EventAggregator {
    capacity: usize,
    topics: Arc<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl Default for EventAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

impl EventAggregator {
    /// Creates an aggregator; `capacity` is the buffer of each topic.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Broadcasts `event` and returns how many subscribers received it.
    pub fn publish<E: Notification>(&self, event: E) -> usize {
        let sender = self.sender::<E>();
        // Sending fails only when nobody listens.
        let delivered = sender.send(event).unwrap_or(0);
        debug!(
            "event=notification_publish module=events topic={} subscribers={delivered}",
            E::TOPIC
        );
        delivered
    }

    pub fn subscribe<E: Notification>(&self) -> broadcast::Receiver<E> {
        self.sender::<E>().subscribe()
    }

    pub fn subscriber_count<E: Notification>(&self) -> usize {
        self.sender::<E>().receiver_count()
    }

    fn sender<E: Notification>(&self) -> broadcast::Sender<E> {
        let mut topics = self.topics();
        let capacity = self.capacity;
        let slot = topics
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(broadcast::channel::<E>(capacity).0));
        match slot.downcast_ref::<broadcast::Sender<E>>() {
            Some(sender) => sender.clone(),
            None => {
                // Unreachable while keys are derived from the payload type.
                let sender = broadcast::channel::<E>(capacity).0;
                *slot = Box::new(sender.clone());
                sender
            }
        }
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<TypeId, Box<dyn Any + Send + Sync>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventAggregator")
            .field("capacity", &self.capacity)
            .field("topics", &self.topics().len())
            .finish()
    }
}
