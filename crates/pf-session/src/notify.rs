//! Change feed.
//!
//! Events are invalidate-and-refetch signals: they name what changed, not
//! the new value. Every subscriber gets every event published after it
//! subscribed.

use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    SessionChanged { session_id: Uuid },
    NotesChanged { session_id: Uuid },
    ActivityChanged { list_id: Option<Uuid> },
}

#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: Mutex<Vec<Sender<ChangeEvent>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = unbounded();
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    /// Send to every live subscriber. Dropped receivers are pruned.
    pub fn publish(&self, event: ChangeEvent) {
        let mut subs = match self.subscribers.lock() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::trace!(?event, subscribers = subs.len(), "change published");
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(subs) => subs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
