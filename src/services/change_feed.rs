//! Change Feed for markd.
//!
//! Fans store-level change events out to subscribers, filtered per owner and
//! per event kind. Each subscription owns an unbounded queue; releasing the
//! subscription (explicitly or by dropping it) removes its registration
//! exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::types::change::{ChangeEvent, SubscriptionFilter};

struct Subscriber {
    filter: SubscriptionFilter,
    tx: UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct FeedState {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

/// Cloneable handle to the shared subscriber registry.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    state: Arc<Mutex<FeedState>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. Events published after this call that match
    /// `filter` are queued on the returned subscription.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        tracing::debug!(subscription = id, owner = %filter.owner, "change feed subscribe");
        state.subscribers.insert(id, Subscriber { filter, tx });
        drop(state);

        Subscription {
            id,
            feed: self.clone(),
            rx,
            released: false,
        }
    }

    /// Delivers `event` to every matching subscriber. Returns how many
    /// subscribers received it.
    ///
    /// Callers publish while still holding the store's write lock, which keeps
    /// per-owner delivery order equal to the order writes were applied.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let mut state = self.lock();
        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sub) in state.subscribers.iter() {
            if !sub.filter.matches(event) {
                continue;
            }
            if sub.tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*id);
            }
        }
        for id in closed {
            state.subscribers.remove(&id);
        }
        tracing::trace!(kind = ?event.kind(), owner = %event.owner(), delivered, "change published");
        delivered
    }

    /// Number of live registrations.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn release(&self, id: u64) -> bool {
        self.lock().subscribers.remove(&id).is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FeedState> {
        // a panic while holding this lock cannot leave the map half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A live change stream bound to one filter.
pub struct Subscription {
    id: u64,
    feed: ChangeFeed,
    rx: UnboundedReceiver<ChangeEvent>,
    released: bool,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once the subscription has
    /// been released and its queue drained.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Returns a queued event without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// Removes the registration. Safe to call more than once; only the first
    /// call has an effect.
    pub fn unsubscribe(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.feed.release(self.id) {
            tracing::debug!(subscription = self.id, "change feed unsubscribe");
        }
        self.rx.close();
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
