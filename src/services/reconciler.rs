//! View State Reconciler for markd.
//!
//! Holds the bookmark list a view displays and applies the initial snapshot
//! and change notifications to it. Application is idempotent: a duplicate
//! insert never yields a second entry, and a delete for an absent id is a
//! no-op. Notifications may arrive before the snapshot does.
//!
//! Inserts delivered after the initial load are prepended in arrival order,
//! not re-sorted by `created_at`. Under concurrent multi-tab use the list can
//! therefore diverge from strict creation order.

use std::collections::HashSet;

use tokio::sync::{mpsc, watch};

use crate::types::bookmark::Bookmark;
use crate::types::change::ChangeEvent;

/// Input to the reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileMessage {
    /// Snapshot from the store, newest first.
    InitialLoad(Vec<Bookmark>),
    Change(ChangeEvent),
}

/// The displayed list for one identity.
#[derive(Debug, Clone)]
pub struct ViewState {
    owner: String,
    bookmarks: Vec<Bookmark>,
    loaded: bool,
    /// Ids removed by delete notifications. Ids are never reused, so a late
    /// snapshot or duplicate insert must not bring them back.
    ///
    /// Bounded by the number of ids this view ever displayed plus the
    /// deletes seen before the snapshot: once loaded, a delete for an absent
    /// id adds nothing.
    removed: HashSet<String>,
}

impl ViewState {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            bookmarks: Vec::new(),
            loaded: false,
            removed: HashSet::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bookmarks.iter().any(|b| b.id == id)
    }

    /// Number of remembered deleted ids.
    pub fn tombstone_count(&self) -> usize {
        self.removed.len()
    }

    /// Applies one message. Returns whether the list changed.
    pub fn apply(&mut self, msg: ReconcileMessage) -> bool {
        match msg {
            ReconcileMessage::InitialLoad(snapshot) => self.load(snapshot),
            ReconcileMessage::Change(event) => self.apply_change(event),
        }
    }

    /// Merges the initial snapshot with anything that arrived before it.
    ///
    /// Result: early inserts missing from the snapshot (most recent arrival
    /// first), then the snapshot, minus every id already deleted. A second
    /// snapshot is treated the same way.
    pub fn load(&mut self, snapshot: Vec<Bookmark>) -> bool {
        let before = self.ids();
        let snapshot_ids: HashSet<&str> = snapshot.iter().map(|b| b.id.as_str()).collect();

        let mut merged: Vec<Bookmark> = self
            .bookmarks
            .iter()
            .filter(|b| !snapshot_ids.contains(b.id.as_str()))
            .cloned()
            .collect();
        merged.extend(
            snapshot
                .into_iter()
                .filter(|b| b.owner == self.owner && !self.removed.contains(&b.id)),
        );

        self.bookmarks = merged;
        self.loaded = true;
        before != self.ids()
    }

    /// Applies one change notification.
    pub fn apply_change(&mut self, event: ChangeEvent) -> bool {
        if event.owner() != self.owner {
            tracing::warn!(owner = %event.owner(), "ignoring change for another owner");
            return false;
        }
        match event {
            ChangeEvent::Insert { record } => {
                if self.removed.contains(&record.id) || self.contains(&record.id) {
                    return false;
                }
                self.bookmarks.insert(0, record);
                true
            }
            ChangeEvent::Delete { id, .. } => {
                let len = self.bookmarks.len();
                self.bookmarks.retain(|b| b.id != id);
                let changed = self.bookmarks.len() != len;
                // before the snapshot the id may still be on its way in
                if changed || !self.loaded {
                    self.removed.insert(id);
                }
                changed
            }
        }
    }

    fn ids(&self) -> Vec<String> {
        self.bookmarks.iter().map(|b| b.id.clone()).collect()
    }
}

/// Drains `rx` in arrival order, one message at a time, publishing the list
/// on `out` after every change. Returns the final state once every sender
/// is gone.
pub async fn run(
    mut state: ViewState,
    mut rx: mpsc::UnboundedReceiver<ReconcileMessage>,
    out: watch::Sender<Vec<Bookmark>>,
) -> ViewState {
    while let Some(msg) = rx.recv().await {
        let initial = matches!(msg, ReconcileMessage::InitialLoad(_));
        if state.apply(msg) || initial {
            out.send_replace(state.bookmarks.clone());
        }
    }
    tracing::debug!(owner = %state.owner, "reconciler stopped");
    state
}
