use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;

/// Row-level change kinds emitted by the store. Updates never happen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Delete,
}

/// A single insert or delete applied to the bookmark table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChangeEvent {
    Insert { record: Bookmark },
    Delete { id: String, owner: String },
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert { .. } => ChangeKind::Insert,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }

    pub fn owner(&self) -> &str {
        match self {
            ChangeEvent::Insert { record } => &record.owner,
            ChangeEvent::Delete { owner, .. } => owner,
        }
    }

    pub fn bookmark_id(&self) -> &str {
        match self {
            ChangeEvent::Insert { record } => &record.id,
            ChangeEvent::Delete { id, .. } => id,
        }
    }
}

/// Server-side filter for a change subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub owner: String,
    pub kinds: Vec<ChangeKind>,
}

impl SubscriptionFilter {
    /// Inserts and deletes for a single owner.
    pub fn for_owner(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            kinds: vec![ChangeKind::Insert, ChangeKind::Delete],
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.owner() == self.owner && self.kinds.contains(&event.kind())
    }
}
