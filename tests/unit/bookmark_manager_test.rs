//! Unit tests for the owner-scoped bookmark store.
//!
//! These tests exercise `BookmarkStore` against an in-memory SQLite database
//! and check the change notifications each write publishes.

use std::sync::Arc;

use markd::database::Database;
use markd::managers::bookmark_manager::{BookmarkManager, BookmarkStore};
use markd::services::change_feed::ChangeFeed;
use markd::types::bookmark::NewBookmark;
use markd::types::change::{ChangeEvent, ChangeKind, SubscriptionFilter};

/// Helper: a store and its feed over a fresh in-memory database.
fn setup() -> (BookmarkManager, ChangeFeed) {
    let db = Arc::new(Database::open_in_memory().expect("Failed to open in-memory database"));
    let feed = ChangeFeed::new();
    (BookmarkManager::new(db, feed.clone()), feed)
}

fn new_bm(title: &str, url: &str) -> NewBookmark {
    NewBookmark {
        title: title.to_string(),
        url: url.to_string(),
    }
}

#[test]
fn test_insert_assigns_id_timestamp_and_owner() {
    let (store, _) = setup();
    let bm = store.insert("alice", &new_bm("Example", "https://example.com")).unwrap();

    assert!(!bm.id.is_empty());
    assert!(bm.created_at > 0);
    assert_eq!(bm.owner, "alice");
    assert_eq!(store.get("alice", &bm.id).unwrap(), Some(bm));
}

#[test]
fn test_list_is_newest_first_and_owner_scoped() {
    let (store, _) = setup();
    let first = store.insert("alice", &new_bm("First", "https://a.com")).unwrap();
    let second = store.insert("alice", &new_bm("Second", "https://b.com")).unwrap();
    store.insert("bob", &new_bm("Bob's", "https://c.com")).unwrap();

    let list = store.list_for_owner("alice").unwrap();
    let ids: Vec<&str> = list.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    assert!(list.iter().all(|b| b.owner == "alice"));
}

#[test]
fn test_delete_matches_id_and_owner() {
    let (store, _) = setup();
    let bm = store.insert("alice", &new_bm("Example", "https://example.com")).unwrap();

    assert!(!store.delete("bob", &bm.id).unwrap(), "other owner must match zero rows");
    assert_eq!(store.list_for_owner("alice").unwrap().len(), 1);

    assert!(store.delete("alice", &bm.id).unwrap());
    assert!(store.list_for_owner("alice").unwrap().is_empty());
    assert!(!store.delete("alice", &bm.id).unwrap(), "second delete is a no-op");
}

#[test]
fn test_insert_publishes_to_owner_only() {
    let (store, feed) = setup();
    let mut alice = feed.subscribe(SubscriptionFilter::for_owner("alice"));
    let mut bob = feed.subscribe(SubscriptionFilter::for_owner("bob"));

    let bm = store.insert("alice", &new_bm("Example", "https://example.com")).unwrap();

    assert_eq!(alice.try_next(), Some(ChangeEvent::Insert { record: bm }));
    assert_eq!(bob.try_next(), None);
}

#[test]
fn test_delete_publishes_only_when_a_row_matched() {
    let (store, feed) = setup();
    let bm = store.insert("alice", &new_bm("Example", "https://example.com")).unwrap();
    let mut alice = feed.subscribe(SubscriptionFilter::for_owner("alice"));
    let mut bob = feed.subscribe(SubscriptionFilter::for_owner("bob"));

    store.delete("bob", &bm.id).unwrap();
    assert_eq!(alice.try_next(), None);
    assert_eq!(bob.try_next(), None);

    store.delete("alice", &bm.id).unwrap();
    let event = alice.try_next().expect("delete notification");
    assert_eq!(event.kind(), ChangeKind::Delete);
    assert_eq!(event.bookmark_id(), bm.id);
}

#[test]
fn test_events_arrive_in_apply_order() {
    let (store, feed) = setup();
    let mut sub = feed.subscribe(SubscriptionFilter::for_owner("alice"));

    let a = store.insert("alice", &new_bm("A", "https://a.com")).unwrap();
    let b = store.insert("alice", &new_bm("B", "https://b.com")).unwrap();
    store.delete("alice", &a.id).unwrap();

    let ids: Vec<(ChangeKind, String)> = std::iter::from_fn(|| sub.try_next())
        .map(|e| (e.kind(), e.bookmark_id().to_string()))
        .collect();
    assert_eq!(
        ids,
        vec![
            (ChangeKind::Insert, a.id.clone()),
            (ChangeKind::Insert, b.id.clone()),
            (ChangeKind::Delete, a.id),
        ]
    );
}
