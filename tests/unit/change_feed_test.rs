//! Unit tests for the change feed: filtering, fan-out and exactly-once release.

use markd::services::change_feed::ChangeFeed;
use markd::types::bookmark::Bookmark;
use markd::types::change::{ChangeEvent, ChangeKind, SubscriptionFilter};

fn insert(id: &str, owner: &str) -> ChangeEvent {
    ChangeEvent::Insert {
        record: Bookmark {
            id: id.to_string(),
            title: "t".to_string(),
            url: "https://example.com".to_string(),
            created_at: 1,
            owner: owner.to_string(),
        },
    }
}

fn delete(id: &str, owner: &str) -> ChangeEvent {
    ChangeEvent::Delete {
        id: id.to_string(),
        owner: owner.to_string(),
    }
}

#[test]
fn test_publish_reaches_every_subscriber_of_that_owner() {
    let feed = ChangeFeed::new();
    let mut tab1 = feed.subscribe(SubscriptionFilter::for_owner("alice"));
    let mut tab2 = feed.subscribe(SubscriptionFilter::for_owner("alice"));

    assert_eq!(feed.publish(&insert("b1", "alice")), 2);
    assert_eq!(tab1.try_next(), Some(insert("b1", "alice")));
    assert_eq!(tab2.try_next(), Some(insert("b1", "alice")));
}

#[test]
fn test_kind_filter() {
    let feed = ChangeFeed::new();
    let mut deletes_only = feed.subscribe(SubscriptionFilter {
        owner: "alice".to_string(),
        kinds: vec![ChangeKind::Delete],
    });

    assert_eq!(feed.publish(&insert("b1", "alice")), 0);
    assert_eq!(feed.publish(&delete("b1", "alice")), 1);
    assert_eq!(deletes_only.try_next(), Some(delete("b1", "alice")));
    assert_eq!(deletes_only.try_next(), None);
}

#[test]
fn test_unsubscribe_is_exactly_once() {
    let feed = ChangeFeed::new();
    let mut sub = feed.subscribe(SubscriptionFilter::for_owner("alice"));
    let _other = feed.subscribe(SubscriptionFilter::for_owner("alice"));
    assert_eq!(feed.subscriber_count(), 2);

    sub.unsubscribe();
    assert!(sub.is_released());
    assert_eq!(feed.subscriber_count(), 1);

    sub.unsubscribe();
    drop(sub);
    assert_eq!(feed.subscriber_count(), 1, "repeat release must not touch other registrations");
}

#[test]
fn test_drop_releases_subscription() {
    let feed = ChangeFeed::new();
    {
        let _sub = feed.subscribe(SubscriptionFilter::for_owner("alice"));
        assert_eq!(feed.subscriber_count(), 1);
    }
    assert_eq!(feed.subscriber_count(), 0);
    assert_eq!(feed.publish(&insert("b1", "alice")), 0);
}

#[test]
fn test_released_subscription_receives_nothing_new() {
    let feed = ChangeFeed::new();
    let mut sub = feed.subscribe(SubscriptionFilter::for_owner("alice"));
    feed.publish(&insert("b1", "alice"));
    sub.unsubscribe();
    feed.publish(&insert("b2", "alice"));

    assert_eq!(sub.try_next(), Some(insert("b1", "alice")));
    assert_eq!(sub.try_next(), None);
}

#[tokio::test]
async fn test_next_waits_for_publish() {
    let feed = ChangeFeed::new();
    let mut sub = feed.subscribe(SubscriptionFilter::for_owner("alice"));
    let publisher = feed.clone();
    tokio::spawn(async move {
        publisher.publish(&delete("b9", "alice"));
    });
    assert_eq!(sub.next().await, Some(delete("b9", "alice")));
}
