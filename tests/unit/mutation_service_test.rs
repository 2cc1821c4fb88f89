//! Unit tests for the mutation service.
//!
//! Uses in-test doubles for the auth provider and refresh signal so each
//! collaborator can be observed on its own.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use markd::database::Database;
use markd::managers::bookmark_manager::{BookmarkManager, BookmarkStore};
use markd::managers::session_manager::AuthProvider;
use markd::services::change_feed::ChangeFeed;
use markd::services::mutation_service::{MutationCommand, MutationOutcome, MutationService, RejectReason};
use markd::services::revalidation::RefreshSignal;
use markd::types::bookmark::{Bookmark, NewBookmark};
use markd::types::change::{ChangeKind, SubscriptionFilter};
use markd::types::errors::{AuthError, StoreError};
use markd::types::identity::{Identity, OAuthProvider, SignInRedirect};
use rstest::rstest;

struct StaticAuth(Mutex<Option<Identity>>);

impl StaticAuth {
    fn signed_in(id: &str) -> Arc<Self> {
        Arc::new(Self(Mutex::new(Some(Identity::new(id, None)))))
    }

    fn anonymous() -> Arc<Self> {
        Arc::new(Self(Mutex::new(None)))
    }
}

impl AuthProvider for StaticAuth {
    fn current_identity(&self) -> Option<Identity> {
        self.0.lock().unwrap().clone()
    }

    fn sign_in(&self, _provider: OAuthProvider) -> Result<SignInRedirect, AuthError> {
        Err(AuthError::ProviderError("not used".to_string()))
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        *self.0.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Default)]
struct CountingRefresh(AtomicUsize);

impl RefreshSignal for CountingRefresh {
    fn request_refresh(&self, route: &str) {
        assert_eq!(route, "/");
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct BrokenStore;

impl BookmarkStore for BrokenStore {
    fn list_for_owner(&self, _owner: &str) -> Result<Vec<Bookmark>, StoreError> {
        Err(StoreError::DatabaseError("offline".to_string()))
    }
    fn insert(&self, _owner: &str, _new: &NewBookmark) -> Result<Bookmark, StoreError> {
        Err(StoreError::DatabaseError("offline".to_string()))
    }
    fn delete(&self, _owner: &str, _id: &str) -> Result<bool, StoreError> {
        Err(StoreError::DatabaseError("offline".to_string()))
    }
}

struct Fixture {
    store: Arc<BookmarkManager>,
    feed: ChangeFeed,
    refresh: Arc<CountingRefresh>,
}

impl Fixture {
    fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let feed = ChangeFeed::new();
        Self {
            store: Arc::new(BookmarkManager::new(db, feed.clone())),
            feed,
            refresh: Arc::new(CountingRefresh::default()),
        }
    }

    fn service(&self, auth: Arc<StaticAuth>) -> MutationService {
        MutationService::new(self.store.clone(), auth, self.refresh.clone())
    }

    fn refreshes(&self) -> usize {
        self.refresh.0.load(Ordering::SeqCst)
    }
}

fn create(title: Option<&str>, url: Option<&str>) -> MutationCommand {
    MutationCommand::Create {
        title: title.map(str::to_string),
        url: url.map(str::to_string),
    }
}

#[tokio::test]
async fn test_create_inserts_notifies_and_refreshes() {
    let fx = Fixture::new();
    let svc = fx.service(StaticAuth::signed_in("alice"));
    let mut sub = fx.feed.subscribe(SubscriptionFilter::for_owner("alice"));

    let outcome = svc
        .execute(create(Some("Example"), Some("https://example.com")))
        .await
        .unwrap();

    let MutationOutcome::Created { id } = outcome else {
        panic!("expected Created, got {:?}", outcome);
    };
    let event = sub.try_next().expect("insert notification");
    assert_eq!(event.kind(), ChangeKind::Insert);
    assert_eq!(event.bookmark_id(), id);
    assert_eq!(fx.refreshes(), 1);

    let list = fx.store.list_for_owner("alice").unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].title, "Example");
    assert_eq!(list[0].url, "https://example.com");
    assert_eq!(list[0].owner, "alice");
}

#[rstest]
#[case::empty_title(Some(""), Some("https://example.com"))]
#[case::empty_url(Some("Example"), Some(""))]
#[case::both_empty(Some(""), Some(""))]
#[case::missing_title(None, Some("https://example.com"))]
#[case::missing_url(Some("Example"), None)]
#[tokio::test]
async fn test_create_with_missing_input_does_nothing(
    #[case] title: Option<&str>,
    #[case] url: Option<&str>,
) {
    let fx = Fixture::new();
    let svc = fx.service(StaticAuth::signed_in("alice"));
    let mut sub = fx.feed.subscribe(SubscriptionFilter::for_owner("alice"));

    let outcome = svc.execute(create(title, url)).await.unwrap();

    assert_eq!(outcome, MutationOutcome::Rejected(RejectReason::MissingInput));
    assert!(sub.try_next().is_none());
    assert!(fx.store.list_for_owner("alice").unwrap().is_empty());
    assert_eq!(fx.refreshes(), 0);
}

#[tokio::test]
async fn test_create_without_session_does_nothing() {
    let fx = Fixture::new();
    let svc = fx.service(StaticAuth::anonymous());

    svc.create_bookmark(Some("Example"), Some("https://example.com")).await;
    let outcome = svc
        .execute(create(Some("Example"), Some("https://example.com")))
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::Rejected(RejectReason::Unauthenticated));
    assert_eq!(fx.refreshes(), 0);
}

#[tokio::test]
async fn test_delete_of_foreign_bookmark_is_silent_noop() {
    let fx = Fixture::new();
    let bobs = fx
        .store
        .insert(
            "bob",
            &NewBookmark {
                title: "Bob's".to_string(),
                url: "https://bob.example".to_string(),
            },
        )
        .unwrap();
    let alice = fx.service(StaticAuth::signed_in("alice"));
    let mut alice_stream = fx.feed.subscribe(SubscriptionFilter::for_owner("alice"));
    let mut bob_stream = fx.feed.subscribe(SubscriptionFilter::for_owner("bob"));

    let outcome = alice
        .execute(MutationCommand::Delete { id: bobs.id.clone() })
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::NoMatch);
    assert_eq!(fx.store.list_for_owner("bob").unwrap(), vec![bobs]);
    assert!(alice_stream.try_next().is_none());
    assert!(bob_stream.try_next().is_none());
}

#[tokio::test]
async fn test_delete_own_bookmark() {
    let fx = Fixture::new();
    let svc = fx.service(StaticAuth::signed_in("alice"));
    svc.create_bookmark(Some("Example"), Some("https://example.com")).await;
    let id = fx.store.list_for_owner("alice").unwrap()[0].id.clone();

    svc.delete_bookmark(&id).await;

    assert!(fx.store.list_for_owner("alice").unwrap().is_empty());
    assert_eq!(fx.refreshes(), 2);
}

#[tokio::test]
async fn test_delete_without_session_does_nothing() {
    let fx = Fixture::new();
    let svc = fx.service(StaticAuth::anonymous());
    let outcome = svc
        .execute(MutationCommand::Delete { id: "whatever".to_string() })
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Rejected(RejectReason::Unauthenticated));
}

#[tokio::test]
async fn test_store_failure_is_swallowed_by_public_api() {
    let refresh = Arc::new(CountingRefresh::default());
    let svc = MutationService::new(Arc::new(BrokenStore), StaticAuth::signed_in("alice"), refresh.clone());

    assert!(svc
        .execute(create(Some("Example"), Some("https://example.com")))
        .await
        .is_err());
    // the fire-and-forget surface neither panics nor reports
    svc.create_bookmark(Some("Example"), Some("https://example.com")).await;
    svc.delete_bookmark("x").await;
    assert_eq!(refresh.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_submit_runs_in_background() {
    let fx = Fixture::new();
    let svc = Arc::new(fx.service(StaticAuth::signed_in("alice")));
    let handle = svc.submit(create(Some("Bg"), Some("https://bg.example")));
    handle.await.unwrap();
    assert_eq!(fx.store.list_for_owner("alice").unwrap().len(), 1);
}
