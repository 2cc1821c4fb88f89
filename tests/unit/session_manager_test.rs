//! Unit tests for the session manager: sign-in redirect, callback
//! completion, resume and sign-out.

use std::sync::Arc;

use markd::database::Database;
use markd::managers::session_manager::{AuthProvider, SessionManager};
use markd::services::token_service::pkce_challenge;
use markd::types::config::OAuthConfig;
use markd::types::errors::AuthError;
use markd::types::identity::{OAuthProvider, ProviderProfile};

fn setup() -> (Arc<Database>, SessionManager) {
    let db = Arc::new(Database::open_in_memory().expect("db"));
    let mut oauth = OAuthConfig::default();
    oauth.client_id = "client-123".to_string();
    let sessions = SessionManager::new(db.clone(), oauth);
    (db, sessions)
}

fn profile(sub: &str) -> ProviderProfile {
    ProviderProfile {
        sub: sub.to_string(),
        email: Some(format!("{}@example.com", sub)),
    }
}

fn query_param(url: &str, key: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[test]
fn test_anonymous_by_default() {
    let (_, sessions) = setup();
    assert!(sessions.current_identity().is_none());
}

#[test]
fn test_sign_in_builds_authorize_url() {
    let (db, sessions) = setup();
    let redirect = sessions.sign_in(OAuthProvider::Google).unwrap();

    assert!(redirect.url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert_eq!(query_param(&redirect.url, "client_id").as_deref(), Some("client-123"));
    assert_eq!(query_param(&redirect.url, "response_type").as_deref(), Some("code"));
    assert_eq!(query_param(&redirect.url, "state").as_deref(), Some(redirect.state.as_str()));
    assert_eq!(query_param(&redirect.url, "code_challenge_method").as_deref(), Some("S256"));

    let verifier: String = db
        .connection()
        .unwrap()
        .query_row(
            "SELECT code_verifier FROM oauth_states WHERE state = ?1",
            [&redirect.state],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(
        query_param(&redirect.url, "code_challenge"),
        Some(pkce_challenge(&verifier))
    );
}

#[test]
fn test_complete_sign_in_sets_identity() {
    let (_, sessions) = setup();
    let redirect = sessions.sign_in(OAuthProvider::Google).unwrap();
    let issued = sessions.complete_sign_in(&redirect.state, &profile("alice")).unwrap();

    assert_eq!(issued.identity.id, "google:alice");
    assert_eq!(issued.identity.email.as_deref(), Some("alice@example.com"));
    assert_eq!(sessions.current_identity(), Some(issued.identity));
}

#[test]
fn test_state_is_single_use() {
    let (_, sessions) = setup();
    let redirect = sessions.sign_in(OAuthProvider::Google).unwrap();
    sessions.complete_sign_in(&redirect.state, &profile("alice")).unwrap();

    let again = sessions.complete_sign_in(&redirect.state, &profile("alice"));
    assert!(matches!(again, Err(AuthError::InvalidState)));
}

#[test]
fn test_unknown_state_is_rejected() {
    let (_, sessions) = setup();
    let res = sessions.complete_sign_in("forged", &profile("mallory"));
    assert!(matches!(res, Err(AuthError::InvalidState)));
    assert!(sessions.current_identity().is_none());
}

#[test]
fn test_expired_state_is_rejected() {
    let (db, sessions) = setup();
    let redirect = sessions.sign_in(OAuthProvider::Google).unwrap();
    db.connection()
        .unwrap()
        .execute(
            "UPDATE oauth_states SET created_at = created_at - 3600 WHERE state = ?1",
            [&redirect.state],
        )
        .unwrap();
    let res = sessions.complete_sign_in(&redirect.state, &profile("alice"));
    assert!(matches!(res, Err(AuthError::InvalidState)));
}

#[test]
fn test_token_is_stored_hashed() {
    let (db, sessions) = setup();
    let issued = sessions
        .establish_session(OAuthProvider::Google, &profile("alice"))
        .unwrap();
    let stored: i64 = db
        .connection()
        .unwrap()
        .query_row(
            "SELECT COUNT(*) FROM auth_sessions WHERE token_hash = ?1",
            [&issued.token],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, 0, "raw token must never be stored");
}

#[test]
fn test_resume_restores_identity() {
    let (db, sessions) = setup();
    let issued = sessions
        .establish_session(OAuthProvider::Google, &profile("alice"))
        .unwrap();

    let fresh = SessionManager::new(db, OAuthConfig::default());
    assert!(fresh.current_identity().is_none());
    let identity = fresh.resume(&issued.token).unwrap();
    assert_eq!(identity, issued.identity);
    assert_eq!(fresh.current_identity(), Some(identity));
}

#[test]
fn test_resume_with_bad_token_fails() {
    let (_, sessions) = setup();
    assert!(matches!(sessions.resume("nope"), Err(AuthError::SessionNotFound)));
}

#[test]
fn test_sign_out_clears_identity_and_session() {
    let (_, sessions) = setup();
    let issued = sessions
        .establish_session(OAuthProvider::Google, &profile("alice"))
        .unwrap();
    sessions.sign_out().unwrap();

    assert!(sessions.current_identity().is_none());
    assert!(matches!(sessions.resume(&issued.token), Err(AuthError::SessionNotFound)));
    sessions.sign_out().expect("signing out twice is fine");
}

#[test]
fn test_empty_subject_is_rejected() {
    let (_, sessions) = setup();
    let res = sessions.establish_session(OAuthProvider::Google, &profile(""));
    assert!(matches!(res, Err(AuthError::ProviderError(_))));
}

#[test]
fn test_identity_changes_are_observable() {
    let (db, sessions) = setup();
    let watcher = sessions.watch_identity();
    assert!(watcher.borrow().is_none());

    let issued = sessions
        .establish_session(OAuthProvider::Google, &profile("alice"))
        .unwrap();
    assert_eq!(watcher.borrow().as_ref(), Some(&issued.identity));

    sessions.sign_out().unwrap();
    assert!(watcher.borrow().is_none());

    let other = SessionManager::new(db, OAuthConfig::default());
    let watcher = other.watch_identity();
    other
        .establish_session(OAuthProvider::Google, &profile("bob"))
        .unwrap();
    assert_eq!(
        watcher.borrow().as_ref().map(|i| i.id.as_str()),
        Some("google:bob")
    );
}
