//! Session Manager for markd.
//!
//! The auth provider: builds the sign-in redirect for the external identity
//! provider, turns a completed callback into a local session, restores
//! sessions from a token, and signs out. Tokens are stored hashed in SQLite.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Url;
use rusqlite::params;
use tokio::sync::watch;

use crate::database::connection::Database;
use crate::services::token_service::{hash_token, pkce_challenge, TokenService};
use crate::types::config::OAuthConfig;
use crate::types::errors::AuthError;
use crate::types::identity::{Identity, IssuedSession, OAuthProvider, ProviderProfile, SignInRedirect};

/// Trait defining the auth surface consumed by the rest of the application.
pub trait AuthProvider: Send + Sync {
    /// The signed-in identity, if any.
    fn current_identity(&self) -> Option<Identity>;
    /// Starts the external redirect flow for `provider`.
    fn sign_in(&self, provider: OAuthProvider) -> Result<SignInRedirect, AuthError>;
    /// Ends the current session. A no-op when nobody is signed in.
    fn sign_out(&self) -> Result<(), AuthError>;
}

/// A sign-in that was started but not yet completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSignIn {
    pub provider: OAuthProvider,
    pub code_verifier: String,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    identity: Identity,
    token_hash: String,
}

/// Session manager backed by SQLite.
pub struct SessionManager {
    db: Arc<Database>,
    oauth: OAuthConfig,
    tokens: TokenService,
    current: RwLock<Option<ActiveSession>>,
    identity_tx: watch::Sender<Option<Identity>>,
}

impl SessionManager {
    pub fn new(db: Arc<Database>, oauth: OAuthConfig) -> Self {
        Self {
            db,
            oauth,
            tokens: TokenService::new(),
            current: RwLock::new(None),
            identity_tx: watch::channel(None).0,
        }
    }

    /// Observes the current identity. Every sign-in, resume and sign-out is
    /// published, including one that lands on the same identity.
    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn set_current(&self, session: Option<ActiveSession>) {
        let identity = session.as_ref().map(|s| s.identity.clone());
        match self.current.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
        self.identity_tx.send_replace(identity);
    }

    fn authorize_url(&self, state: &str, verifier: &str) -> Result<String, AuthError> {
        let scope = self.oauth.scopes.join(" ");
        let challenge = pkce_challenge(verifier);
        let url = Url::parse_with_params(
            &self.oauth.authorize_url,
            &[
                ("client_id", self.oauth.client_id.as_str()),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| AuthError::ProviderError(format!("invalid authorize url: {}", e)))?;
        Ok(url.to_string())
    }

    /// Consumes a pending sign-in state. Each state is usable once and only
    /// within the configured TTL.
    pub fn take_pending_sign_in(&self, state: &str) -> Result<PendingSignIn, AuthError> {
        let conn = self.db.connection()?;
        let row = conn.query_row(
            "SELECT provider, code_verifier, created_at FROM oauth_states WHERE state = ?1",
            params![state],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        );
        let (provider, code_verifier, created_at) = match row {
            Ok(r) => r,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Err(AuthError::InvalidState),
            Err(e) => return Err(e.into()),
        };

        conn.execute("DELETE FROM oauth_states WHERE state = ?1", params![state])?;

        if Self::now() - created_at > self.oauth.state_ttl_secs {
            tracing::info!("sign-in state expired");
            return Err(AuthError::InvalidState);
        }
        let provider = OAuthProvider::parse(&provider)
            .ok_or_else(|| AuthError::UnsupportedProvider(provider.clone()))?;

        Ok(PendingSignIn {
            provider,
            code_verifier,
        })
    }

    /// Creates a session for a provider profile and makes it current.
    ///
    /// Any previously current session is replaced.
    pub fn establish_session(
        &self,
        provider: OAuthProvider,
        profile: &ProviderProfile,
    ) -> Result<IssuedSession, AuthError> {
        if profile.sub.is_empty() {
            return Err(AuthError::ProviderError("profile has no subject".to_string()));
        }
        let identity = Identity::new(
            format!("{}:{}", provider.as_str(), profile.sub),
            profile.email.clone(),
        );
        let token = self.tokens.generate_token()?;
        let token_hash = hash_token(&token);
        let now = Self::now();

        {
            let conn = self.db.connection()?;
            conn.execute(
                "INSERT INTO users (id, email, provider, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET email = excluded.email",
                params![identity.id, identity.email, provider.as_str(), now],
            )?;
            conn.execute(
                "INSERT INTO auth_sessions (token_hash, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![token_hash, identity.id, now],
            )?;
        }

        tracing::info!(user = %identity.id, "session established");
        self.set_current(Some(ActiveSession {
            identity: identity.clone(),
            token_hash,
        }));
        Ok(IssuedSession { token, identity })
    }

    /// Completes a sign-in whose provider profile is already known.
    pub fn complete_sign_in(
        &self,
        state: &str,
        profile: &ProviderProfile,
    ) -> Result<IssuedSession, AuthError> {
        let pending = self.take_pending_sign_in(state)?;
        self.establish_session(pending.provider, profile)
    }

    /// Restores a session from its token and makes it current.
    pub fn resume(&self, token: &str) -> Result<Identity, AuthError> {
        let token_hash = hash_token(token);
        let identity = {
            let conn = self.db.connection()?;
            let row = conn.query_row(
                "SELECT u.id, u.email FROM auth_sessions s JOIN users u ON u.id = s.user_id \
                 WHERE s.token_hash = ?1",
                params![token_hash],
                |row| Ok(Identity::new(row.get::<_, String>(0)?, row.get(1)?)),
            );
            match row {
                Ok(identity) => identity,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Err(AuthError::SessionNotFound),
                Err(e) => return Err(e.into()),
            }
        };

        self.set_current(Some(ActiveSession {
            identity: identity.clone(),
            token_hash,
        }));
        Ok(identity)
    }
}

impl AuthProvider for SessionManager {
    fn current_identity(&self) -> Option<Identity> {
        match self.current.read() {
            Ok(guard) => guard.as_ref().map(|s| s.identity.clone()),
            Err(poisoned) => poisoned.into_inner().as_ref().map(|s| s.identity.clone()),
        }
    }

    fn sign_in(&self, provider: OAuthProvider) -> Result<SignInRedirect, AuthError> {
        let state = self.tokens.generate_state()?;
        let verifier = self.tokens.generate_verifier()?;
        let url = self.authorize_url(&state, &verifier)?;

        let conn = self.db.connection()?;
        // drop abandoned attempts while we're here
        conn.execute(
            "DELETE FROM oauth_states WHERE created_at < ?1",
            params![Self::now() - self.oauth.state_ttl_secs],
        )?;
        conn.execute(
            "INSERT INTO oauth_states (state, provider, code_verifier, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![state, provider.as_str(), verifier, Self::now()],
        )?;

        tracing::debug!(provider = provider.as_str(), "sign-in redirect issued");
        Ok(SignInRedirect { url, state })
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        let previous = match self.current.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        self.identity_tx.send_replace(None);
        if let Some(session) = previous {
            let conn = self.db.connection()?;
            conn.execute(
                "DELETE FROM auth_sessions WHERE token_hash = ?1",
                params![session.token_hash],
            )?;
            tracing::info!(user = %session.identity.id, "signed out");
        }
        Ok(())
    }
}
