//! Mutation Service for markd.
//!
//! Create and delete bookmarks on behalf of the current identity. Both are
//! fire-and-forget: callers get no success signal. The change notification
//! that the store emits is the only confirmation a view ever sees.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::managers::bookmark_manager::BookmarkStore;
use crate::managers::session_manager::AuthProvider;
use crate::services::revalidation::{RefreshSignal, HOME_ROUTE};
use crate::types::bookmark::NewBookmark;
use crate::types::errors::StoreError;

/// A mutation request as submitted from the form or the delete affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationCommand {
    Create {
        title: Option<String>,
        url: Option<String>,
    },
    Delete {
        id: String,
    },
}

/// Why a command was dropped before reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingInput,
    Unauthenticated,
}

/// What a command did. Only used for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Created { id: String },
    Deleted { id: String },
    /// The delete matched no row owned by the caller.
    NoMatch,
    Rejected(RejectReason),
}

/// Executes mutations against an injected store, auth provider and refresh signal.
pub struct MutationService {
    store: Arc<dyn BookmarkStore>,
    auth: Arc<dyn AuthProvider>,
    refresh: Arc<dyn RefreshSignal>,
}

impl MutationService {
    pub fn new(
        store: Arc<dyn BookmarkStore>,
        auth: Arc<dyn AuthProvider>,
        refresh: Arc<dyn RefreshSignal>,
    ) -> Self {
        Self {
            store,
            auth,
            refresh,
        }
    }

    /// Creates a bookmark for the current identity. Silently does nothing on
    /// empty input, without a session, or when the store fails.
    pub async fn create_bookmark(&self, title: Option<&str>, url: Option<&str>) {
        self.run(MutationCommand::Create {
            title: title.map(str::to_string),
            url: url.map(str::to_string),
        })
        .await;
    }

    /// Deletes the bookmark `(id, current identity)`. Silently does nothing
    /// without a session, when no row matches, or when the store fails.
    pub async fn delete_bookmark(&self, id: &str) {
        self.run(MutationCommand::Delete { id: id.to_string() }).await;
    }

    /// Spawns `cmd` on the runtime and returns at once.
    pub fn submit(self: &Arc<Self>, cmd: MutationCommand) -> JoinHandle<()> {
        let svc = Arc::clone(self);
        tokio::spawn(async move { svc.run(cmd).await })
    }

    async fn run(&self, cmd: MutationCommand) {
        match self.execute(cmd).await {
            Ok(outcome) => tracing::debug!(?outcome, "mutation finished"),
            Err(e) => tracing::warn!(error = %e, "mutation failed"),
        }
    }

    /// Validates, authorizes and applies `cmd`, then requests a refresh of
    /// the home route if the store accepted it.
    pub async fn execute(&self, cmd: MutationCommand) -> Result<MutationOutcome, StoreError> {
        let outcome = match cmd {
            MutationCommand::Create { title, url } => {
                let Some(new) = NewBookmark::from_form(title.as_deref(), url.as_deref()) else {
                    return Ok(MutationOutcome::Rejected(RejectReason::MissingInput));
                };
                let Some(identity) = self.auth.current_identity() else {
                    return Ok(MutationOutcome::Rejected(RejectReason::Unauthenticated));
                };
                let store = Arc::clone(&self.store);
                let created = tokio::task::spawn_blocking(move || store.insert(&identity.id, &new))
                    .await
                    .map_err(|e| StoreError::TaskFailed(e.to_string()))??;
                MutationOutcome::Created { id: created.id }
            }
            MutationCommand::Delete { id } => {
                let Some(identity) = self.auth.current_identity() else {
                    return Ok(MutationOutcome::Rejected(RejectReason::Unauthenticated));
                };
                let store = Arc::clone(&self.store);
                let target = id.clone();
                let deleted = tokio::task::spawn_blocking(move || store.delete(&identity.id, &target))
                    .await
                    .map_err(|e| StoreError::TaskFailed(e.to_string()))??;
                if deleted {
                    MutationOutcome::Deleted { id }
                } else {
                    MutationOutcome::NoMatch
                }
            }
        };

        self.refresh.request_refresh(HOME_ROUTE);
        Ok(outcome)
    }
}
