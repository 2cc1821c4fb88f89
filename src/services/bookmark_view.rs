//! Bookmark View for markd.
//!
//! One open view of one identity's bookmarks: a listener feeding a
//! single-consumer reconciliation queue, plus the initial snapshot load.
//! Closing the view (or dropping it) releases the change subscription.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::managers::bookmark_manager::BookmarkStore;
use crate::services::change_feed::ChangeFeed;
use crate::services::change_listener::{self, ListenerHandle};
use crate::services::reconciler::{self, ReconcileMessage, ViewState};
use crate::types::bookmark::Bookmark;
use crate::types::errors::StoreError;
use crate::types::identity::Identity;

pub struct BookmarkView {
    identity: Identity,
    listener: Option<ListenerHandle>,
    reconciler: Option<JoinHandle<ViewState>>,
    loader: Option<JoinHandle<()>>,
    updates: watch::Receiver<Vec<Bookmark>>,
}

impl BookmarkView {
    /// Subscribes to `identity`'s changes, then loads the initial snapshot
    /// in the background. The snapshot and live notifications race; the
    /// reconciler resolves the ordering.
    pub fn open(store: Arc<dyn BookmarkStore>, feed: &ChangeFeed, identity: Identity) -> Self {
        Self::start(store, feed, identity, None)
    }

    /// Like [`BookmarkView::open`], but the change subscription is released
    /// by itself once `current` no longer names `identity`.
    pub fn open_scoped(
        store: Arc<dyn BookmarkStore>,
        feed: &ChangeFeed,
        identity: Identity,
        current: watch::Receiver<Option<Identity>>,
    ) -> Self {
        Self::start(store, feed, identity, Some(current))
    }

    fn start(
        store: Arc<dyn BookmarkStore>,
        feed: &ChangeFeed,
        identity: Identity,
        current: Option<watch::Receiver<Option<Identity>>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (out, updates) = watch::channel(Vec::new());

        let listener = match current {
            Some(current) => change_listener::spawn_scoped(feed, &identity.id, tx.clone(), current),
            None => change_listener::spawn(feed, &identity.id, tx.clone()),
        };
        let reconciler = tokio::spawn(reconciler::run(ViewState::new(identity.id.clone()), rx, out));

        let owner = identity.id.clone();
        let loader = tokio::spawn(async move {
            let load = tokio::task::spawn_blocking(move || store.list_for_owner(&owner))
                .await
                .map_err(|e| StoreError::TaskFailed(e.to_string()))
                .and_then(|r| r);
            match load {
                Ok(snapshot) => {
                    let _ = tx.send(ReconcileMessage::InitialLoad(snapshot));
                }
                Err(e) => tracing::warn!(error = %e, "initial bookmark load failed"),
            }
        });

        tracing::debug!(user = %identity.id, "bookmark view opened");
        Self {
            identity,
            listener: Some(listener),
            reconciler: Some(reconciler),
            loader: Some(loader),
            updates,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The list as of the last reconciled message.
    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.updates.borrow().clone()
    }

    /// A receiver that observes every reconciled list.
    pub fn subscribe_updates(&self) -> watch::Receiver<Vec<Bookmark>> {
        self.updates.clone()
    }

    /// Waits until the reconciled list satisfies `pred`.
    pub async fn wait_for<F>(&mut self, mut pred: F) -> Vec<Bookmark>
    where
        F: FnMut(&[Bookmark]) -> bool,
    {
        let seen = self
            .updates
            .wait_for(|list| pred(list))
            .await
            .map(|list| list.clone());
        match seen {
            Ok(list) => list,
            Err(_) => self.bookmarks(),
        }
    }

    /// Tears the view down: stops the listener (releasing the subscription),
    /// drains the reconciler and returns its final state.
    pub async fn close(mut self) -> Option<ViewState> {
        if let Some(loader) = self.loader.take() {
            loader.abort();
            let _ = loader.await;
        }
        if let Some(listener) = self.listener.take() {
            listener.shutdown().await;
        }
        let state = match self.reconciler.take() {
            Some(task) => task.await.ok(),
            None => None,
        };
        tracing::debug!(user = %self.identity.id, "bookmark view closed");
        state
    }
}

impl Drop for BookmarkView {
    fn drop(&mut self) {
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
        if let Some(reconciler) = self.reconciler.take() {
            reconciler.abort();
        }
        // the listener handle releases its subscription in its own Drop
    }
}
