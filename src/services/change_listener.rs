//! Change Notification Listener.
//!
//! Owns a subscription to one identity's change stream and forwards every
//! event, in delivery order, onto the reconciler's queue. A scoped listener
//! also stops by itself once the signed-in identity is no longer its owner.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::services::change_feed::{ChangeFeed, Subscription};
use crate::services::reconciler::ReconcileMessage;
use crate::types::change::SubscriptionFilter;
use crate::types::identity::Identity;

/// Handle to a running listener task. The subscription is released when the
/// handle is shut down or dropped, whichever happens first.
pub struct ListenerHandle {
    owner: String,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Subscribes to `owner`'s inserts and deletes and spawns the forwarding task.
pub fn spawn(
    feed: &ChangeFeed,
    owner: &str,
    tx: mpsc::UnboundedSender<ReconcileMessage>,
) -> ListenerHandle {
    start(feed, owner, tx, None)
}

/// Like [`spawn`], but the task also releases its subscription as soon as
/// `identity` stops naming `owner` (sign-out or a different user).
pub fn spawn_scoped(
    feed: &ChangeFeed,
    owner: &str,
    tx: mpsc::UnboundedSender<ReconcileMessage>,
    identity: watch::Receiver<Option<Identity>>,
) -> ListenerHandle {
    start(feed, owner, tx, Some(identity))
}

fn start(
    feed: &ChangeFeed,
    owner: &str,
    tx: mpsc::UnboundedSender<ReconcileMessage>,
    scope: Option<watch::Receiver<Option<Identity>>>,
) -> ListenerHandle {
    // subscribe before spawning so nothing published after this call is missed
    let subscription = feed.subscribe(SubscriptionFilter::for_owner(owner));
    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(forward(subscription, tx, stop_rx, scope, owner.to_string()));
    ListenerHandle {
        owner: owner.to_string(),
        stop: Some(stop_tx),
        task: Some(task),
    }
}

/// Resolves once the watched identity is anyone but `owner`. Never resolves
/// for an unscoped listener or after the auth provider is gone.
async fn identity_left(scope: &mut Option<watch::Receiver<Option<Identity>>>, owner: &str) {
    let Some(identity) = scope else {
        return std::future::pending().await;
    };
    let left = identity
        .wait_for(|current| current.as_ref().map(|i| i.id.as_str()) != Some(owner))
        .await
        .is_ok();
    if !left {
        *scope = None;
        std::future::pending::<()>().await;
    }
}

async fn forward(
    mut subscription: Subscription,
    tx: mpsc::UnboundedSender<ReconcileMessage>,
    mut stop: oneshot::Receiver<()>,
    mut scope: Option<watch::Receiver<Option<Identity>>>,
    owner: String,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = identity_left(&mut scope, &owner) => {
                tracing::debug!(owner = %owner, "identity changed, change listener stopping");
                break;
            }
            event = subscription.next() => {
                let Some(event) = event else { break };
                if tx.send(ReconcileMessage::Change(event)).is_err() {
                    break;
                }
            }
        }
    }
    subscription.unsubscribe();
}

impl ListenerHandle {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Stops the task and waits until its subscription has been released.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "change listener task failed");
            }
        }
        tracing::debug!(owner = %self.owner, "change listener stopped");
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        // aborting drops the task's Subscription, which unsubscribes it
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
