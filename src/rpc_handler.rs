//! RPC method handler for the markd JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` dispatches a method call to the `App` components; live
//! view updates are pushed onto the context's event queue.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::app::App;
use crate::managers::bookmark_manager::BookmarkStore;
use crate::managers::session_manager::AuthProvider;
use crate::services::bookmark_view::BookmarkView;
use crate::services::page_renderer::{is_known_route, render_html};
use crate::services::revalidation::HOME_ROUTE;
use crate::types::identity::{Identity, OAuthProvider};

/// Per-connection state: the app, open views, and the outbound event queue.
pub struct RpcContext {
    pub app: Arc<App>,
    views: Mutex<HashMap<String, BookmarkView>>,
    events: mpsc::UnboundedSender<Value>,
}

impl RpcContext {
    pub fn new(app: Arc<App>, events: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            app,
            views: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub async fn open_view_count(&self) -> usize {
        self.views.lock().await.len()
    }

    /// Tears down every open view. Called whenever the identity changes.
    pub async fn close_all_views(&self) {
        let views: Vec<(String, BookmarkView)> = self.views.lock().await.drain().collect();
        for (view_id, view) in views {
            view.close().await;
            tracing::debug!(view_id = %view_id, "view closed");
        }
    }

    async fn switch_identity(&self, next: &Identity, previous: Option<Identity>) {
        if previous.as_ref().map(|p| &p.id) != Some(&next.id) {
            self.close_all_views().await;
            if let Some(previous) = previous {
                self.app.pages.evict(&previous.id);
            }
        }
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(ctx: &RpcContext, method: &str, params: &Value) -> Result<Value, String> {
    let app = &ctx.app;
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Auth ───
        "auth.sign_in" => {
            let name = str_param(params, "provider").unwrap_or("google");
            let provider = OAuthProvider::parse(name)
                .ok_or_else(|| format!("unsupported provider: {}", name))?;
            let redirect = app.sessions.sign_in(provider).map_err(|e| e.to_string())?;
            Ok(json!({"redirect_url": redirect.url, "state": redirect.state}))
        }
        "auth.callback" => {
            let state = str_param(params, "state").ok_or("missing state")?;
            let code = str_param(params, "code").ok_or("missing code")?;
            let pending = app
                .sessions
                .take_pending_sign_in(state)
                .map_err(|e| e.to_string())?;
            let profile = app
                .oauth
                .exchange_code(code, &pending.code_verifier)
                .await
                .map_err(|e| e.to_string())?;
            let previous = app.sessions.current_identity();
            let issued = app
                .sessions
                .establish_session(pending.provider, &profile)
                .map_err(|e| e.to_string())?;
            ctx.switch_identity(&issued.identity, previous).await;
            Ok(json!({"token": issued.token, "user": issued.identity}))
        }
        "auth.resume" => {
            let token = str_param(params, "token").ok_or("missing token")?;
            let previous = app.sessions.current_identity();
            let identity = app.sessions.resume(token).map_err(|e| e.to_string())?;
            ctx.switch_identity(&identity, previous).await;
            Ok(json!({"user": identity}))
        }
        "auth.sign_out" => {
            ctx.close_all_views().await;
            let previous = app.sessions.current_identity();
            app.sessions.sign_out().map_err(|e| e.to_string())?;
            if let Some(previous) = previous {
                app.pages.evict(&previous.id);
            }
            Ok(json!({"ok": true}))
        }
        "auth.whoami" => Ok(json!({"user": app.sessions.current_identity()})),

        // ─── Bookmarks ───
        "bookmark.create" => {
            app.mutations
                .create_bookmark(str_param(params, "title"), str_param(params, "url"))
                .await;
            Ok(json!({"ok": true}))
        }
        "bookmark.delete" => {
            let id = str_param(params, "id").ok_or("missing id")?;
            app.mutations.delete_bookmark(id).await;
            Ok(json!({"ok": true}))
        }
        "bookmark.list" => {
            let items = match app.sessions.current_identity() {
                Some(identity) => app
                    .store
                    .list_for_owner(&identity.id)
                    .map_err(|e| e.to_string())?,
                None => Vec::new(),
            };
            Ok(json!({"items": items}))
        }

        // ─── Page ───
        "page.render" => {
            let route = str_param(params, "route").unwrap_or(HOME_ROUTE);
            if !is_known_route(route) {
                return Err(format!("unknown route: {}", route));
            }
            let page = app.pages.render(route).map_err(|e| e.to_string())?;
            let html = render_html(&page);
            Ok(json!({"page": page, "html": html}))
        }

        // ─── Live views ───
        "view.open" => {
            let view = app.open_view().ok_or("not signed in")?;
            let view_id = Uuid::new_v4().to_string();
            let mut updates = view.subscribe_updates();
            let events = ctx.events.clone();
            let forward_id = view_id.clone();
            tokio::spawn(async move {
                while updates.changed().await.is_ok() {
                    let bookmarks = updates.borrow_and_update().clone();
                    let event = json!({
                        "event": "view.update",
                        "view_id": forward_id,
                        "bookmarks": bookmarks,
                    });
                    if events.send(event).is_err() {
                        break;
                    }
                }
            });
            ctx.views.lock().await.insert(view_id.clone(), view);
            Ok(json!({"view_id": view_id}))
        }
        "view.close" => {
            let view_id = str_param(params, "view_id").ok_or("missing view_id")?;
            let view = ctx.views.lock().await.remove(view_id);
            match view {
                Some(view) => {
                    view.close().await;
                    Ok(json!({"ok": true}))
                }
                None => Err(format!("unknown view: {}", view_id)),
            }
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
