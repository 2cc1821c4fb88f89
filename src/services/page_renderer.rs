//! Page Renderer for markd.
//!
//! Produces the single page: a sign-in prompt for anonymous users, or the
//! add form plus bookmark list for a signed-in user. The server-rendered
//! list is cached per (route, owner) and recomputed after the route is
//! revalidated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::managers::bookmark_manager::BookmarkStore;
use crate::managers::session_manager::AuthProvider;
use crate::services::revalidation::{RouteRevalidator, HOME_ROUTE};
use crate::types::bookmark::Bookmark;
use crate::types::errors::StoreError;
use crate::types::identity::{Identity, OAuthProvider};
use crate::types::page::{PageView, APP_TITLE, DASHBOARD_HEADING, EMPTY_STATE_MESSAGE, SIGN_IN_BLURB};

struct CachedSnapshot {
    generation: u64,
    bookmarks: Vec<Bookmark>,
}

pub struct PageRenderer {
    store: Arc<dyn BookmarkStore>,
    auth: Arc<dyn AuthProvider>,
    revalidator: Arc<RouteRevalidator>,
    /// Keyed by owner id; holds at most the current identity's entry.
    cache: Mutex<HashMap<String, CachedSnapshot>>,
}

impl PageRenderer {
    pub fn new(
        store: Arc<dyn BookmarkStore>,
        auth: Arc<dyn AuthProvider>,
        revalidator: Arc<RouteRevalidator>,
    ) -> Self {
        Self {
            store,
            auth,
            revalidator,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Builds the page for the current identity. There is only one page:
    /// any other route is served the home page and shares its cache entry.
    pub fn render(&self, route: &str) -> Result<PageView, StoreError> {
        if !is_known_route(route) {
            tracing::debug!(route, "unknown route, serving home");
        }
        let Some(identity) = self.auth.current_identity() else {
            return Ok(sign_in_page());
        };
        let bookmarks = self.snapshot(&identity)?;
        Ok(dashboard_page(identity, bookmarks))
    }

    /// Drops the cached list for `owner`. Called when that identity signs out.
    pub fn evict(&self, owner: &str) {
        let mut cache = match self.cache.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        if cache.remove(owner).is_some() {
            tracing::trace!(owner, "snapshot evicted");
        }
    }

    /// Number of owners with a cached list.
    pub fn cached_owners(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Server-side list for the home route, newest first. Reuses the cached
    /// copy until the route's generation moves.
    fn snapshot(&self, identity: &Identity) -> Result<Vec<Bookmark>, StoreError> {
        let generation = self.revalidator.generation(HOME_ROUTE);

        let mut cache = self.cache.lock().map_err(|_| StoreError::LockPoisoned)?;
        // only the current identity's list is kept
        cache.retain(|owner, _| owner == &identity.id);
        if let Some(hit) = cache.get(&identity.id) {
            if hit.generation == generation {
                return Ok(hit.bookmarks.clone());
            }
        }

        let bookmarks = self.store.list_for_owner(&identity.id)?;
        tracing::trace!(owner = %identity.id, generation, "snapshot recomputed");
        cache.insert(
            identity.id.clone(),
            CachedSnapshot {
                generation,
                bookmarks: bookmarks.clone(),
            },
        );
        Ok(bookmarks)
    }
}

/// Whether `route` names the page. An empty route means home.
pub fn is_known_route(route: &str) -> bool {
    route == HOME_ROUTE || route.is_empty()
}

pub fn sign_in_page() -> PageView {
    PageView::SignIn {
        title: APP_TITLE.to_string(),
        blurb: SIGN_IN_BLURB.to_string(),
        provider: OAuthProvider::Google.as_str().to_string(),
    }
}

pub fn dashboard_page(identity: Identity, bookmarks: Vec<Bookmark>) -> PageView {
    let empty_message = bookmarks
        .is_empty()
        .then(|| EMPTY_STATE_MESSAGE.to_string());
    PageView::Dashboard {
        heading: DASHBOARD_HEADING.to_string(),
        identity,
        bookmarks,
        empty_message,
    }
}

/// Escapes text for HTML element content and quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// True for `http:` and `https:` urls, compared case-insensitively.
pub fn is_web_url(url: &str) -> bool {
    let url = url.trim_start();
    ["http://", "https://"].iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Renders a page model as an HTML fragment.
pub fn render_html(page: &PageView) -> String {
    let mut html = String::with_capacity(2048);
    match page {
        PageView::SignIn {
            title,
            blurb,
            provider,
        } => {
            html.push_str("<main class=\"sign-in\">\n");
            html.push_str(&format!("  <h1>{}</h1>\n", escape_html(title)));
            html.push_str(&format!("  <p>{}</p>\n", escape_html(blurb)));
            html.push_str(&format!(
                "  <button data-action=\"auth.sign_in\" data-provider=\"{}\">Sign in with Google</button>\n",
                escape_html(provider)
            ));
            html.push_str("</main>\n");
        }
        PageView::Dashboard {
            heading,
            identity,
            bookmarks,
            empty_message,
        } => {
            html.push_str("<main class=\"dashboard\">\n");
            html.push_str(&format!("  <h1>{}</h1>\n", escape_html(heading)));
            if let Some(email) = &identity.email {
                html.push_str(&format!("  <span class=\"user\">{}</span>\n", escape_html(email)));
            }
            html.push_str("  <button data-action=\"auth.sign_out\">Sign out</button>\n");
            html.push_str("  <form data-action=\"bookmark.create\">\n");
            html.push_str("    <label for=\"title\">Title</label>\n");
            html.push_str("    <input type=\"text\" name=\"title\" id=\"title\" required placeholder=\"e.g. My Favorite Blog\">\n");
            html.push_str("    <label for=\"url\">URL</label>\n");
            html.push_str("    <input type=\"url\" name=\"url\" id=\"url\" required placeholder=\"https://example.com\">\n");
            html.push_str("    <button type=\"submit\">Add Bookmark</button>\n");
            html.push_str("  </form>\n");
            match empty_message {
                Some(msg) => html.push_str(&format!("  <p class=\"empty\">{}</p>\n", escape_html(msg))),
                None => {
                    html.push_str("  <ul class=\"bookmarks\">\n");
                    for b in bookmarks {
                        let url = escape_html(&b.url);
                        // urls are stored unvalidated; only web schemes become links
                        let link = if is_web_url(&b.url) {
                            format!(
                                "<a href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\">{url}</a>",
                                url = url
                            )
                        } else {
                            format!("<span class=\"url\">{}</span>", url)
                        };
                        html.push_str(&format!(
                            "    <li data-id=\"{id}\"><h3>{title}</h3>{link}\
                             <button data-action=\"bookmark.delete\" data-id=\"{id}\" aria-label=\"Delete bookmark\">Delete</button></li>\n",
                            id = escape_html(&b.id),
                            title = escape_html(&b.title),
                            link = link,
                        ));
                    }
                    html.push_str("  </ul>\n");
                }
            }
            html.push_str("</main>\n");
        }
    }
    html
}
