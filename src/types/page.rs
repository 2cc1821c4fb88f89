use serde::Serialize;

use super::bookmark::Bookmark;
use super::identity::Identity;

pub const APP_TITLE: &str = "Smart Bookmark App";
pub const SIGN_IN_BLURB: &str = "A simple, secure bookmark manager. Sign in to save your favorite links and access them from anywhere in real-time.";
pub const DASHBOARD_HEADING: &str = "My Bookmarks";
pub const EMPTY_STATE_MESSAGE: &str = "No bookmarks yet. Add one above!";

/// The single page, as data. Front ends render this; `page_renderer` also
/// produces HTML from it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageView {
    /// Unauthenticated: sign-in prompt only, no form, no list.
    SignIn {
        title: String,
        blurb: String,
        provider: String,
    },
    /// Authenticated: add form plus the bookmark list or the empty state.
    Dashboard {
        heading: String,
        identity: Identity,
        bookmarks: Vec<Bookmark>,
        empty_message: Option<String>,
    },
}

impl PageView {
    pub fn is_sign_in(&self) -> bool {
        matches!(self, PageView::SignIn { .. })
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        match self {
            PageView::SignIn { .. } => &[],
            PageView::Dashboard { bookmarks, .. } => bookmarks,
        }
    }
}
