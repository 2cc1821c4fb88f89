use serde::{Deserialize, Serialize};

/// A stored bookmark. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Milliseconds since the UNIX epoch.
    pub created_at: i64,
    /// User id of the identity that created the bookmark.
    pub owner: String,
}

/// Caller-supplied fields for a bookmark insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
}

impl NewBookmark {
    /// Builds a `NewBookmark` when both fields are present and non-empty.
    ///
    /// The url is only checked for presence, not parsed.
    pub fn from_form(title: Option<&str>, url: Option<&str>) -> Option<Self> {
        match (title, url) {
            (Some(t), Some(u)) if !t.is_empty() && !u.is_empty() => Some(Self {
                title: t.to_string(),
                url: u.to_string(),
            }),
            _ => None,
        }
    }
}
