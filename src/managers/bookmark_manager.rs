//! Bookmark Manager for markd.
//!
//! Implements `BookmarkStore`, the owner-scoped persistent store for
//! bookmarks, backed by SQLite via `rusqlite`. Every applied insert or delete
//! is published on the [`ChangeFeed`] before the connection lock is released.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::params;
use uuid::Uuid;

use crate::database::connection::Database;
use crate::services::change_feed::ChangeFeed;
use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::change::ChangeEvent;
use crate::types::errors::StoreError;

/// Owner-scoped store operations. Every method takes the owner's user id and
/// never touches rows belonging to anyone else.
pub trait BookmarkStore: Send + Sync {
    /// All bookmarks for `owner`, newest first.
    fn list_for_owner(&self, owner: &str) -> Result<Vec<Bookmark>, StoreError>;
    /// Inserts a bookmark owned by `owner`. The store assigns id and timestamp.
    fn insert(&self, owner: &str, new: &NewBookmark) -> Result<Bookmark, StoreError>;
    /// Deletes the row matching `(id, owner)`. Returns `false` when nothing matched.
    fn delete(&self, owner: &str, id: &str) -> Result<bool, StoreError>;
}

/// Bookmark store backed by a shared SQLite database.
pub struct BookmarkManager {
    db: Arc<Database>,
    feed: ChangeFeed,
}

impl BookmarkManager {
    /// Creates a new `BookmarkManager` publishing changes on `feed`.
    pub fn new(db: Arc<Database>, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    /// Returns the current UNIX timestamp in milliseconds.
    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    /// Reads a single `Bookmark` row into a struct.
    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            created_at: row.get(3)?,
            owner: row.get(4)?,
        })
    }

    /// Fetches one bookmark by id within an owner's rows.
    pub fn get(&self, owner: &str, id: &str) -> Result<Option<Bookmark>, StoreError> {
        let conn = self.db.connection()?;
        let result = conn.query_row(
            "SELECT id, title, url, created_at, user_id FROM bookmarks WHERE id = ?1 AND user_id = ?2",
            params![id, owner],
            Self::row_to_bookmark,
        );
        match result {
            Ok(bm) => Ok(Some(bm)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl BookmarkStore for BookmarkManager {
    fn list_for_owner(&self, owner: &str) -> Result<Vec<Bookmark>, StoreError> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, url, created_at, user_id FROM bookmarks \
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map(params![owner], Self::row_to_bookmark)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn insert(&self, owner: &str, new: &NewBookmark) -> Result<Bookmark, StoreError> {
        let bookmark = Bookmark {
            id: Uuid::new_v4().to_string(),
            title: new.title.clone(),
            url: new.url.clone(),
            created_at: Self::now_millis(),
            owner: owner.to_string(),
        };

        let conn = self.db.connection()?;
        conn.execute(
            "INSERT INTO bookmarks (id, title, url, created_at, user_id) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                bookmark.id,
                bookmark.title,
                bookmark.url,
                bookmark.created_at,
                bookmark.owner
            ],
        )?;

        // publish under the connection lock so delivery order matches apply order
        self.feed.publish(&ChangeEvent::Insert {
            record: bookmark.clone(),
        });
        drop(conn);

        tracing::debug!(id = %bookmark.id, owner = %owner, "bookmark inserted");
        Ok(bookmark)
    }

    fn delete(&self, owner: &str, id: &str) -> Result<bool, StoreError> {
        let conn = self.db.connection()?;
        let affected = conn.execute(
            "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2",
            params![id, owner],
        )?;

        if affected == 0 {
            return Ok(false);
        }

        self.feed.publish(&ChangeEvent::Delete {
            id: id.to_string(),
            owner: owner.to_string(),
        });
        drop(conn);

        tracing::debug!(id = %id, owner = %owner, "bookmark deleted");
        Ok(true)
    }
}
