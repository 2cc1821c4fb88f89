//! App Core for markd.
//!
//! Builds every component once and hands each one its collaborators
//! explicitly: store, auth provider, change feed and refresh signal.

use std::path::Path;
use std::sync::Arc;

use crate::database::connection::Database;
use crate::managers::bookmark_manager::{BookmarkManager, BookmarkStore};
use crate::managers::session_manager::{AuthProvider, SessionManager};
use crate::services::bookmark_view::BookmarkView;
use crate::services::change_feed::ChangeFeed;
use crate::services::config_loader;
use crate::services::mutation_service::MutationService;
use crate::services::oauth_client::OAuthClient;
use crate::services::page_renderer::PageRenderer;
use crate::services::revalidation::RouteRevalidator;
use crate::types::config::AppConfig;

/// Central application struct holding all managers and services.
pub struct App {
    pub config: AppConfig,
    pub db: Arc<Database>,
    pub feed: ChangeFeed,
    pub store: Arc<BookmarkManager>,
    pub sessions: Arc<SessionManager>,
    pub revalidator: Arc<RouteRevalidator>,
    pub mutations: Arc<MutationService>,
    pub pages: PageRenderer,
    pub oauth: OAuthClient,
}

impl App {
    /// Opens the database named by `config` and wires the components.
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let path = config_loader::database_path(&config);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_database(config, Database::open(&path)?)
    }

    /// Opens a database at an explicit path, ignoring `config.storage`.
    pub fn open_at<P: AsRef<Path>>(
        config: AppConfig,
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::with_database(config, Database::open(path)?)
    }

    /// In-memory database, for tests.
    pub fn in_memory(config: AppConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::with_database(config, Database::open_in_memory()?)
    }

    fn with_database(
        config: AppConfig,
        db: Database,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let db = Arc::new(db);
        let feed = ChangeFeed::new();
        let store = Arc::new(BookmarkManager::new(db.clone(), feed.clone()));
        let sessions = Arc::new(SessionManager::new(db.clone(), config.oauth.clone()));
        let revalidator = Arc::new(RouteRevalidator::new());

        let mutations = Arc::new(MutationService::new(
            store.clone(),
            sessions.clone(),
            revalidator.clone(),
        ));
        let pages = PageRenderer::new(store.clone(), sessions.clone(), revalidator.clone());
        let oauth = OAuthClient::new(config.oauth.clone())
            .map_err(|e| format!("OAuthClient init failed: {}", e))?;

        Ok(Self {
            config,
            db,
            feed,
            store,
            sessions,
            revalidator,
            mutations,
            pages,
            oauth,
        })
    }

    /// Opens a live view for the signed-in identity. `None` without a session.
    ///
    /// The view stops receiving changes as soon as that identity signs out or
    /// another one signs in, however the switch happens. Its tasks still run
    /// until the caller closes or drops it.
    pub fn open_view(&self) -> Option<BookmarkView> {
        // subscribe first so a sign-out racing this call is still observed
        let current = self.sessions.watch_identity();
        let identity = self.sessions.current_identity()?;
        let store: Arc<dyn BookmarkStore> = self.store.clone();
        Some(BookmarkView::open_scoped(store, &self.feed, identity, current))
    }
}
