// markd services
// Services provide the live pieces: change feed, listener, reconciler, mutations, pages, auth plumbing.

pub mod bookmark_view;
pub mod change_feed;
pub mod change_listener;
pub mod config_loader;
pub mod mutation_service;
pub mod oauth_client;
pub mod page_renderer;
pub mod reconciler;
pub mod revalidation;
pub mod token_service;
