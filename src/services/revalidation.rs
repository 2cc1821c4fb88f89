//! Route revalidation.
//!
//! Mutations ask for the server-rendered snapshot of a route to be
//! recomputed. This is unrelated to the change stream: it only bumps a
//! per-route generation that snapshot caches compare against.

use std::collections::HashMap;
use std::sync::Mutex;

/// The route the bookmark page is served on.
pub const HOME_ROUTE: &str = "/";

/// Produced after each successful mutation.
pub trait RefreshSignal: Send + Sync {
    fn request_refresh(&self, route: &str);
}

/// Tracks a generation counter per route.
#[derive(Default)]
pub struct RouteRevalidator {
    generations: Mutex<HashMap<String, u64>>,
}

impl RouteRevalidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation of `route`; 0 if it was never revalidated.
    pub fn generation(&self, route: &str) -> u64 {
        self.generations
            .lock()
            .map(|g| g.get(route).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl RefreshSignal for RouteRevalidator {
    fn request_refresh(&self, route: &str) {
        let mut generations = match self.generations.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let counter = generations.entry(route.to_string()).or_insert(0);
        *counter += 1;
        tracing::trace!(route, generation = *counter, "route revalidated");
    }
}
