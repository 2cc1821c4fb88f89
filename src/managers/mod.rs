// markd managers
// Managers own persistent state: bookmarks and auth sessions.

pub mod bookmark_manager;
pub mod session_manager;
