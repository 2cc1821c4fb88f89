//! markd database layer.
//!
//! Provides SQLite connection management and schema migrations.
//!
//! # Usage
//!
//! ```no_run
//! use markd::database::Database;
//!
//! // Open a persistent database
//! let db = Database::open("markd.db").expect("failed to open database");
//!
//! // Or use an in-memory database for testing
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//!
//! // Lock the underlying connection for queries
//! let conn = db.connection().expect("connection lock poisoned");
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
