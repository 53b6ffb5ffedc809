//! TabVault database layer.
//!
//! Provides SQLite connection management, schema migrations, and the
//! session store.
//!
//! # Usage
//!
//! ```no_run
//! use tabvault::database::{Database, SessionStore};
//!
//! // Open a persistent database
//! let db = Database::open("tabvault.db").expect("failed to open database");
//!
//! // Or use an in-memory database for testing
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//!
//! // Stores borrow the locked connection and are created on demand
//! let conn = db.connection();
//! let store = SessionStore::new(&conn);
//! ```

pub mod connection;
pub mod migrations;
pub mod store;

pub use connection::Database;
pub use store::SessionStore;
