//! CastSense Store: SQLite persistence for the collected corpus and its
//! attributions. One database per season.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
