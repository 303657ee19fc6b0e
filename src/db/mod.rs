/// Database module for prompt-keeper
///
/// Handles all database operations using SQLite and sqlx: the record store
/// and the full-text index derived from it.

pub mod connection;
pub mod fts;
pub mod models;
pub mod queries;

pub use connection::{Database, DatabaseStats};
pub use fts::{prepare_match_expression, IndexHealth};
pub use models::*;
