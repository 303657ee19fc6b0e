/// prompt-keeper library
///
/// A local prompt library: SQLite storage with a full-text index, debounced
/// search, and a small cache for detail views.

pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod intelligence;
pub mod logging;

// Re-exports for convenience
pub use config::Settings;
pub use crate::core::PromptLibrary;
pub use db::Database;
pub use error::{KeeperError, Result};
