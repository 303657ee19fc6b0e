/// Error types for prompt-keeper
///
/// This module defines all possible errors that can occur in the library.
/// Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Main error type for prompt-keeper operations
#[derive(Error, Debug)]
pub enum KeeperError {
    /// Database-related errors that are neither timeouts nor corruption
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Lock or connection wait exceeded the configured bound
    #[error("Storage timeout: {0}")]
    StorageTimeout(String),

    /// Index and store disagree
    #[error("Storage corruption: {0}")]
    StorageCorruption(String),

    /// Record not found in the store
    #[error("Record not found: {0}")]
    NotFound(i64),

    /// The full-text engine rejected the query expression
    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    /// A newer search replaced this one before it was delivered
    #[error("Search was superseded by a newer query")]
    Superseded,

    /// The search worker is gone
    #[error("Search scheduler is not running")]
    SchedulerClosed,

    /// A query task died before reporting back
    #[error("Search worker failed: {0}")]
    Worker(String),

    /// I/O errors (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for prompt-keeper operations
pub type Result<T> = std::result::Result<T, KeeperError>;

// SQLite primary result codes
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl From<sqlx::Error> for KeeperError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                KeeperError::StorageTimeout("timed out waiting for a database connection".to_string())
            }
            sqlx::Error::Database(ref db_err) => {
                // Extended result codes keep the primary code in the low byte
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);

                match primary {
                    Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => {
                        KeeperError::StorageTimeout(db_err.message().to_string())
                    }
                    _ => KeeperError::Database(err),
                }
            }
            other => KeeperError::Database(other),
        }
    }
}

impl KeeperError {
    /// Whether the caller may retry the same operation later
    pub fn is_retryable(&self) -> bool {
        matches!(self, KeeperError::StorageTimeout(_))
    }

    /// Convert KeeperError to a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            KeeperError::Database(e) => {
                format!("Database error occurred. Please try again. Details: {}", e)
            }
            KeeperError::StorageTimeout(e) => {
                format!("The database is busy. Try again in a moment. Details: {}", e)
            }
            KeeperError::StorageCorruption(e) => {
                format!("The search index was out of date and has been rebuilt. Details: {}", e)
            }
            KeeperError::NotFound(id) => {
                format!("Prompt #{} no longer exists", id)
            }
            KeeperError::InvalidQuery(e) => {
                format!("Search syntax not understood: {}", e)
            }
            KeeperError::Superseded => "Search replaced by a newer one".to_string(),
            KeeperError::SchedulerClosed => "Search is shutting down".to_string(),
            KeeperError::Worker(e) => {
                format!("Search failed unexpectedly. Details: {}", e)
            }
            KeeperError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            KeeperError::Config(msg) => {
                format!("Configuration issue: {}", msg)
            }
            KeeperError::Serialization(e) => {
                format!("Data format error: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = KeeperError::NotFound(42);
        assert!(err.user_message().contains("42"));

        let err = KeeperError::StorageTimeout("database is locked".to_string());
        assert!(err.user_message().contains("busy"));
    }

    #[test]
    fn test_error_display() {
        let err = KeeperError::InvalidQuery("fts5: syntax error near \"\"".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Invalid search query"));
    }

    #[test]
    fn test_pool_timeout_is_storage_timeout() {
        let err: KeeperError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, KeeperError::StorageTimeout(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_row_not_found_stays_database_error() {
        let err: KeeperError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, KeeperError::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: KeeperError = json_err.into();
        assert!(matches!(err, KeeperError::Serialization(_)));
    }
}
