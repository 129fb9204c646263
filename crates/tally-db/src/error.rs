//! # Database Error Types
//!
//! Error types for document store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)     revision mismatch on put               │
//! │       │                                │                                │
//! │       ▼                                ▼                                │
//! │  DbError (this module)  ◄──── StaleRevision { id, expected, actual }   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StationError::Store (tally-station) ← lock writes retry on conflict   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Document store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Document not found.
    ///
    /// ## When This Occurs
    /// - Deleting a document that does not exist
    /// - Loading an order id that was never written
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The document changed since the caller read it.
    ///
    /// ## When This Occurs
    /// - Another station saved the order first
    /// - Creating a document that already exists (`expected` is empty)
    /// - Updating a document that was deleted (`actual` is empty)
    ///
    /// The caller re-reads and decides; nothing is merged automatically.
    #[error("Stale revision for {id}: expected '{expected}', found '{actual}'")]
    StaleRevision {
        id: String,
        expected: String,
        actual: String,
    },

    /// A revision string without a `<counter>-` prefix.
    #[error("Invalid revision: {0}")]
    InvalidRevision(String),

    /// Document body could not be (de)serialized.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a StaleRevision error. `None` renders as an empty revision.
    pub fn stale(id: impl Into<String>, expected: Option<&str>, actual: Option<&str>) -> Self {
        DbError::StaleRevision {
            id: id.into(),
            expected: expected.unwrap_or_default().to_string(),
            actual: actual.unwrap_or_default().to_string(),
        }
    }

    /// A concurrent writer got there first; re-read and try again.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::StaleRevision { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → DbError::QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Document", "unknown"),
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_message_and_conflict() {
        let err = DbError::stale("ord-1", Some("3-aa"), Some("4-bb"));
        assert_eq!(
            err.to_string(),
            "Stale revision for ord-1: expected '3-aa', found '4-bb'"
        );
        assert!(err.is_conflict());
        assert!(!DbError::not_found("Order", "x").is_conflict());
    }

    #[test]
    fn test_stale_create_renders_empty_expected() {
        let err = DbError::stale("lo_s1", None, Some("1-aa"));
        assert!(err.to_string().contains("expected ''"));
    }
}
