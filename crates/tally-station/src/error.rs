//! # Station Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Station Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Locking      │  │   Passed Through        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  LockDenied     │  │  Store  (DbError)       │ │
//! │  │  ConfigLoad     │  │  NotLocked      │  │  Ledger (CoreError)     │ │
//! │  │  ConfigSave     │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Only a stale revision is worth retrying: re-read, re-apply, re-put.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tally_core::CoreError;
use tally_db::DbError;
use thiserror::Error;

/// Result type alias for station operations.
pub type StationResult<T> = Result<T, StationError>;

#[derive(Debug, Error)]
pub enum StationError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid station configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Locking Errors
    // =========================================================================
    /// Another station holds the order.
    ///
    /// ## When This Occurs
    /// `try_lock` (and so every `OrderEditor` call) on an order another
    /// station locked at the same or a newer revision. Shown to the user as
    /// "someone else is editing this order"; never retried automatically.
    #[error("The Order is already locked by a different station.")]
    LockDenied {
        order_id: String,
        station_name: String,
        employee_id: String,
    },

    /// The lock was taken over between acquire and persist.
    #[error("Order {order_id} is no longer locked by this station")]
    NotLocked { order_id: String },

    // =========================================================================
    // Passed Through
    // =========================================================================
    #[error(transparent)]
    Store(#[from] DbError),

    #[error(transparent)]
    Ledger(#[from] CoreError),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Reconciler is shut down")]
    Shutdown,
}

impl From<toml::de::Error> for StationError {
    fn from(err: toml::de::Error) -> Self {
        StationError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for StationError {
    fn from(err: toml::ser::Error) -> Self {
        StationError::ConfigSaveFailed(err.to_string())
    }
}

impl StationError {
    /// True for stale-revision conflicts only.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StationError::Store(err) if err.is_conflict())
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StationError::InvalidConfig(_)
                | StationError::ConfigLoadFailed(_)
                | StationError::ConfigSaveFailed(_)
        )
    }

    pub fn is_lock_error(&self) -> bool {
        matches!(
            self,
            StationError::LockDenied { .. } | StationError::NotLocked { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_stale_revisions_retry() {
        let stale: StationError = DbError::stale("o1", Some("1-a"), Some("2-b")).into();
        assert!(stale.is_retryable());

        let missing: StationError = DbError::not_found("order", "o1").into();
        assert!(!missing.is_retryable());

        let denied = StationError::LockDenied {
            order_id: "o1".into(),
            station_name: "Bar".into(),
            employee_id: "e1".into(),
        };
        assert!(!denied.is_retryable());
        assert!(denied.is_lock_error());
    }

    #[test]
    fn test_error_display() {
        let denied = StationError::LockDenied {
            order_id: "o1".into(),
            station_name: "Bar".into(),
            employee_id: "e1".into(),
        };
        assert_eq!(
            denied.to_string(),
            "The Order is already locked by a different station."
        );

        let ledger: StationError = CoreError::NothingToCheckout.into();
        assert_eq!(ledger.to_string(), CoreError::NothingToCheckout.to_string());
        assert!(StationError::InvalidConfig("x".into()).is_config_error());
    }
}
