//! # Error Types
//!
//! Ledger-level failures. Every variant here is a refusal: the mutation
//! engine checks first and changes nothing when it returns one.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                          │
//! │  ├── CoreError        - Refused ledger mutations                        │
//! │  └── ValidationError  - Bad input (empty reason, zero count...)         │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                       │
//! │  └── DbError          - Store failures, stale revision conflicts        │
//! │                                                                         │
//! │  tally-station errors                                                   │
//! │  └── StationError     - LockDenied, config, wraps both of the above     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StationError → UI                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// A ledger mutation that was refused.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The order is already checked or voided.
    ///
    /// ## When This Occurs
    /// - Printing, re-billing or moving items on a paid-out order
    /// - Another station closed the order and this one replayed a stale edit
    #[error("Order {order_id} is closed ({status})")]
    OrderClosed { order_id: String, status: String },

    /// The order hit the item-count or total ceiling.
    #[error("Order {order_id} cannot take more items: {reason}")]
    OrderNotMutable { order_id: String, reason: String },

    /// Merging would drop the payments recorded on this order's bills.
    #[error("Order {0} already has paid bills")]
    OrderHasPayments(String),

    /// None of the selected items is still new or submitted.
    #[error("Nothing to void: no selected item is new or submitted")]
    NothingToVoid,

    /// Every item is already billed.
    #[error("Nothing to check out: every item is already billed")]
    NothingToCheckout,

    #[error("Bill not found: {0}")]
    BillNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Only paid bills can be voided.
    #[error("Bill {0} is not paid")]
    BillNotPaid(String),

    #[error("Bill {0} is already paid")]
    BillAlreadyPaid(String),

    /// Removing a split bill needs another unpaid sibling to absorb it.
    ///
    /// ## User Workflow
    /// ```text
    /// Bill #1 (split, paid) ── Bill #2 (split, unpaid)
    ///                               │
    ///                   Remove ──►  │  no unpaid sibling left
    ///                               ▼
    ///                         NoMergeTarget
    /// ```
    #[error("Bill {0} has no bill to merge into")]
    NoMergeTarget(String),

    /// An operation that needs a selection got none.
    #[error("Nothing selected: {0}")]
    EmptySelection(&'static str),

    /// Only `new` transactions can be voided.
    #[error("Transaction {trans_id} cannot be voided ({status})")]
    TransactionNotVoidable { trans_id: String, status: String },

    /// Only `new` cash/custom/card-sale transactions accept a tip adjustment.
    #[error("Transaction {trans_id} does not accept tip adjustments")]
    TransactionNotAdjustable { trans_id: String },

    #[error("Transaction {0} is already settled")]
    TransactionAlreadySettled(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., a revision without a counter).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
