//! # Validation Module
//!
//! Input checks run before any ledger mutation touches state.
//!
//! ```text
//! UI input ──► validate_*  ──► engine mutation ──► caller persists
//!                  │
//!                  └── Err(ValidationError): nothing changed
//! ```

use crate::error::ValidationError;
use crate::model::MAX_ITEM_COUNT;

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest reason text kept on a voided item or transaction.
pub const MAX_REASON_LEN: usize = 200;

/// A void/adjust reason: non-blank, at most [`MAX_REASON_LEN`] characters.
///
/// ```rust
/// use tally_core::validation::validate_reason;
///
/// assert!(validate_reason("void reason", "sent to wrong table").is_ok());
/// assert!(validate_reason("void reason", "   ").is_err());
/// ```
pub fn validate_reason(field: &str, reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_REASON_LEN,
        });
    }
    Ok(())
}

/// Units on one line: 1 to [`MAX_ITEM_COUNT`].
pub fn validate_count(count: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_COUNT).contains(&count) {
        return Err(ValidationError::OutOfRange {
            field: "count".to_string(),
            min: 1,
            max: MAX_ITEM_COUNT,
        });
    }
    Ok(())
}

/// Units moved off a bill line holding `available`.
pub fn validate_move_count(count: i64, available: i64) -> ValidationResult<()> {
    if count <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "moved count".to_string(),
        });
    }
    if count > available {
        return Err(ValidationError::OutOfRange {
            field: "moved count".to_string(),
            min: 1,
            max: available,
        });
    }
    Ok(())
}

/// A document revision must start with `<counter>-`.
pub fn validate_revision(revision: &str) -> ValidationResult<()> {
    match revision.split_once('-') {
        Some((counter, _)) if !counter.is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: "revision".to_string(),
            reason: format!("expected <counter>-<hash>, got '{revision}'"),
        }),
    }
}
