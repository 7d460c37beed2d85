//! # Error Types
//!
//! Domain error types for almacen-core.
//!
//! ## Error Hierarchy
//! ```text
//! almacen-core errors (this file)
//! ├── CoreError        - Business rule violations (typed, never retried)
//! └── ValidationError  - Malformed input, caller's responsibility to fix
//!
//! almacen-db errors (separate crate)
//! ├── DbError          - Persistence failures, incl. ConflictRetryExhausted
//! └── LedgerError      - CoreError ⊕ DbError, what service callers see
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derives, never manual impls
//! 2. Every variant carries the identifier needed to correct the call
//!    (stock entry id, plan id, line index)
//! 3. Errors are enum variants, never strings

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// These are terminal for the operation that raised them: the surrounding
/// transaction rolls back and the caller receives the specific variant.
/// They are never silently retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A reservation asked for more units than the entry holds.
    ///
    /// `line` is the zero-based index of the offending line in the request,
    /// `None` when the operation was not line-structured.
    #[error(
        "insufficient stock for entry {stock_entry_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        stock_entry_id: String,
        available: i64,
        requested: i64,
        line: Option<usize>,
    },

    /// The variant key or stock entry id does not exist.
    ///
    /// Reserving never creates entries; only purchase intake and the
    /// explicit create operation do.
    #[error("stock entry not found: {0}")]
    StockEntryNotFound(String),

    /// A sale referenced by id does not exist.
    #[error("sale not found: {0}")]
    SaleNotFound(String),

    /// A layaway plan referenced by id does not exist.
    #[error("layaway plan not found: {0}")]
    PlanNotFound(String),

    /// The layaway plan is not in a state that allows the operation.
    ///
    /// `Completed` and `Cancelled` are terminal: no abonos, no cancellation,
    /// no transitions out.
    #[error("plan {plan_id} is {current_state}, cannot {operation}")]
    InvalidPlanState {
        plan_id: String,
        current_state: String,
        operation: String,
    },

    /// The sale is not in a state that allows the operation.
    #[error("sale {sale_id} is {current_status}, cannot {operation}")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
        operation: String,
    },

    /// Input validation failure (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any persistence work starts. The request layer is expected
/// to validate shapes too, but the core re-checks every business constraint:
/// never trust the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// A line-structured request has no lines.
    #[error("{field} must contain at least one line")]
    EmptyLines { field: String },

    /// A monetary computation overflowed i64 cents.
    #[error("{field} overflows the monetary range")]
    AmountOverflow { field: String },

    /// Invalid format (e.g. not a UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Shorthand for `Required`.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for `MustBePositive`.
    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
