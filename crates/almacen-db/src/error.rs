//! # Database Error Types
//!
//! Error types for the persistence and service layers.
//!
//! ## Error Flow
//! ```text
//! sqlx::Error ──► DbError (categorized, this module)
//!                    │
//! CoreError ─────────┼──► LedgerError (what service callers receive)
//! ```
//!
//! The split matters for retries: `DbError::is_conflict` identifies transient
//! writer contention that the services retry transparently; business errors
//! (`CoreError`) are terminal and surface immediately.

use almacen_core::CoreError;
use thiserror::Error;

// =============================================================================
// Db Error
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in the database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (e.g. duplicate variant key).
    #[error("duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint fired.
    ///
    /// The schema restates the ledger invariants (non-negative stock, debt,
    /// totals); seeing this error means a service-layer bug was caught by
    /// the second line of defense.
    #[error("check constraint violated: {message}")]
    CheckViolation { message: String },

    /// Another writer holds the database; transient, retried by services.
    #[error("database busy: {0}")]
    Busy(String),

    /// Writer contention persisted through every bounded retry.
    ///
    /// Distinct from the business errors: the request was well-formed and
    /// may simply be retried later by the caller.
    #[error("write conflict not resolved after {attempts} attempts")]
    ConflictRetryExhausted { attempts: u32 },

    /// Database connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Transient contention that a bounded retry may resolve.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Busy(_))
    }
}

/// Convert sqlx errors to DbError.
///
/// SQLite reports constraint failures and lock contention through message
/// text; the mapping below is the same categorization the rest of the crate
/// keys retries and error codes off.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation { message: msg }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation { message: msg }
                } else if msg.contains("database is locked")
                    || msg.contains("database table is locked")
                {
                    DbError::Busy(msg)
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

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

// =============================================================================
// Ledger Error
// =============================================================================

/// The error type service callers see: business rule violations from
/// almacen-core or persistence failures from this crate.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Business rule violation; terminal, never retried.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Persistence failure (including `ConflictRetryExhausted`).
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<almacen_core::ValidationError> for LedgerError {
    fn from(err: almacen_core::ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Db(DbError::from(err))
    }
}

/// Result type for service-level ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================
