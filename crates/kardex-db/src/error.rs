//! # Database Error Types
//!
//! Error types for database operations and for the stock ledger surface.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        CoreError / ValidationError         │
//! │       │                                   │                             │
//! │       ▼                                   │                             │
//! │  DbError ← Adds context                   │                             │
//! │       │                                   │                             │
//! │       └──────────────┬────────────────────┘                             │
//! │                      ▼                                                  │
//! │               LedgerError ← What ledger callers match on               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kardex_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a product with an existing code
    /// - Two movements claiming the same (product_id, sequence)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing a non-existent category_id
    /// - Referencing a non-existent product_id
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed (includes CHECK constraint and trigger aborts).
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction could not begin, commit or roll back.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored row violates the domain model (e.g. outflow with a price).
    #[error("Corrupt {table} row {id}: {reason}")]
    CorruptRow {
        table: String,
        id: String,
        reason: String,
    },

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

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Wraps a transaction begin/commit failure.
    pub fn transaction(err: sqlx::Error) -> Self {
        DbError::TransactionFailed(err.to_string())
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error messages for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
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
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

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

// =============================================================================
// Ledger Error
// =============================================================================

/// Failures surfaced by the stock ledger and the stock queries.
///
/// Every variant except `Persistence` names the rule that was violated.
/// None of them leave a partial write behind.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed request; nothing was read or written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Movement not found: {0}")]
    MovementNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Product code '{0}' already exists")]
    DuplicateCode(String),

    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Concurrent commits kept moving the product version.
    #[error("Gave up on product {product_id} after {attempts} conflicting commit attempts")]
    Conflict { product_id: String, attempts: u32 },

    /// Storage unavailable or the transaction aborted; not retried here.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] DbError),
}

impl LedgerError {
    /// Only contention is worth an automatic retry by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => LedgerError::ProductNotFound(id),
            CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => LedgerError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            CoreError::Validation(err) => LedgerError::Validation(err),
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_flattens() {
        let err: LedgerError = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            available: 3,
            requested: 5,
        }
        .into();
        assert!(matches!(
            err,
            LedgerError::InsufficientStock {
                available: 3,
                requested: 5,
                ..
            }
        ));

        let err: LedgerError = CoreError::Validation(ValidationError::MissingActor).into();
        assert!(matches!(err, LedgerError::Validation(ValidationError::MissingActor)));
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        let conflict = LedgerError::Conflict {
            product_id: "p-1".to_string(),
            attempts: 8,
        };
        assert!(conflict.is_retryable());
        assert!(!LedgerError::ProductNotFound("p-1".to_string()).is_retryable());
        assert!(!LedgerError::Persistence(DbError::PoolExhausted).is_retryable());
    }
}
