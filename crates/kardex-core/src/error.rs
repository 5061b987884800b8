//! # Error Types
//!
//! Domain-specific error types for kardex-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kardex-core errors (this file)                                        │
//! │  ├── ValidationError  - Malformed request (quantity, date, actor)      │
//! │  └── CoreError        - Business rule rejections                       │
//! │                                                                         │
//! │  kardex-db errors (separate crate)                                     │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── LedgerError      - What callers of the stock ledger see           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError ← DbError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule rejections.
///
/// None of these ever leave state behind: they are raised before anything
/// is written, or cause the surrounding transaction to roll back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The referenced product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// An outflow asked for more units than the product holds.
    ///
    /// ## User Workflow
    /// ```text
    /// Outflow (qty: 20)
    ///      │
    ///      ▼
    /// Check stock: available=15
    ///      │
    ///      ▼
    /// InsufficientStock { available: 15, requested: 20 }
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the pure checks in [`crate::validation`] before the ledger
/// touches storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Movement quantity was zero or negative.
    #[error("Quantity must be greater than 0, got {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// Movement date is not a valid `YYYY-MM-DD` calendar date.
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    /// `registered_by` was empty after trimming.
    #[error("registered_by is required")]
    MissingActor,

    /// `registered_by` exceeds the allowed length.
    #[error("registered_by must be at most {max} characters")]
    ActorTooLong { max: usize },

    /// Applying the quantity would push the stock past what can be stored.
    #[error("Quantity {quantity} would overflow stock of {stock}")]
    QuantityTooLarge { quantity: i64, stock: i64 },

    /// Inflow unit price was negative.
    #[error("Unit price cannot be negative, got {cents} cents")]
    NegativeUnitPrice { cents: i64 },

    /// A required product attribute is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A product attribute is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// A numeric product attribute was negative.
    #[error("{field} cannot be negative")]
    MustBeNonNegative { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
