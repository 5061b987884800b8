//! # kardex-core: Pure Business Logic for Kardex
//!
//! This crate is the **heart** of the Kardex stock ledger. It contains the
//! domain model and every business rule as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kardex Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Transport (out of scope: HTTP, CLI, ...)          │   │
//! │  │    submit_inflow, submit_outflow, movements_for, ...           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kardex-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌──────────┐  │   │
//! │  │   │   types   │  │ validation │  │  ledger   │  │  error   │  │   │
//! │  │   │  Product  │  │  quantity  │  │  replay   │  │ CoreError│  │   │
//! │  │   │  Movement │  │  date/actor│  │  deltas   │  │          │  │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              kardex-db (Database Layer + Stock Ledger)          │   │
//! │  │        SQLite, migrations, repositories, atomic commits         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Movement, MovementRequest, ...)
//! - [`validation`] - Movement and product validation rules
//! - [`ledger`] - Replay of the movement log against the stock projection
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use kardex_core::types::MovementRequest;
//! use kardex_core::validation::validate_movement;
//!
//! let request = MovementRequest::outflow("product-1", "2024-03-01", 4, "", "maria");
//! let validated = validate_movement(&request).unwrap();
//!
//! // Outflows subtract from stock
//! assert_eq!(validated.delta(), -4);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Date format accepted for movement dates (`YYYY-MM-DD`).
pub const MOVEMENT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Maximum length of the `registered_by` actor identity.
pub const MAX_ACTOR_LENGTH: usize = 100;

/// Unit of measure assigned when a product is created without one.
pub const DEFAULT_UNIT_OF_MEASURE: &str = "UNIT";

/// Threshold used by reports when the caller does not pick one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;
