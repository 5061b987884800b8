//! # kardex-db: Database Layer and Stock Ledger for Kardex
//!
//! This crate persists products and their stock movements in SQLite (via
//! sqlx) and hosts the stock ledger, the only component allowed to move
//! stock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kardex Data Flow                                 │
//! │                                                                         │
//! │  submit_inflow / submit_outflow / movements_for / audit ...            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    kardex-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │    ledger     │    │  repository   │    │  Migrations  │  │   │
//! │  │   │               │    │               │    │  (embedded)  │  │   │
//! │  │   │ StockLedger   │───►│ ProductRepo   │    │ 001_init.sql │  │   │
//! │  │   │ StockQueries  │    │ MovementRepo  │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                        ┌───────▼───────┐                       │   │
//! │  │                        │   Database    │                       │   │
//! │  │                        │   (pool.rs)   │                       │   │
//! │  │                        └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and ledger error types
//! - [`repository`] - Product catalog and movement log
//! - [`ledger`] - Atomic movement commits and read-only queries
//! - [`config`] - File + environment configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kardex_db::{Database, DbConfig, LedgerConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/kardex.db")).await?;
//! let ledger = db.ledger(LedgerConfig::default());
//!
//! let committed = ledger
//!     .submit_outflow(&product_id, "2024-03-01", 4, "", "maria")
//!     .await?;
//! let stock = db.queries().current_stock(&product_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, KardexConfig};
pub use error::{DbError, LedgerError, LedgerResult};
pub use ledger::{LedgerConfig, StockLedger, StockQueries};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::movement::MovementRepository;
pub use repository::product::{ProductRepository, StockDeltaOutcome};
