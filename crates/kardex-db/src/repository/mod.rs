//! # Repository Module
//!
//! Database repository implementations for Kardex.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Writes What                                      │
//! │                                                                         │
//! │  StockLedger (ledger.rs)                                               │
//! │       │  one transaction per movement                                   │
//! │       ├──► ProductRepository::apply_stock_delta(&mut tx, ..)           │
//! │       └──► MovementRepository::append(&mut tx, ..)                     │
//! │                                                                         │
//! │  ProductRepository (pool-level)                                        │
//! │       create / update_details  (never stock_current or version)        │
//! │                                                                         │
//! │  MovementRepository (pool-level)                                       │
//! │       reads only; no update or delete exists                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transactional write methods take a `&mut SqliteConnection` so they
//! can only run inside a transaction owned by the caller.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product catalog and stock projection
//! - [`movement::MovementRepository`] - Append-only movement log

pub mod movement;
pub mod product;
