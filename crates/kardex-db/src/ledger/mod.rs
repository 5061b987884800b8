//! # Stock Ledger
//!
//! The write path ([`StockLedger`]) and the read path ([`StockQueries`]) over
//! the product catalog and the movement log.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     StockLedger::commit(request)                        │
//! │                                                                         │
//! │  1. validate_movement ─────────── fail → Validation (nothing touched)  │
//! │  2. delta = ±quantity                                                  │
//! │  3. read product (stock, version) ─ none → ProductNotFound             │
//! │  4. outflow > stock? ──────────── yes → InsufficientStock              │
//! │  5. ┌─ spawned task, one transaction ─────────────────────────────┐    │
//! │     │  UPDATE products … WHERE version = v   (compare-and-swap)   │    │
//! │     │  INSERT stock_movements (sequence v+1, balance_after)       │    │
//! │     │  COMMIT                        any error → ROLLBACK         │    │
//! │     └─────────────────────────────────────────────────────────────┘    │
//! │  6. version moved? ── sleep(backoff × attempt), back to 3              │
//! │                       attempts exhausted → Conflict                    │
//! │  7. CommittedMovement { movement, product }                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No lock is held between steps 3 and 5. Two commits on the same product
//! are ordered by the version they claim; commits on different products
//! never wait on each other beyond SQLite's own write serialization.

mod coordinator;
mod queries;

pub use coordinator::StockLedger;
pub use queries::StockQueries;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for optimistic commits.
///
/// ## Example
/// ```rust,ignore
/// let config = LedgerConfig::default()
///     .max_commit_attempts(16)
///     .retry_backoff_ms(2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Attempts per movement before giving up with `Conflict`.
    /// Default: 8
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,

    /// Base backoff between attempts, multiplied by the attempt number.
    /// Default: 5 ms
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_commit_attempts() -> u32 {
    8
}

fn default_retry_backoff_ms() -> u64 {
    5
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            max_commit_attempts: default_max_commit_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl LedgerConfig {
    /// Sets the number of commit attempts (clamped to at least 1).
    pub fn max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    /// Sets the base retry backoff in milliseconds.
    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.retry_backoff_ms = ms;
        self
    }

    /// Backoff to wait after the `attempt`-th conflict (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_with_attempts() {
        let config = LedgerConfig::default();
        assert_eq!(config.max_commit_attempts, 8);
        assert_eq!(config.backoff_for(1), Duration::from_millis(5));
        assert_eq!(config.backoff_for(3), Duration::from_millis(15));
    }

    #[test]
    fn test_attempts_clamped() {
        let config = LedgerConfig::default().max_commit_attempts(0);
        assert_eq!(config.max_commit_attempts, 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: LedgerConfig = toml::from_str("max_commit_attempts = 3").unwrap();
        assert_eq!(config.max_commit_attempts, 3);
        assert_eq!(config.retry_backoff_ms, 5);
    }
}
