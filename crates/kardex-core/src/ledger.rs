//! # Ledger Replay
//!
//! Recomputes a product's stock from its movement log.
//!
//! The stock projection (`products.stock_current`) is a materialized view of
//! the log. Replaying the committed movements in `sequence` order starting
//! from `stock_initial` must land exactly on `stock_current`, every step must
//! reproduce the `balance_after` stored on the movement, and no step may go
//! below zero.
//!
//! ```text
//!   stock_initial = 10
//!   seq 1  inflow  +5   → 15   (balance_after 15 ✓)
//!   seq 2  outflow -10  →  5   (balance_after  5 ✓)
//!   ─────────────────────────
//!   replayed 5 == stock_current 5, version 2 == last sequence 2
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::types::{Movement, Product};

/// A way in which the log and the projection disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayDiscrepancy {
    #[error("movement {movement_id} belongs to product {found}, not {expected}")]
    ForeignMovement {
        movement_id: String,
        expected: String,
        found: String,
    },

    #[error("sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: i64, found: i64 },

    #[error("balance went negative ({balance}) at sequence {sequence}")]
    NegativeBalance { sequence: i64, balance: i64 },

    #[error("sequence {sequence} recorded balance {recorded}, replay gives {replayed}")]
    BalanceMismatch {
        sequence: i64,
        recorded: i64,
        replayed: i64,
    },

    #[error("replayed stock {replayed} does not match stock_current {current}")]
    ProjectionMismatch { replayed: i64, current: i64 },

    #[error("product version {version} does not match last sequence {last_sequence}")]
    VersionMismatch { version: i64, last_sequence: i64 },
}

/// Outcome of replaying one product's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replay {
    /// Stock after the last movement.
    pub stock: i64,
    /// Sequence of the last movement (0 when the log is empty).
    pub last_sequence: i64,
    pub inflow_total: i64,
    pub outflow_total: i64,
}

/// Replays `movements` for `product_id` starting at `stock_initial`.
///
/// The slice may be in any order; it is walked by ascending `sequence`.
pub fn replay(
    product_id: &str,
    stock_initial: i64,
    movements: &[Movement],
) -> Result<Replay, ReplayDiscrepancy> {
    let mut ordered: Vec<&Movement> = movements.iter().collect();
    ordered.sort_by_key(|m| m.sequence);

    let mut state = Replay {
        stock: stock_initial,
        last_sequence: 0,
        inflow_total: 0,
        outflow_total: 0,
    };

    for movement in ordered {
        if movement.product_id != product_id {
            return Err(ReplayDiscrepancy::ForeignMovement {
                movement_id: movement.id.clone(),
                expected: product_id.to_string(),
                found: movement.product_id.clone(),
            });
        }

        let expected = state.last_sequence + 1;
        if movement.sequence != expected {
            return Err(ReplayDiscrepancy::SequenceGap {
                expected,
                found: movement.sequence,
            });
        }

        state.stock += movement.delta();
        state.last_sequence = movement.sequence;
        if movement.is_inflow() {
            state.inflow_total += movement.quantity;
        } else {
            state.outflow_total += movement.quantity;
        }

        if state.stock < 0 {
            return Err(ReplayDiscrepancy::NegativeBalance {
                sequence: movement.sequence,
                balance: state.stock,
            });
        }

        if state.stock != movement.balance_after {
            return Err(ReplayDiscrepancy::BalanceMismatch {
                sequence: movement.sequence,
                recorded: movement.balance_after,
                replayed: state.stock,
            });
        }
    }

    Ok(state)
}

/// Consistency report for a single product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerAudit {
    pub product_id: String,
    pub stock_initial: i64,
    pub stock_current: i64,
    pub version: i64,
    pub movement_count: usize,
    /// Replayed stock, `None` if the replay itself failed.
    pub replayed_stock: Option<i64>,
    pub inflow_total: i64,
    pub outflow_total: i64,
    pub discrepancy: Option<ReplayDiscrepancy>,
}

impl LedgerAudit {
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.discrepancy.is_none()
    }
}

/// Audits a product's projection against its movement log.
pub fn audit(product: &Product, movements: &[Movement]) -> LedgerAudit {
    let mut report = LedgerAudit {
        product_id: product.id.clone(),
        stock_initial: product.stock_initial,
        stock_current: product.stock_current,
        version: product.version,
        movement_count: movements.len(),
        replayed_stock: None,
        inflow_total: 0,
        outflow_total: 0,
        discrepancy: None,
    };

    match replay(&product.id, product.stock_initial, movements) {
        Ok(state) => {
            report.replayed_stock = Some(state.stock);
            report.inflow_total = state.inflow_total;
            report.outflow_total = state.outflow_total;

            if state.stock != product.stock_current {
                report.discrepancy = Some(ReplayDiscrepancy::ProjectionMismatch {
                    replayed: state.stock,
                    current: product.stock_current,
                });
            } else if state.last_sequence != product.version {
                report.discrepancy = Some(ReplayDiscrepancy::VersionMismatch {
                    version: product.version,
                    last_sequence: state.last_sequence,
                });
            }
        }
        Err(discrepancy) => report.discrepancy = Some(discrepancy),
    }

    report
}

// =============================================================================
// Unit Tests
// =============================================================================
