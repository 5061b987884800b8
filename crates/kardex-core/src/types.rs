//! # Domain Types
//!
//! Core domain types used throughout Kardex.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐        ┌──────────────────────────────┐           │
//! │  │    Product      │ 1    * │          Movement            │           │
//! │  │  ─────────────  │◄───────│  ──────────────────────────  │           │
//! │  │  id (UUID)      │        │  id (UUID, set on commit)    │           │
//! │  │  code           │        │  product_id                  │           │
//! │  │  stock_initial  │        │  kind: Inflow { price? }     │           │
//! │  │  stock_current  │        │        | Outflow             │           │
//! │  │  version        │        │  quantity > 0                │           │
//! │  └─────────────────┘        │  sequence, balance_after     │           │
//! │                             └──────────────────────────────┘           │
//! │                                                                         │
//! │  MovementRequest ──validate──► ValidatedMovement ──commit──► Movement  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Projection Invariant
//! `stock_current = stock_initial + Σ inflows − Σ outflows` over the
//! committed movements of a product, and `stock_current >= 0`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Product
// =============================================================================

/// A tracked product and its live stock projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business code, unique across products.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Optional category this product is filed under.
    pub category_id: Option<String>,

    /// Unit the stock is counted in ("UNIT", "KG", "BOX", ...).
    pub unit_of_measure: String,

    /// Reference price in cents (smallest currency unit).
    pub unit_price_cents: i64,

    /// Stock at creation time. Never changes afterwards.
    pub stock_initial: i64,

    /// Current stock level, only moved by committed movements.
    pub stock_current: i64,

    /// Optimistic concurrency token, bumped on every stock mutation.
    pub version: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Checks whether an outflow of `quantity` fits the current stock.
    pub fn can_withdraw(&self, quantity: i64) -> bool {
        quantity <= self.stock_current
    }

    /// Checks whether the product is at or below a low-stock threshold.
    pub fn is_low_stock(&self, threshold: u32) -> bool {
        self.stock_current <= i64::from(threshold)
    }
}

/// Attributes for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub category_id: Option<String>,
    /// Defaults to [`crate::DEFAULT_UNIT_OF_MEASURE`] when absent or blank.
    pub unit_of_measure: Option<String>,
    pub unit_price_cents: i64,
    pub stock_initial: i64,
}

/// Business attributes that can be edited after creation.
///
/// Deliberately carries no stock fields: stock only moves through the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductDetails {
    pub code: String,
    pub name: String,
    pub category_id: Option<String>,
    pub unit_of_measure: Option<String>,
    pub unit_price_cents: i64,
}

// =============================================================================
// Movement Kind
// =============================================================================

/// What a movement does to stock.
///
/// Inflows and outflows are structurally identical except that a receipt may
/// record the unit price it was bought at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods received (adds to stock).
    Inflow {
        /// Purchase price per unit in cents, if known.
        unit_price_cents: Option<i64>,
    },
    /// Goods withdrawn (subtracts from stock).
    Outflow,
}

impl MovementKind {
    /// Returns the storage discriminator for this kind.
    #[inline]
    pub fn tag(&self) -> MovementKindTag {
        match self {
            MovementKind::Inflow { .. } => MovementKindTag::Inflow,
            MovementKind::Outflow => MovementKindTag::Outflow,
        }
    }

    /// Applies the sign of this kind to a positive quantity.
    #[inline]
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            MovementKind::Inflow { .. } => quantity,
            MovementKind::Outflow => -quantity,
        }
    }
}

/// Discriminator column stored alongside each movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKindTag {
    Inflow,
    Outflow,
}

impl std::fmt::Display for MovementKindTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovementKindTag::Inflow => write!(f, "inflow"),
            MovementKindTag::Outflow => write!(f, "outflow"),
        }
    }
}

// =============================================================================
// Movement Request
// =============================================================================

/// A movement as submitted by a caller, before any validation.
///
/// The date is kept as the raw string the caller sent so that the validator
/// can report exactly what was wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementRequest {
    pub product_id: String,
    pub kind: MovementKind,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub quantity: i64,
    pub notes: String,
    pub registered_by: String,
}

impl MovementRequest {
    /// Builds an inflow (receipt) request.
    pub fn inflow(
        product_id: impl Into<String>,
        date: impl Into<String>,
        quantity: i64,
        unit_price_cents: Option<i64>,
        notes: impl Into<String>,
        registered_by: impl Into<String>,
    ) -> Self {
        MovementRequest {
            product_id: product_id.into(),
            kind: MovementKind::Inflow { unit_price_cents },
            date: date.into(),
            quantity,
            notes: notes.into(),
            registered_by: registered_by.into(),
        }
    }

    /// Builds an outflow (withdrawal) request.
    pub fn outflow(
        product_id: impl Into<String>,
        date: impl Into<String>,
        quantity: i64,
        notes: impl Into<String>,
        registered_by: impl Into<String>,
    ) -> Self {
        MovementRequest {
            product_id: product_id.into(),
            kind: MovementKind::Outflow,
            date: date.into(),
            quantity,
            notes: notes.into(),
            registered_by: registered_by.into(),
        }
    }
}

// =============================================================================
// Validated Movement
// =============================================================================

/// A request that passed every shape check.
///
/// Only [`crate::validation::validate_movement`] can build one, so holding a
/// `ValidatedMovement` proves the quantity is positive, the date parsed and
/// the actor is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMovement {
    pub(crate) product_id: String,
    pub(crate) kind: MovementKind,
    pub(crate) movement_date: NaiveDate,
    pub(crate) quantity: i64,
    pub(crate) notes: String,
    pub(crate) registered_by: String,
}

impl ValidatedMovement {
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn movement_date(&self) -> NaiveDate {
        self.movement_date
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn registered_by(&self) -> &str {
        &self.registered_by
    }

    /// Signed stock delta: `+quantity` for inflows, `-quantity` for outflows.
    #[inline]
    pub fn delta(&self) -> i64 {
        self.kind.signed(self.quantity)
    }

    #[inline]
    pub fn is_outflow(&self) -> bool {
        matches!(self.kind, MovementKind::Outflow)
    }
}

// =============================================================================
// Movement
// =============================================================================

/// An immutable, committed stock movement.
///
/// `sequence` is the product version this movement produced, so it is
/// strictly increasing within a product and reflects commit order.
/// `balance_after` is the product's stock right after the commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Movement {
    pub id: String,
    pub product_id: String,
    pub kind: MovementKind,
    #[ts(as = "String")]
    pub movement_date: NaiveDate,
    pub quantity: i64,
    pub notes: String,
    pub registered_by: String,
    pub sequence: i64,
    pub balance_after: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Signed effect of this movement on stock.
    #[inline]
    pub fn delta(&self) -> i64 {
        self.kind.signed(self.quantity)
    }

    #[inline]
    pub fn is_inflow(&self) -> bool {
        matches!(self.kind, MovementKind::Inflow { .. })
    }

    /// Unit price recorded on an inflow, `None` for outflows.
    pub fn unit_price_cents(&self) -> Option<i64> {
        match self.kind {
            MovementKind::Inflow { unit_price_cents } => unit_price_cents,
            MovementKind::Outflow => None,
        }
    }
}

/// Result of a successful ledger commit: the new movement together with the
/// product snapshot it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommittedMovement {
    pub movement: Movement,
    pub product: Product,
}

impl CommittedMovement {
    /// Stock level right after the commit.
    #[inline]
    pub fn stock_current(&self) -> i64 {
        self.product.stock_current
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            code: "BOLT-M8".to_string(),
            name: "Bolt M8".to_string(),
            category_id: None,
            unit_of_measure: "UNIT".to_string(),
            unit_price_cents: 25,
            stock_initial: stock,
            stock_current: stock,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_signed_delta() {
        let inflow = MovementKind::Inflow {
            unit_price_cents: None,
        };
        assert_eq!(inflow.signed(5), 5);
        assert_eq!(MovementKind::Outflow.signed(5), -5);
    }

    #[test]
    fn test_can_withdraw() {
        let p = product(15);
        assert!(p.can_withdraw(15));
        assert!(!p.can_withdraw(16));
    }

    #[test]
    fn test_is_low_stock() {
        let p = product(5);
        assert!(p.is_low_stock(5));
        assert!(!p.is_low_stock(4));
    }

    #[test]
    fn test_kind_tag_display() {
        assert_eq!(MovementKindTag::Inflow.to_string(), "inflow");
        assert_eq!(
            MovementKind::Outflow.tag().to_string(),
            MovementKindTag::Outflow.to_string()
        );
    }

    #[test]
    fn test_movement_kind_serializes_tagged() {
        let json = serde_json::to_value(MovementKind::Inflow {
            unit_price_cents: Some(150),
        })
        .unwrap();
        assert_eq!(json["type"], "inflow");
        assert_eq!(json["unit_price_cents"], 150);

        let json = serde_json::to_value(MovementKind::Outflow).unwrap();
        assert_eq!(json["type"], "outflow");
    }
}
