//! Read-only stock queries and the replay audit.

use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::repository::movement::MovementRepository;
use crate::repository::product::ProductRepository;
use kardex_core::ledger::{self, LedgerAudit};
use kardex_core::validation::parse_movement_date;
use kardex_core::{Movement, MovementKindTag, Product};

/// Stock query service. Never writes.
#[derive(Debug, Clone)]
pub struct StockQueries {
    products: ProductRepository,
    movements: MovementRepository,
}

impl StockQueries {
    pub fn new(products: ProductRepository, movements: MovementRepository) -> Self {
        StockQueries {
            products,
            movements,
        }
    }

    async fn product(&self, product_id: &str) -> LedgerResult<Product> {
        self.products
            .get(product_id)
            .await?
            .ok_or_else(|| LedgerError::ProductNotFound(product_id.to_string()))
    }

    /// Current stock level of a product.
    pub async fn current_stock(&self, product_id: &str) -> LedgerResult<i64> {
        Ok(self.product(product_id).await?.stock_current)
    }

    /// Every product, by name.
    pub async fn list_products(&self) -> LedgerResult<Vec<Product>> {
        Ok(self.products.list().await?)
    }

    /// Products at or below `threshold`, lowest stock first, ties by code.
    pub async fn list_low_stock(&self, threshold: u32) -> LedgerResult<Vec<Product>> {
        Ok(self.products.list_low_stock(threshold).await?)
    }

    /// Every movement, latest movement date first. `kind` keeps only
    /// inflows or only outflows.
    pub async fn all_movements(&self, kind: Option<MovementKindTag>) -> LedgerResult<Vec<Movement>> {
        Ok(self.movements.list(kind).await?)
    }

    /// A product's movements, newest commit first.
    pub async fn movements_for(
        &self,
        product_id: &str,
        kind: Option<MovementKindTag>,
    ) -> LedgerResult<Vec<Movement>> {
        self.product(product_id).await?;
        Ok(self.movements.list_for_product(product_id, kind).await?)
    }

    /// Movements dated `date` (`YYYY-MM-DD`), most recently recorded first.
    pub async fn movements_by_date(
        &self,
        date: &str,
        kind: Option<MovementKindTag>,
    ) -> LedgerResult<Vec<Movement>> {
        let date = parse_movement_date(date)?;
        Ok(self.movements.list_by_date(date, kind).await?)
    }

    /// A single movement by id.
    pub async fn movement(&self, movement_id: &str) -> LedgerResult<Movement> {
        self.movements
            .get(movement_id)
            .await?
            .ok_or_else(|| LedgerError::MovementNotFound(movement_id.to_string()))
    }

    /// Replays a product's log and compares it with the stored projection.
    ///
    /// The product row is read first and only movements up to its `version`
    /// are replayed. A movement and its version bump commit together, so
    /// this pairs a consistent snapshot even while commits keep landing.
    pub async fn audit(&self, product_id: &str) -> LedgerResult<LedgerAudit> {
        let product = self.product(product_id).await?;

        let log: Vec<Movement> = self
            .movements
            .list_for_product(product_id, None)
            .await?
            .into_iter()
            .filter(|m| m.sequence <= product.version)
            .collect();

        let report = ledger::audit(&product, &log);

        match &report.discrepancy {
            None => debug!(
                product_id = %product_id,
                stock = report.stock_current,
                movements = report.movement_count,
                "Ledger audit passed"
            ),
            Some(discrepancy) => warn!(
                product_id = %product_id,
                %discrepancy,
                "Ledger audit found a discrepancy"
            ),
        }

        Ok(report)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
