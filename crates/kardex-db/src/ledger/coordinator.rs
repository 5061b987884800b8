//! The only writer of `products.stock_current` and `stock_movements`.

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::LedgerConfig;
use crate::error::{DbError, LedgerError, LedgerResult};
use crate::repository::movement::MovementRepository;
use crate::repository::product::{ProductRepository, StockDeltaOutcome};
use kardex_core::validation::{
    check_against_product, validate_movement, validate_new_product, validate_product_details,
};
use kardex_core::{
    CommittedMovement, MovementRequest, NewProduct, Product, ProductDetails, ValidatedMovement,
};

/// Result of one transactional attempt.
enum Attempt {
    Committed(CommittedMovement),
    VersionMoved { expected: i64, actual: i64 },
}

/// Stock consistency coordinator.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = db.ledger(LedgerConfig::default());
///
/// let product = ledger.create_product(new_product).await?;
/// ledger.submit_inflow(&product.id, "2024-03-01", 5, Some(120), "", "ana").await?;
/// ledger.submit_outflow(&product.id, "2024-03-02", 2, "counter sale", "luis").await?;
/// ```
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
    products: ProductRepository,
    config: LedgerConfig,
}

impl StockLedger {
    pub fn new(pool: SqlitePool, config: LedgerConfig) -> Self {
        StockLedger {
            products: ProductRepository::new(pool.clone()),
            pool,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // =========================================================================
    // Movements
    // =========================================================================

    /// Records goods received.
    pub async fn submit_inflow(
        &self,
        product_id: &str,
        date: &str,
        quantity: i64,
        unit_price_cents: Option<i64>,
        notes: &str,
        registered_by: &str,
    ) -> LedgerResult<CommittedMovement> {
        self.commit(MovementRequest::inflow(
            product_id,
            date,
            quantity,
            unit_price_cents,
            notes,
            registered_by,
        ))
        .await
    }

    /// Records goods withdrawn.
    pub async fn submit_outflow(
        &self,
        product_id: &str,
        date: &str,
        quantity: i64,
        notes: &str,
        registered_by: &str,
    ) -> LedgerResult<CommittedMovement> {
        self.commit(MovementRequest::outflow(
            product_id,
            date,
            quantity,
            notes,
            registered_by,
        ))
        .await
    }

    /// Validates and atomically applies one movement.
    ///
    /// ## Errors
    /// * `Validation` - malformed request, nothing read or written
    /// * `ProductNotFound` - unknown product
    /// * `InsufficientStock` - outflow larger than the stock it would commit against
    /// * `Conflict` - the product version kept moving for every attempt
    /// * `Persistence` - storage failure; the transaction was rolled back
    ///
    /// Dropping the returned future before the transaction starts has no
    /// effect. Once an attempt's transaction is running it completes on its
    /// own task, even if the caller goes away.
    pub async fn commit(&self, request: MovementRequest) -> LedgerResult<CommittedMovement> {
        let movement = validate_movement(&request)?;
        let product_id = movement.product_id().to_string();
        let attempts = self.config.max_commit_attempts.max(1);

        for attempt in 1..=attempts {
            let current = self.products.get(&product_id).await?;
            let expected_version = check_against_product(&movement, current.as_ref())?.version;

            let task = tokio::spawn(commit_once(
                self.pool.clone(),
                movement.clone(),
                expected_version,
            ));
            let outcome = task.await.map_err(|e| {
                LedgerError::Persistence(DbError::Internal(format!("commit task failed: {e}")))
            })??;

            match outcome {
                Attempt::Committed(committed) => {
                    info!(
                        product_id = %product_id,
                        kind = %movement.kind().tag(),
                        delta = movement.delta(),
                        stock = committed.product.stock_current,
                        version = committed.product.version,
                        attempt,
                        "Movement committed"
                    );
                    return Ok(committed);
                }
                Attempt::VersionMoved { expected, actual } => {
                    debug!(
                        product_id = %product_id,
                        attempt,
                        expected,
                        actual,
                        "Version moved during commit, retrying"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.config.backoff_for(attempt)).await;
                    }
                }
            }
        }

        warn!(product_id = %product_id, attempts, "Commit attempts exhausted");
        Err(LedgerError::Conflict {
            product_id,
            attempts,
        })
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Creates a product with `stock_current = stock_initial` and version 0.
    ///
    /// ## Errors
    /// * `Validation` - missing or oversized attributes, negative price or stock
    /// * `CategoryNotFound` - `category_id` does not exist
    /// * `DuplicateCode` - another product already uses the code
    pub async fn create_product(&self, product: NewProduct) -> LedgerResult<Product> {
        let product = validate_new_product(&product)?;

        self.ensure_category(product.category_id.as_deref()).await?;

        if self.products.get_by_code(&product.code).await?.is_some() {
            return Err(LedgerError::DuplicateCode(product.code));
        }

        let created = self.products.create(&product).await.map_err(|e| match e {
            DbError::UniqueViolation { value, .. } => LedgerError::DuplicateCode(value),
            DbError::ForeignKeyViolation { .. } => {
                LedgerError::CategoryNotFound(product.category_id.clone().unwrap_or_default())
            }
            other => LedgerError::Persistence(other),
        })?;

        info!(
            product_id = %created.id,
            code = %created.code,
            stock_initial = created.stock_initial,
            "Product created"
        );
        Ok(created)
    }

    /// Updates a product's business attributes. Stock, `stock_initial` and
    /// `version` are never touched.
    pub async fn update_product_details(
        &self,
        id: &str,
        details: ProductDetails,
    ) -> LedgerResult<Product> {
        let details = validate_product_details(&details)?;

        if self.products.get(id).await?.is_none() {
            return Err(LedgerError::ProductNotFound(id.to_string()));
        }

        self.ensure_category(details.category_id.as_deref()).await?;

        if let Some(existing) = self.products.get_by_code(&details.code).await? {
            if existing.id != id {
                return Err(LedgerError::DuplicateCode(details.code));
            }
        }

        let updated = self
            .products
            .update_details(id, &details)
            .await
            .map_err(|e| match e {
                DbError::NotFound { .. } => LedgerError::ProductNotFound(id.to_string()),
                DbError::UniqueViolation { value, .. } => LedgerError::DuplicateCode(value),
                other => LedgerError::Persistence(other),
            })?;

        debug!(product_id = %id, "Product details updated");
        Ok(updated)
    }

    async fn ensure_category(&self, category_id: Option<&str>) -> LedgerResult<()> {
        match category_id {
            Some(category) if !self.products.category_exists(category).await? => {
                Err(LedgerError::CategoryNotFound(category.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Step 5: stock update and movement append in one transaction.
///
/// Every early return drops `tx`, which rolls it back.
async fn commit_once(
    pool: SqlitePool,
    movement: ValidatedMovement,
    expected_version: i64,
) -> LedgerResult<Attempt> {
    let mut tx = pool.begin().await.map_err(DbError::transaction)?;

    let outcome = ProductRepository::apply_stock_delta(
        &mut tx,
        movement.product_id(),
        movement.delta(),
        expected_version,
    )
    .await?;

    let product = match outcome {
        StockDeltaOutcome::Applied(product) => product,
        StockDeltaOutcome::VersionConflict { expected, actual } => {
            tx.rollback().await.map_err(DbError::transaction)?;
            return Ok(Attempt::VersionMoved { expected, actual });
        }
        StockDeltaOutcome::Insufficient { available } => {
            tx.rollback().await.map_err(DbError::transaction)?;
            return Err(LedgerError::InsufficientStock {
                product_id: movement.product_id().to_string(),
                available,
                requested: movement.quantity(),
            });
        }
        StockDeltaOutcome::NotFound => {
            tx.rollback().await.map_err(DbError::transaction)?;
            return Err(LedgerError::ProductNotFound(movement.product_id().to_string()));
        }
    };

    let appended =
        MovementRepository::append(&mut tx, &movement, product.version, product.stock_current)
            .await?;

    tx.commit().await.map_err(DbError::transaction)?;

    Ok(Attempt::Committed(CommittedMovement {
        movement: appended,
        product,
    }))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_support::{ledger, memory_db, new_product, product};
    use crate::{Database, DbConfig};
    use kardex_core::{MovementKind, ValidationError};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Barrier;

    async fn movement_count(db: &Database, product_id: &str) -> i64 {
        db.movements().count_for_product(product_id).await.unwrap()
    }

    async fn stock(db: &Database, product_id: &str) -> (i64, i64) {
        let p = db.products().get(product_id).await.unwrap().unwrap();
        (p.stock_current, p.version)
    }

    #[tokio::test]
    async fn test_inflow_adds_stock() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 10).await;

        let committed = ledger
            .submit_inflow(&p.id, "2024-03-01", 5, Some(120), "supplier delivery", "ana")
            .await
            .unwrap();

        assert_eq!(committed.stock_current(), 15);
        assert_eq!(committed.product.version, 1);
        assert_eq!(committed.movement.sequence, 1);
        assert_eq!(committed.movement.balance_after, 15);
        assert_eq!(
            committed.movement.kind,
            MovementKind::Inflow {
                unit_price_cents: Some(120)
            }
        );
        assert_eq!(stock(&db, &p.id).await, (15, 1));
        assert_eq!(movement_count(&db, &p.id).await, 1);
    }

    #[tokio::test]
    async fn test_outflow_beyond_stock_rejected() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 15).await;

        let err = ledger
            .submit_outflow(&p.id, "2024-03-01", 20, "", "ana")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::InsufficientStock {
                available: 15,
                requested: 20,
                ..
            }
        ));
        assert_eq!(stock(&db, &p.id).await, (15, 0));
        assert_eq!(movement_count(&db, &p.id).await, 0);
    }

    #[tokio::test]
    async fn test_outflow_down_to_zero() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 15).await;

        let committed = ledger
            .submit_outflow(&p.id, "2024-03-01", 15, "", "ana")
            .await
            .unwrap();
        assert_eq!(committed.stock_current(), 0);
        assert_eq!(committed.movement.unit_price_cents(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_outflows_one_wins() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 15).await;

        let (a, b) = tokio::join!(
            ledger.submit_outflow(&p.id, "2024-03-01", 10, "", "ana"),
            ledger.submit_outflow(&p.id, "2024-03-01", 10, "", "luis"),
        );

        let results = [a, b];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let short = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::InsufficientStock { .. })))
            .count();

        assert_eq!(wins, 1);
        assert_eq!(short, 1);
        assert_eq!(stock(&db, &p.id).await, (5, 1));
        assert_eq!(movement_count(&db, &p.id).await, 1);
    }

    #[tokio::test]
    async fn test_invalid_date_rejected() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 10).await;

        let err = ledger
            .submit_inflow(&p.id, "2024-13-40", 5, None, "", "ana")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::InvalidDate { .. })
        ));
        assert_eq!(stock(&db, &p.id).await, (10, 0));
        assert_eq!(movement_count(&db, &p.id).await, 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 10).await;

        let err = ledger
            .submit_outflow(&p.id, "2024-03-01", 0, "", "ana")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::InvalidQuantity { quantity: 0 })
        ));
        assert_eq!(stock(&db, &p.id).await, (10, 0));
        assert_eq!(movement_count(&db, &p.id).await, 0);
    }

    #[tokio::test]
    async fn test_other_request_rules() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 10).await;

        let err = ledger
            .submit_inflow(&p.id, "2024-03-01", 1, None, "", "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ValidationError::MissingActor)));

        let err = ledger
            .submit_inflow(&p.id, "2024-03-01", 1, Some(-1), "", "ana")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::NegativeUnitPrice { cents: -1 })
        ));

        let err = ledger
            .submit_inflow("missing", "2024-03-01", 1, None, "", "ana")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ProductNotFound(ref id) if id == "missing"));

        // Shape errors win over an unknown product
        let err = ledger
            .submit_outflow("missing", "2024-03-01", -2, "", "ana")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::InvalidQuantity { quantity: -2 })
        ));

        assert_eq!(stock(&db, &p.id).await, (10, 0));
    }

    #[tokio::test]
    async fn test_inflow_overflowing_stock_rejected() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 10).await;

        let err = ledger
            .submit_inflow(&p.id, "2024-03-01", i64::MAX, None, "", "ana")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::QuantityTooLarge {
                quantity: i64::MAX,
                stock: 10,
            })
        ));
        assert!(!err.is_retryable());
        assert_eq!(stock(&db, &p.id).await, (10, 0));
        assert_eq!(movement_count(&db, &p.id).await, 0);
        assert!(db.queries().audit(&p.id).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 10).await;

        // The stock UPDATE runs, then the movement INSERT aborts
        sqlx::query(
            "CREATE TRIGGER fail_movement_insert BEFORE INSERT ON stock_movements \
             BEGIN SELECT RAISE(ABORT, 'simulated storage failure'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = ledger
            .submit_inflow(&p.id, "2024-03-01", 5, None, "", "ana")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));
        assert!(!err.is_retryable());
        assert_eq!(stock(&db, &p.id).await, (10, 0));
        assert_eq!(movement_count(&db, &p.id).await, 0);

        sqlx::query("DROP TRIGGER fail_movement_insert")
            .execute(db.pool())
            .await
            .unwrap();

        let committed = ledger
            .submit_inflow(&p.id, "2024-03-01", 5, None, "", "ana")
            .await
            .unwrap();
        assert_eq!(committed.movement.sequence, 1);
        assert_eq!(committed.stock_current(), 15);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_abandoned_commit_leaves_consistent_state() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 10).await;

        let background = ledger.clone();
        let product_id = p.id.clone();
        let caller = tokio::spawn(async move {
            background
                .submit_outflow(&product_id, "2024-03-01", 4, "", "ana")
                .await
        });
        caller.abort();
        let _ = caller.await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let (current, version) = stock(&db, &p.id).await;
        let count = movement_count(&db, &p.id).await;
        assert!(
            (current, version, count) == (10, 0, 0) || (current, version, count) == (6, 1, 1),
            "partial commit: stock {current}, version {version}, movements {count}"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exhausted_attempts_leave_state_consistent() {
        let db = memory_db().await;
        let ledger = db.ledger(LedgerConfig::default().max_commit_attempts(1));
        let p = product(&ledger, "BOLT-M8", 1_000).await;

        let clerks = 20;
        let start = Arc::new(Barrier::new(clerks));
        let tasks: Vec<_> = (0..clerks)
            .map(|i| {
                let ledger = ledger.clone();
                let start = start.clone();
                let product_id = p.id.clone();
                tokio::spawn(async move {
                    start.wait().await;
                    ledger
                        .submit_outflow(&product_id, "2024-03-01", 1, "", &format!("clerk-{i}"))
                        .await
                })
            })
            .collect();

        let (mut wins, mut conflicts) = (0i64, 0);
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => wins += 1,
                Err(err @ LedgerError::Conflict { .. }) => {
                    assert!(err.is_retryable());
                    conflicts += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert!(wins >= 1);
        assert!(conflicts >= 1, "every one of {clerks} single-attempt commits won");
        assert_eq!(stock(&db, &p.id).await, (1_000 - wins, wins));
        assert_eq!(movement_count(&db, &p.id).await, wins);
        assert!(db.queries().audit(&p.id).await.unwrap().is_consistent());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_no_lost_updates_across_connections() {
        let path = std::env::temp_dir().join(format!("kardex-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(8))
            .await
            .unwrap();
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 20).await;

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let ledger = ledger.clone();
                let product_id = p.id.clone();
                tokio::spawn(async move {
                    ledger
                        .submit_outflow(&product_id, "2024-03-01", 3, "", &format!("clerk-{i}"))
                        .await
                })
            })
            .collect();

        let mut wins = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => wins += 1,
                Err(LedgerError::InsufficientStock { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(wins, 6); // floor(20 / 3)
        assert_eq!(stock(&db, &p.id).await, (2, 6));

        let log = db.movements().list_for_product(&p.id, None).await.unwrap();
        let sequences: Vec<i64> = log.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![6, 5, 4, 3, 2, 1]);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unrelated_products_commit_independently() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let a = product(&ledger, "A", 10).await;
        let b = product(&ledger, "B", 10).await;

        let (ra, rb) = tokio::join!(
            ledger.submit_outflow(&a.id, "2024-03-01", 10, "", "ana"),
            ledger.submit_inflow(&b.id, "2024-03-01", 10, None, "", "luis"),
        );

        assert_eq!(ra.unwrap().stock_current(), 0);
        assert_eq!(rb.unwrap().stock_current(), 20);
    }

    #[tokio::test]
    async fn test_identical_submissions_are_two_movements() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 10).await;

        for _ in 0..2 {
            ledger
                .submit_inflow(&p.id, "2024-03-01", 1, None, "same", "ana")
                .await
                .unwrap();
        }

        assert_eq!(stock(&db, &p.id).await, (12, 2));
        assert_eq!(movement_count(&db, &p.id).await, 2);
    }

    #[tokio::test]
    async fn test_create_product_rules() {
        let db = memory_db().await;
        let ledger = ledger(&db);

        let created = ledger
            .create_product(new_product("  BOLT-M8 ", 7))
            .await
            .unwrap();
        assert_eq!(created.code, "BOLT-M8");
        assert_eq!(created.stock_current, 7);
        assert_eq!(created.version, 0);

        let err = ledger
            .create_product(new_product("BOLT-M8", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateCode(ref code) if code == "BOLT-M8"));

        let mut orphan = new_product("NUT-M8", 1);
        orphan.category_id = Some("no-such-category".to_string());
        let err = ledger.create_product(orphan).await.unwrap_err();
        assert!(matches!(err, LedgerError::CategoryNotFound(_)));

        let err = ledger.create_product(new_product("X", -1)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::MustBeNonNegative { .. })
        ));

        let category = db.products().insert_category("Hardware").await.unwrap();
        let mut filed = new_product("WASHER", 1);
        filed.category_id = Some(category.clone());
        let created = ledger.create_product(filed).await.unwrap();
        assert_eq!(created.category_id, Some(category));
    }

    #[tokio::test]
    async fn test_update_details_never_moves_stock() {
        let db = memory_db().await;
        let ledger = ledger(&db);
        let p = product(&ledger, "BOLT-M8", 10).await;
        let other = product(&ledger, "NUT-M8", 3).await;
        ledger
            .submit_outflow(&p.id, "2024-03-01", 4, "", "ana")
            .await
            .unwrap();

        let details = ProductDetails {
            code: "BOLT-M8".to_string(),
            name: "Hex bolt M8".to_string(),
            category_id: None,
            unit_of_measure: Some("BOX".to_string()),
            unit_price_cents: 900,
        };
        let updated = ledger
            .update_product_details(&p.id, details.clone())
            .await
            .unwrap();
        assert_eq!(updated.name, "Hex bolt M8");
        assert_eq!(updated.stock_initial, 10);
        assert_eq!(updated.stock_current, 6);
        assert_eq!(updated.version, 1);

        let err = ledger
            .update_product_details(&other.id, details.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateCode(_)));

        let err = ledger
            .update_product_details("missing", details)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ProductNotFound(_)));
    }
}
