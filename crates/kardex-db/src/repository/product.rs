//! # Product Repository
//!
//! Database operations for the product catalog and its stock projection.
//!
//! ## Key Operations
//! - Lookups by id and by business code
//! - Creation (`stock_current = stock_initial`, `version = 0`)
//! - Detail edits that never touch stock
//! - The version-checked stock delta used by the ledger
//!
//! ## Compare-and-Swap Stock Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    apply_stock_delta                                    │
//! │                                                                         │
//! │  ❌ WRONG: read, compute, write back an absolute value                 │
//! │     UPDATE products SET stock_current = 7 WHERE id = ?                 │
//! │     (two writers that read 10 both write, one update is lost)          │
//! │                                                                         │
//! │  ✅ CORRECT: delta guarded by the version read earlier                 │
//! │     UPDATE products                                                    │
//! │        SET stock_current = stock_current + ?, version = version + 1    │
//! │      WHERE id = ? AND version = ? AND stock_current + ? >= 0           │
//! │                                                                         │
//! │  0 rows? Look again inside the same transaction:                       │
//! │     no row            → NotFound                                       │
//! │     version moved     → VersionConflict (caller retries)               │
//! │     otherwise         → Insufficient                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kardex_core::{NewProduct, Product, ProductDetails, DEFAULT_UNIT_OF_MEASURE};

const PRODUCT_COLUMNS: &str = "id, code, name, category_id, unit_of_measure, unit_price_cents, \
     stock_initial, stock_current, version, created_at, updated_at";

/// Outcome of a version-checked stock update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockDeltaOutcome {
    /// The row was updated; carries the new snapshot.
    Applied(Product),
    /// Someone else committed since `expected` was read.
    VersionConflict { expected: i64, actual: i64 },
    /// The delta would take stock below zero.
    Insufficient { available: i64 },
    NotFound,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let product = repo.get("uuid-here").await?;
/// let low = repo.list_low_stock(5).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its business code (e.g., "BOLT-M8").
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE code = ?");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a new product from already validated attributes.
    ///
    /// The product starts with `stock_current = stock_initial` and
    /// `version = 0`.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::UniqueViolation)` - Code already exists
    /// * `Err(DbError::ForeignKeyViolation)` - Unknown category
    pub async fn create(&self, product: &NewProduct) -> DbResult<Product> {
        debug!(code = %product.code, "Inserting product");

        let now = Utc::now();
        let created = Product {
            id: generate_id(),
            code: product.code.clone(),
            name: product.name.clone(),
            category_id: product.category_id.clone(),
            unit_of_measure: product
                .unit_of_measure
                .clone()
                .unwrap_or_else(|| DEFAULT_UNIT_OF_MEASURE.to_string()),
            unit_price_cents: product.unit_price_cents,
            stock_initial: product.stock_initial,
            stock_current: product.stock_initial,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, category_id, unit_of_measure, unit_price_cents,
                stock_initial, stock_current, version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&created.id)
        .bind(&created.code)
        .bind(&created.name)
        .bind(&created.category_id)
        .bind(&created.unit_of_measure)
        .bind(created.unit_price_cents)
        .bind(created.stock_initial)
        .bind(created.stock_current)
        .bind(created.version)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.ends_with("code") => {
                DbError::duplicate("code", &created.code)
            }
            other => other,
        })?;

        Ok(created)
    }

    /// Updates business attributes of a product.
    ///
    /// Leaves `stock_initial`, `stock_current` and `version` untouched, so it
    /// never races with the ledger.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Updated product
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update_details(&self, id: &str, details: &ProductDetails) -> DbResult<Product> {
        debug!(id = %id, "Updating product details");

        let sql = format!(
            r#"
            UPDATE products SET
                code = ?,
                name = ?,
                category_id = ?,
                unit_of_measure = ?,
                unit_price_cents = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        let unit = details
            .unit_of_measure
            .as_deref()
            .unwrap_or(DEFAULT_UNIT_OF_MEASURE);

        let updated = sqlx::query_as::<_, Product>(&sql)
            .bind(&details.code)
            .bind(&details.name)
            .bind(&details.category_id)
            .bind(unit)
            .bind(details.unit_price_cents)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } if field.ends_with("code") => {
                    DbError::duplicate("code", &details.code)
                }
                other => other,
            })?;

        updated.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Applies a signed stock delta if the product is still at `expected_version`.
    ///
    /// Must run on a connection inside a transaction owned by the caller: the
    /// stock update only counts together with the movement appended next to it.
    pub async fn apply_stock_delta(
        conn: &mut SqliteConnection,
        id: &str,
        delta: i64,
        expected_version: i64,
    ) -> DbResult<StockDeltaOutcome> {
        debug!(id = %id, delta, expected_version, "Applying stock delta");

        let sql = format!(
            r#"
            UPDATE products SET
                stock_current = stock_current + ?,
                version = version + 1,
                updated_at = ?
            WHERE id = ? AND version = ? AND stock_current + ? >= 0
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        let applied = sqlx::query_as::<_, Product>(&sql)
            .bind(delta)
            .bind(Utc::now())
            .bind(id)
            .bind(expected_version)
            .bind(delta)
            .fetch_optional(&mut *conn)
            .await?;

        if let Some(product) = applied {
            return Ok(StockDeltaOutcome::Applied(product));
        }

        let current: Option<(i64, i64)> =
            sqlx::query_as("SELECT stock_current, version FROM products WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        Ok(match current {
            None => StockDeltaOutcome::NotFound,
            Some((_, actual)) if actual != expected_version => StockDeltaOutcome::VersionConflict {
                expected: expected_version,
                actual,
            },
            Some((available, _)) => StockDeltaOutcome::Insufficient { available },
        })
    }

    /// Checks whether a category exists.
    pub async fn category_exists(&self, id: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Inserts a category and returns its id.
    ///
    /// Categories are managed elsewhere; this only exists so seed data and
    /// fixtures have something to reference.
    pub async fn insert_category(&self, name: &str) -> DbResult<String> {
        let id = generate_id();

        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(id)
    }

    /// Lists every product by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC, code ASC");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Lists products with `stock_current <= threshold`, lowest stock first.
    pub async fn list_low_stock(&self, threshold: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE stock_current <= ? \
             ORDER BY stock_current ASC, code ASC"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(i64::from(threshold))
            .fetch_all(&self.pool)
            .await?;

        debug!(threshold, count = products.len(), "Low stock products listed");
        Ok(products)
    }

    /// Counts all products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Ids for catalog rows (products and categories).
fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
