//! # Movement Repository
//!
//! The append-only stock movement log.
//!
//! ## Log Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock_movements (product p-1, stock_initial 10)                       │
//! │                                                                         │
//! │  seq │ kind    │ qty │ balance_after                                   │
//! │  ────┼─────────┼─────┼──────────────                                   │
//! │   1  │ inflow  │  5  │ 15                                              │
//! │   2  │ outflow │ 10  │  5        ← products.version = 2                │
//! │                                  ← products.stock_current = 5          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are only ever inserted, by [`MovementRepository::append`] inside the
//! ledger's transaction. There is no update or delete.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kardex_core::{Movement, MovementKind, MovementKindTag, ValidatedMovement};

const MOVEMENT_COLUMNS: &str = "id, product_id, kind, movement_date, quantity, unit_price_cents, \
     notes, registered_by, sequence, balance_after, created_at";

/// Optional kind filter; bind the `Option<MovementKindTag>` twice.
const KIND_FILTER: &str = "(? IS NULL OR kind = ?)";

/// Flat row as stored; [`Movement`] carries the kind as a tagged enum.
#[derive(Debug, FromRow)]
struct MovementRow {
    id: String,
    product_id: String,
    kind: MovementKindTag,
    movement_date: NaiveDate,
    quantity: i64,
    unit_price_cents: Option<i64>,
    notes: String,
    registered_by: String,
    sequence: i64,
    balance_after: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = DbError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind = match (row.kind, row.unit_price_cents) {
            (MovementKindTag::Inflow, unit_price_cents) => MovementKind::Inflow { unit_price_cents },
            (MovementKindTag::Outflow, None) => MovementKind::Outflow,
            (MovementKindTag::Outflow, Some(_)) => {
                return Err(DbError::CorruptRow {
                    table: "stock_movements".to_string(),
                    id: row.id,
                    reason: "outflow carries a unit price".to_string(),
                })
            }
        };

        Ok(Movement {
            id: row.id,
            product_id: row.product_id,
            kind,
            movement_date: row.movement_date,
            quantity: row.quantity,
            notes: row.notes,
            registered_by: row.registered_by,
            sequence: row.sequence,
            balance_after: row.balance_after,
            created_at: row.created_at,
        })
    }
}

fn into_movements(rows: Vec<MovementRow>) -> DbResult<Vec<Movement>> {
    rows.into_iter().map(Movement::try_from).collect()
}

/// Repository for the movement log.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Appends a movement inside the caller's transaction.
    ///
    /// `sequence` is the product version produced by the matching stock
    /// update and `balance_after` the stock it left behind. The id and
    /// `created_at` are assigned here.
    pub async fn append(
        conn: &mut SqliteConnection,
        movement: &ValidatedMovement,
        sequence: i64,
        balance_after: i64,
    ) -> DbResult<Movement> {
        let kind = movement.kind();
        let appended = Movement {
            id: Uuid::new_v4().to_string(),
            product_id: movement.product_id().to_string(),
            kind,
            movement_date: movement.movement_date(),
            quantity: movement.quantity(),
            notes: movement.notes().to_string(),
            registered_by: movement.registered_by().to_string(),
            sequence,
            balance_after,
            created_at: Utc::now(),
        };

        debug!(
            product_id = %appended.product_id,
            kind = %kind.tag(),
            sequence,
            "Appending movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, kind, movement_date, quantity, unit_price_cents,
                notes, registered_by, sequence, balance_after, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&appended.id)
        .bind(&appended.product_id)
        .bind(kind.tag())
        .bind(appended.movement_date)
        .bind(appended.quantity)
        .bind(appended.unit_price_cents())
        .bind(&appended.notes)
        .bind(&appended.registered_by)
        .bind(appended.sequence)
        .bind(appended.balance_after)
        .bind(appended.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(appended)
    }

    /// Gets a movement by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Movement>> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE id = ?");
        let row = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Movement::try_from).transpose()
    }

    /// Lists every movement, latest movement date first.
    ///
    /// `kind` restricts the listing to inflows or outflows.
    pub async fn list(&self, kind: Option<MovementKindTag>) -> DbResult<Vec<Movement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE {KIND_FILTER} \
             ORDER BY movement_date DESC, created_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(kind)
            .bind(kind)
            .fetch_all(&self.pool)
            .await?;

        into_movements(rows)
    }

    /// Lists a product's movements, newest commit first.
    pub async fn list_for_product(
        &self,
        product_id: &str,
        kind: Option<MovementKindTag>,
    ) -> DbResult<Vec<Movement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE product_id = ? AND {KIND_FILTER} \
             ORDER BY sequence DESC"
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(product_id)
            .bind(kind)
            .bind(kind)
            .fetch_all(&self.pool)
            .await?;

        into_movements(rows)
    }

    /// Lists the movements dated `date`, most recently recorded first.
    pub async fn list_by_date(
        &self,
        date: NaiveDate,
        kind: Option<MovementKindTag>,
    ) -> DbResult<Vec<Movement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE movement_date = ? AND {KIND_FILTER} \
             ORDER BY created_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(date)
            .bind(kind)
            .bind(kind)
            .fetch_all(&self.pool)
            .await?;

        into_movements(rows)
    }

    /// Counts a product's movements.
    pub async fn count_for_product(&self, product_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements WHERE product_id = ?")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use kardex_core::validation::validate_movement;
    use kardex_core::{MovementRequest, NewProduct, Product};

    async fn setup() -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .create(&NewProduct {
                code: "BOLT-M8".to_string(),
                name: "Bolt M8".to_string(),
                category_id: None,
                unit_of_measure: None,
                unit_price_cents: 25,
                stock_initial: 10,
            })
            .await
            .unwrap();
        (db, product)
    }

    async fn append(db: &Database, request: MovementRequest, sequence: i64, balance: i64) -> Movement {
        let validated = validate_movement(&request).unwrap();
        let mut tx = db.pool().begin().await.unwrap();
        let movement = MovementRepository::append(&mut tx, &validated, sequence, balance)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        movement
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let (db, product) = setup().await;
        let repo = db.movements();

        let inflow = MovementRequest::inflow(&product.id, "2024-03-01", 5, Some(120), " pallet ", "ana");
        let appended = append(&db, inflow, 1, 15).await;

        let stored = repo.get(&appended.id).await.unwrap().unwrap();
        assert_eq!(stored, appended);
        assert_eq!(stored.notes, "pallet");
        assert_eq!(stored.unit_price_cents(), Some(120));
        assert_eq!(stored.movement_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_for_product_newest_first() {
        let (db, product) = setup().await;
        let repo = db.movements();

        append(&db, MovementRequest::inflow(&product.id, "2024-03-01", 5, None, "", "ana"), 1, 15).await;
        append(&db, MovementRequest::outflow(&product.id, "2024-03-02", 10, "", "luis"), 2, 5).await;

        let log = repo.list_for_product(&product.id, None).await.unwrap();
        let sequences: Vec<i64> = log.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![2, 1]);
        assert_eq!(log[0].kind, MovementKind::Outflow);
        assert_eq!(repo.count_for_product(&product.id).await.unwrap(), 2);
        assert!(repo.list_for_product("other", None).await.unwrap().is_empty());

        let outflows = repo
            .list_for_product(&product.id, Some(MovementKindTag::Outflow))
            .await
            .unwrap();
        assert_eq!(outflows.len(), 1);
        assert_eq!(outflows[0].sequence, 2);
    }

    #[tokio::test]
    async fn test_list_by_date() {
        let (db, product) = setup().await;
        let repo = db.movements();

        let first = append(&db, MovementRequest::inflow(&product.id, "2024-03-01", 5, None, "", "ana"), 1, 15).await;
        append(&db, MovementRequest::inflow(&product.id, "2024-03-02", 1, None, "", "ana"), 2, 16).await;
        let third = append(&db, MovementRequest::outflow(&product.id, "2024-03-01", 2, "", "ana"), 3, 14).await;

        let day = repo
            .list_by_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), None)
            .await
            .unwrap();
        let ids: Vec<&str> = day.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![third.id.as_str(), first.id.as_str()]);

        let inflows = repo
            .list_by_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), Some(MovementKindTag::Inflow))
            .await
            .unwrap();
        assert_eq!(inflows.len(), 1);
        assert_eq!(inflows[0].id, first.id);
    }

    #[tokio::test]
    async fn test_list_all_by_movement_date() {
        let (db, product) = setup().await;
        let repo = db.movements();

        let early = append(&db, MovementRequest::inflow(&product.id, "2024-03-01", 5, None, "", "ana"), 1, 15).await;
        let late = append(&db, MovementRequest::outflow(&product.id, "2024-03-09", 2, "", "ana"), 2, 13).await;
        let middle = append(&db, MovementRequest::inflow(&product.id, "2024-03-05", 1, None, "", "ana"), 3, 14).await;

        let all = repo.list(None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![late.id.as_str(), middle.id.as_str(), early.id.as_str()]);

        let inflows = repo.list(Some(MovementKindTag::Inflow)).await.unwrap();
        assert!(inflows.iter().all(Movement::is_inflow));
        assert_eq!(inflows.len(), 2);

        let outflows = repo.list(Some(MovementKindTag::Outflow)).await.unwrap();
        assert_eq!(outflows.len(), 1);
        assert_eq!(outflows[0].id, late.id);
    }

    #[tokio::test]
    async fn test_duplicate_sequence_rejected() {
        let (db, product) = setup().await;
        append(&db, MovementRequest::inflow(&product.id, "2024-03-01", 5, None, "", "ana"), 1, 15).await;

        let validated =
            validate_movement(&MovementRequest::inflow(&product.id, "2024-03-01", 1, None, "", "ana")).unwrap();
        let mut tx = db.pool().begin().await.unwrap();
        let err = MovementRepository::append(&mut tx, &validated, 1, 16)
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[test]
    fn test_outflow_with_price_is_corrupt() {
        let row = MovementRow {
            id: "m-1".to_string(),
            product_id: "p-1".to_string(),
            kind: MovementKindTag::Outflow,
            movement_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            quantity: 1,
            unit_price_cents: Some(10),
            notes: String::new(),
            registered_by: "ana".to_string(),
            sequence: 1,
            balance_after: 9,
            created_at: Utc::now(),
        };

        assert!(matches!(
            Movement::try_from(row),
            Err(DbError::CorruptRow { .. })
        ));
    }
}
