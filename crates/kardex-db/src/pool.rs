//! # Database Handle
//!
//! Opens the SQLite store behind the stock ledger and hands out the
//! ledger, the query service and the repositories, all sharing one pool.
//!
//! ## Writers and Readers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 One SQLite file, many ledger callers                    │
//! │                                                                         │
//! │  clerk A ─ submit_outflow ─┐                                            │
//! │  clerk B ─ submit_inflow  ─┼──► StockLedger ──► BEGIN; UPDATE; INSERT  │
//! │  clerk C ─ submit_outflow ─┘        │            (one writer at a time,│
//! │                                     │             others wait up to    │
//! │                                     │             busy_timeout)        │
//! │                                     ▼                                   │
//! │                               SqlitePool (max_connections)              │
//! │                                     ▲                                   │
//! │  reports ─ movements_for / audit ───┘  WAL: reads see the last commit  │
//! │                                        and never wait on the writer    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A version conflict is the ledger's business and is retried there. A
//! locked database is SQLite's, and is absorbed by the busy timeout; if it
//! runs out the commit fails as `Persistence` with nothing written.
//!
//! `:memory:` gives each connection its own database, so the in-memory
//! configuration is pinned to a single connection and skips WAL.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::ledger::{LedgerConfig, StockLedger, StockQueries};
use crate::migrations;
use crate::repository::movement::MovementRepository;
use crate::repository::product::ProductRepository;

const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Pool and SQLite settings for [`Database::new`].
///
/// Usually built from [`crate::KardexConfig::db_config`].
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/kardex/stock.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool. Concurrent commits each
    /// hold one for the length of their transaction.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long a caller waits for a free connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a commit waits for another commit's write lock before
    /// failing. Default: 5 seconds
    pub busy_timeout: Duration,

    /// Apply the embedded schema on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Settings for a file database, created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// A private in-memory ledger on a single connection.
    ///
    /// Commits still run one transaction each, so every ledger invariant
    /// holds; there is never a second writer at the SQLite level.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Returns true if this configuration points at a private in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .journal_mode(SqliteJournalMode::Wal)
                // Durable at checkpoint; a crash may drop the last commit, never half of one
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true)
        };

        Ok(options
            // stock_movements.product_id and products.category_id rely on it
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the stock store. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
}

impl Database {
    /// Opens the store and brings the schema up to date.
    ///
    /// Fails with `ConnectionFailed` if the file cannot be opened and
    /// `MigrationFailed` if the schema cannot be applied.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_options = config.connect_options()?;

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Idempotent: already applied migrations are skipped.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// Prefer the repositories and the ledger. Writing `products.stock_current`
    /// through the raw pool breaks the ledger's projection invariant.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the movement repository.
    pub fn movements(&self) -> MovementRepository {
        MovementRepository::new(self.pool.clone())
    }

    /// Returns the stock ledger, the only component that moves stock.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let ledger = db.ledger(LedgerConfig::default());
    /// let committed = ledger
    ///     .submit_inflow(&product.id, "2024-03-01", 5, None, "", "ana")
    ///     .await?;
    /// ```
    pub fn ledger(&self, config: LedgerConfig) -> StockLedger {
        StockLedger::new(self.pool.clone(), config)
    }

    /// Returns the read-only stock query service.
    pub fn queries(&self) -> StockQueries {
        StockQueries::new(self.products(), self.movements())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
