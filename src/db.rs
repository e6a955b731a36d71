use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge, histogram};
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        // An in-memory SQLite database exists per connection, so the pool must
        // never open a second one.
        let (max_connections, min_connections) = if cfg.is_in_memory_sqlite() {
            (1, 1)
        } else {
            (cfg.db_max_connections, cfg.db_min_connections)
        };

        Self {
            url: cfg.database_url.clone(),
            max_connections,
            min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database using default tuning
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
///
/// # Errors
/// Returns `ServiceError::DatabaseError` if the connection cannot be established
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("ledger_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection failed: {}", e);
        counter!("ledger_db.connection_failures", 1);
        ServiceError::DatabaseError(e)
    })?;

    info!("Database connection pool established successfully");
    Ok(pool)
}

/// Runs the embedded schema migrations
///
/// # Errors
/// Returns `ServiceError::MigrationError` if any migration fails
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(|e| ServiceError::MigrationError(e.to_string()));

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!("Database migrations completed successfully in {:?}", elapsed),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let start = Instant::now();
    let result = pool.ping().await.map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => {
            debug!("Database connection check successful in {:?}", elapsed);
            gauge!("ledger_db.connection_latency", elapsed.as_millis() as f64);
        }
        Err(e) => {
            error!("Database connection check failed after {:?}: {}", elapsed, e);
            counter!("ledger_db.connection_failures", 1);
        }
    }

    result
}

/// Shared handle on the ledger database.
///
/// Reads go straight to the pool. Every state-changing command goes through
/// [`LedgerStore::begin_write`], which serializes commands process-wide and
/// scopes their writes to a single transaction.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    db: Arc<DbPool>,
    gate: Arc<Mutex<()>>,
}

impl LedgerStore {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self {
            db,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Connection for read-only queries
    pub fn conn(&self) -> &DbPool {
        &self.db
    }

    /// Waits for exclusive write access and opens a transaction.
    ///
    /// Dropping the returned [`WriteTxn`] without committing rolls back every
    /// write made through it.
    pub async fn begin_write(&self) -> Result<WriteTxn, ServiceError> {
        let guard = self.gate.clone().lock_owned().await;
        let txn = self.db.begin().await.map_err(|e| {
            counter!("ledger_db.transaction.begin_failed", 1);
            ServiceError::DatabaseError(e)
        })?;
        counter!("ledger_db.transaction.started", 1);

        Ok(WriteTxn {
            txn,
            started: Instant::now(),
            _guard: guard,
        })
    }
}

/// An open write transaction holding the ledger's write gate
pub struct WriteTxn {
    txn: DatabaseTransaction,
    started: Instant,
    _guard: OwnedMutexGuard<()>,
}

impl WriteTxn {
    pub async fn commit(self) -> Result<(), ServiceError> {
        let elapsed = self.started.elapsed();
        histogram!("ledger_db.transaction.duration", elapsed.as_secs_f64());
        match self.txn.commit().await {
            Ok(()) => {
                counter!("ledger_db.transaction.committed", 1);
                debug!("Transaction committed in {:?}", elapsed);
                Ok(())
            }
            Err(e) => {
                counter!("ledger_db.transaction.rolled_back", 1);
                warn!("Transaction commit failed after {:?}: {}", elapsed, e);
                Err(ServiceError::DatabaseError(e))
            }
        }
    }
}

impl Deref for WriteTxn {
    type Target = DatabaseTransaction;

    fn deref(&self) -> &Self::Target {
        &self.txn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, DbBackend, Statement};

    async fn memory_store() -> LedgerStore {
        let config = DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = establish_connection_with_config(&config)
            .await
            .expect("sqlite connection");
        run_migrations(&pool).await.expect("migrations");
        LedgerStore::new(Arc::new(pool))
    }

    async fn vendor_rows(store: &LedgerStore) -> i64 {
        let row = store
            .conn()
            .query_one(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM vendors".to_string(),
            ))
            .await
            .expect("count query")
            .expect("count row");
        row.try_get("", "n").expect("count column")
    }

    const INSERT_VENDOR: &str = "INSERT INTO vendors (identity, name, location, contact_info, material_types, registered_at, is_active) \
         VALUES ('0xv', 'V', 'L', 'C', 'M', '2025-01-01T00:00:00Z', 1)";

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = memory_store().await;
        {
            let txn = store.begin_write().await.expect("begin");
            txn.execute(Statement::from_string(DbBackend::Sqlite, INSERT_VENDOR.to_string()))
                .await
                .expect("insert");
        }
        assert_eq!(vendor_rows(&store).await, 0);
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = memory_store().await;
        let txn = store.begin_write().await.expect("begin");
        txn.execute(Statement::from_string(DbBackend::Sqlite, INSERT_VENDOR.to_string()))
            .await
            .expect("insert");
        txn.commit().await.expect("commit");
        assert_eq!(vendor_rows(&store).await, 1);
        assert!(check_connection(store.conn()).await.is_ok());
    }
}
