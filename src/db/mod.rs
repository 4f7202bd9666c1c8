//! SQLite database module for the qualification ledger
//!
//! ## Architecture
//!
//! - Raw credit/hour entries live in `entries`, batched into `submissions`
//! - Cell totals are always derived on read; no aggregate is persisted
//! - Certificates thread a per-(user, level) chain via `previous_id`
//!
//! ## Tables
//!
//! - `users`, `level_memberships` - practitioners and the levels they hold
//! - `submissions`, `entries` - the ledger itself
//! - `certificates` - chained certificate records
//! - `target_levels` - per-user pending target, absent when unset

pub mod cells;
pub mod certificates;
pub mod diesel_schema;
pub mod ledger;
pub mod models;
pub mod schema;
pub mod target_levels;
pub mod users;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::LedgerError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Pragmas applied to every pooled connection on checkout
#[derive(Debug)]
struct ConnectionPragmas {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionPragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        use diesel::connection::SimpleConnection;
        conn.batch_execute(&format!(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout={};",
            self.busy_timeout_ms
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Pooled SQLite database for the qualification ledger
pub struct LedgerDb {
    pool: DbPool,
}

impl LedgerDb {
    /// Open or create the ledger database
    pub fn open(config: &Config) -> Result<Self, LedgerError> {
        let db_path = config.db_path();
        info!("Opening SQLite database at {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = build_pool(
            &db_path.to_string_lossy(),
            config.pool_size.max(1),
            config.busy_timeout_ms,
        )?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        debug!("Opening in-memory SQLite database");

        // A single pooled connection keeps every caller on the same
        // in-memory database
        let pool = build_pool(":memory:", 1, 5000)?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), LedgerError> {
        let mut conn = self.conn()?;
        schema::init_schema(&mut conn)
    }

    /// Check a connection out of the pool
    pub fn conn(&self) -> Result<PooledConn, LedgerError> {
        self.pool
            .get()
            .map_err(|e| LedgerError::Connection(format!("Failed to get connection: {}", e)))
    }

    /// Run a closure against one pooled connection. Callers must not check
    /// out a second connection inside the closure; with an in-memory pool of
    /// one, that would deadlock.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, LedgerError>,
    {
        let mut conn = self.conn()?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, LedgerError> {
        use diesel::dsl::count_star;
        use diesel_schema::{certificates, entries, submissions, users};

        let mut conn = self.conn()?;

        let user_count: i64 = users::table.select(count_star()).first(&mut conn)?;
        let submission_count: i64 = submissions::table.select(count_star()).first(&mut conn)?;
        let entry_count: i64 = entries::table.select(count_star()).first(&mut conn)?;
        let certificate_count: i64 = certificates::table.select(count_star()).first(&mut conn)?;

        Ok(DbStats {
            user_count: user_count as u64,
            submission_count: submission_count as u64,
            entry_count: entry_count as u64,
            certificate_count: certificate_count as u64,
        })
    }
}

fn build_pool(
    database_url: &str,
    max_size: u32,
    busy_timeout_ms: u32,
) -> Result<DbPool, LedgerError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(ConnectionPragmas { busy_timeout_ms }))
        .build(manager)
        .map_err(|e| LedgerError::Connection(format!("Failed to build pool: {}", e)))
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub user_count: u64,
    pub submission_count: u64,
    pub entry_count: u64,
    pub certificate_count: u64,
}

// Re-exports
pub use cells::{CellTotal, RebalanceOutcome};
pub use ledger::{LedgerStats, SubmissionWithEntries};
