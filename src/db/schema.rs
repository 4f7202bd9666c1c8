//! Database schema definitions

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tracing::info;

use crate::error::LedgerError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    // Check current schema version
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = diesel::sql_types::Integer)]
    version: i32,
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, LedgerError> {
    diesel::sql_query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(conn)
        .map_err(|e| {
            LedgerError::Internal(format!("Failed to create schema_version table: {}", e))
        })?;

    let row: Option<VersionRow> = diesel::sql_query("SELECT version FROM schema_version LIMIT 1")
        .get_result(conn)
        .optional()
        .map_err(|e| LedgerError::Internal(format!("Failed to read schema_version: {}", e)))?;

    Ok(row.map(|r| r.version).unwrap_or(0))
}

/// Set schema version
fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), LedgerError> {
    diesel::sql_query("DELETE FROM schema_version")
        .execute(conn)
        .map_err(|e| LedgerError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    diesel::sql_query("INSERT INTO schema_version (version) VALUES (?)")
        .bind::<diesel::sql_types::Integer, _>(version)
        .execute(conn)
        .map_err(|e| LedgerError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
pub fn create_tables(conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    conn.batch_execute(USERS_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create user tables: {}", e)))?;

    conn.batch_execute(LEDGER_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create ledger tables: {}", e)))?;

    conn.batch_execute(CERTIFICATES_SCHEMA).map_err(|e| {
        LedgerError::Internal(format!("Failed to create certificate tables: {}", e))
    })?;

    conn.batch_execute(INDEXES_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &mut SqliteConnection, from_version: i32) -> Result<(), LedgerError> {
    // Add migration steps here as schema evolves
    match from_version {
        // Example: 1 -> 2 migration would go here
        _ => {}
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Users and level memberships schema
const USERS_SCHEMA: &str = r#"
-- Practitioners tracked by the ledger
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    display_name TEXT NOT NULL,
    email TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Qualification levels a user currently holds; rank is derived from the
-- highest-ordered row
CREATE TABLE IF NOT EXISTS level_memberships (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    level TEXT NOT NULL,
    granted_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (user_id, level),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);
"#;

/// Submissions and ledger entries schema
const LEDGER_SCHEMA: &str = r#"
-- Submission batches; the entries carry the values
CREATE TABLE IF NOT EXISTS submissions (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'self_reported',
    note TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- One atomic credit or hour unit
-- user_id duplicates the owning submission's user so cell scans need no join
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY NOT NULL,
    submission_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    category TEXT NOT NULL,
    value REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'unconfirmed',
    reviewer_id TEXT,
    reviewed_at TEXT,
    rejection_reason TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (submission_id) REFERENCES submissions(id) ON DELETE CASCADE
);
"#;

/// Certificates and target levels schema
const CERTIFICATES_SCHEMA: &str = r#"
-- Certificate chain per (user, level); previous_id threads the chain
CREATE TABLE IF NOT EXISTS certificates (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    level TEXT NOT NULL,
    file_id TEXT NOT NULL UNIQUE,
    previous_id TEXT,
    is_renewal INTEGER NOT NULL DEFAULT 0,
    issued_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- At most one pending target per user
CREATE TABLE IF NOT EXISTS target_levels (
    user_id TEXT PRIMARY KEY NOT NULL,
    level TEXT NOT NULL,
    set_by TEXT NOT NULL,
    set_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);
"#;

/// Indexes for common lookups
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_entries_cell ON entries(user_id, kind, category, status);
CREATE INDEX IF NOT EXISTS idx_entries_submission ON entries(submission_id);
CREATE INDEX IF NOT EXISTS idx_submissions_user ON submissions(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_certificates_chain ON certificates(user_id, level, issued_at);
CREATE INDEX IF NOT EXISTS idx_memberships_user ON level_memberships(user_id);
"#;
