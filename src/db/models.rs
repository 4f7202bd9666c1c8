//! Diesel model definitions for database tables
//!
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data)
//!
//! Status, kind, and category vocabularies are string constants in the
//! modules at the bottom; qualification levels live in `crate::levels`.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::diesel_schema::*;

// ============================================================================
// Timestamp Helpers (SQLite stores timestamps as TEXT)
// ============================================================================

/// Get current UTC timestamp as ISO 8601 string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Get current UTC date as YYYY-MM-DD for SQLite TEXT date columns
pub fn current_date() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

// ============================================================================
// User Models
// ============================================================================

/// Practitioner row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New user for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub display_name: &'a str,
    pub email: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Level membership row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = level_memberships)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LevelMembership {
    pub id: String,
    pub user_id: String,
    pub level: String,
    pub granted_at: String,
}

/// New level membership for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = level_memberships)]
pub struct NewLevelMembership<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub level: &'a str,
    pub granted_at: &'a str,
}

// ============================================================================
// Ledger Models
// ============================================================================

/// Submission batch row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = submissions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Submission {
    pub id: String,
    pub user_id: String,
    pub source: String,
    pub note: Option<String>,
    pub created_at: String,
}

/// New submission for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = submissions)]
pub struct NewSubmission<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub source: &'a str,
    pub note: Option<&'a str>,
    pub created_at: &'a str,
}

/// Ledger entry row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Entry {
    pub id: String,
    pub submission_id: String,
    pub user_id: String,
    pub kind: String,
    pub category: String,
    pub value: f32,
    pub status: String,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New ledger entry for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = entries)]
pub struct NewEntry<'a> {
    pub id: &'a str,
    pub submission_id: &'a str,
    pub user_id: &'a str,
    pub kind: &'a str,
    pub category: &'a str,
    pub value: f32,
    pub status: &'a str,
    pub reviewer_id: Option<&'a str>,
    pub reviewed_at: Option<&'a str>,
    pub rejection_reason: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

// ============================================================================
// Certificate Models
// ============================================================================

/// Certificate row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = certificates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Certificate {
    pub id: String,
    pub user_id: String,
    pub level: String,
    pub file_id: String,
    pub previous_id: Option<String>,
    pub is_renewal: i32,
    pub issued_at: String,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

/// New certificate for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = certificates)]
pub struct NewCertificate<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub level: &'a str,
    pub file_id: &'a str,
    pub previous_id: Option<&'a str>,
    pub is_renewal: i32,
    pub issued_at: &'a str,
    pub expires_at: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Target level row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = target_levels)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TargetLevel {
    pub user_id: String,
    pub level: String,
    pub set_by: String,
    pub set_at: String,
}

/// New target level for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = target_levels)]
pub struct NewTargetLevel<'a> {
    pub user_id: &'a str,
    pub level: &'a str,
    pub set_by: &'a str,
    pub set_at: &'a str,
}

// ============================================================================
// Entry Kind Constants
// ============================================================================

/// Ledger entry kinds: continuing-education credits or supervised hours
pub mod entry_kinds {
    pub const CREDIT: &str = "credit";
    pub const HOUR: &str = "hour";

    /// All entry kinds
    pub const ALL: [&str; 2] = [CREDIT, HOUR];

    /// Check if a kind is valid
    pub fn is_valid(kind: &str) -> bool {
        ALL.contains(&kind)
    }

    /// Valid categories for a kind
    pub fn categories_for(kind: &str) -> &'static [&'static str] {
        match kind {
            CREDIT => &super::credit_categories::ALL,
            HOUR => &super::hour_categories::ALL,
            _ => &[],
        }
    }

    /// Check a (kind, category) cell address
    pub fn cell_is_valid(kind: &str, category: &str) -> bool {
        categories_for(kind).contains(&category)
    }
}

// ============================================================================
// Category Constants
// ============================================================================

/// CEU credit categories
pub mod credit_categories {
    pub const ETHICS: &str = "ethics";
    pub const CULTURAL_DIVERSITY: &str = "cultural_diversity";
    pub const SUPERVISION: &str = "supervision";
    pub const GENERAL: &str = "general";

    /// All credit categories
    pub const ALL: [&str; 4] = [ETHICS, CULTURAL_DIVERSITY, SUPERVISION, GENERAL];

    /// Check if a credit category is valid
    pub fn is_valid(category: &str) -> bool {
        ALL.contains(&category)
    }
}

/// Supervised-hour categories
pub mod hour_categories {
    pub const PRACTICE: &str = "practice";
    pub const SUPERVISION: &str = "supervision";
    pub const MENTOR: &str = "mentor";

    /// All hour categories
    pub const ALL: [&str; 3] = [PRACTICE, SUPERVISION, MENTOR];

    /// Check if an hour category is valid
    pub fn is_valid(category: &str) -> bool {
        ALL.contains(&category)
    }
}

// ============================================================================
// Entry Status Constants
// ============================================================================

/// Ledger entry review statuses
pub mod entry_statuses {
    pub const UNCONFIRMED: &str = "unconfirmed";
    pub const CONFIRMED: &str = "confirmed";
    pub const REJECTED: &str = "rejected";
    pub const SPENT: &str = "spent";

    /// All entry statuses
    pub const ALL: [&str; 4] = [UNCONFIRMED, CONFIRMED, REJECTED, SPENT];

    /// Check if a status is valid
    pub fn is_valid(status: &str) -> bool {
        ALL.contains(&status)
    }

    /// Statuses that mean a reviewer has acted on the entry
    pub fn implies_review(status: &str) -> bool {
        matches!(status, CONFIRMED | REJECTED | SPENT)
    }

    /// Statuses whose value counts toward usable totals
    pub fn is_usable(status: &str) -> bool {
        matches!(status, CONFIRMED)
    }

    /// Statuses whose value counts toward lifetime totals
    pub fn counts_toward_lifetime(status: &str) -> bool {
        matches!(status, CONFIRMED | SPENT)
    }
}

// ============================================================================
// Submission Source Constants
// ============================================================================

/// How a submission batch came to exist
pub mod submission_sources {
    pub const SELF_REPORTED: &str = "self_reported";
    pub const ADJUSTMENT: &str = "adjustment";

    /// All submission sources
    pub const ALL: [&str; 2] = [SELF_REPORTED, ADJUSTMENT];

    /// Check if a source is valid
    pub fn is_valid(source: &str) -> bool {
        ALL.contains(&source)
    }
}
