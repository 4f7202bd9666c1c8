//! Matrix cell aggregation and the destructive cell rebalancer
//!
//! A cell is the sum of entry values for one (user, kind, category, status).
//! Cells are never persisted; every read recomputes the sum from the entries
//! table so there is no cached total to drift.
//!
//! Rebalancing forces a cell to an exact total by deleting every entry in the
//! cell and inserting one synthetic replacement. Per-entry provenance inside
//! the cell is lost on override; the operation is lossy by design.

use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use super::diesel_schema::{entries, submissions};
use super::ledger;
use super::models::{
    current_timestamp, entry_kinds, entry_statuses, submission_sources, Entry, NewEntry,
    NewSubmission,
};
use super::users;
use crate::error::LedgerError;

// ============================================================================
// Query Types
// ============================================================================

/// One derived matrix cell with its current sum
#[derive(Debug, Clone, Serialize)]
pub struct CellTotal {
    pub kind: String,
    pub category: String,
    pub status: String,
    pub total: f32,
}

/// Result of a cell rebalance
#[derive(Debug, Clone, Serialize)]
pub struct RebalanceOutcome {
    /// True when the cell already summed to the target and nothing was touched
    pub unchanged: bool,
    pub previous_value: f32,
}

fn validate_cell(kind: &str, category: &str, status: &str) -> Result<(), LedgerError> {
    if !entry_kinds::cell_is_valid(kind, category) {
        return Err(LedgerError::InvalidArgument(format!(
            "Invalid cell '{}/{}'. Valid kinds: {:?}; categories for '{}': {:?}",
            kind,
            category,
            entry_kinds::ALL,
            kind,
            entry_kinds::categories_for(kind)
        )));
    }
    if !entry_statuses::is_valid(status) {
        return Err(LedgerError::InvalidArgument(format!(
            "Invalid status '{}'. Valid statuses: {:?}",
            status,
            entry_statuses::ALL
        )));
    }
    Ok(())
}

// ============================================================================
// Aggregation
// ============================================================================

/// Sum of entry values for one cell. Returns 0 when the cell is empty.
///
/// This is the single source of truth for cell totals; nothing caches the
/// result across a transaction boundary.
pub fn sum_cell(
    conn: &mut SqliteConnection,
    user_id: &str,
    kind: &str,
    category: &str,
    status: &str,
) -> Result<f32, LedgerError> {
    validate_cell(kind, category, status)?;

    let total: Option<f32> = entries::table
        .filter(entries::user_id.eq(user_id))
        .filter(entries::kind.eq(kind))
        .filter(entries::category.eq(category))
        .filter(entries::status.eq(status))
        .select(diesel::dsl::sum(entries::value))
        .first(conn)
        .map_err(|e| LedgerError::Internal(format!("Sum query failed: {}", e)))?;

    Ok(total.unwrap_or(0.0))
}

/// Every non-empty cell for a user, for the administrative matrix view
pub fn cell_matrix(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<CellTotal>, LedgerError> {
    let rows: Vec<(String, String, String, Option<f32>)> = entries::table
        .filter(entries::user_id.eq(user_id))
        .group_by((entries::kind, entries::category, entries::status))
        .select((
            entries::kind,
            entries::category,
            entries::status,
            diesel::dsl::sum(entries::value),
        ))
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Matrix query failed: {}", e)))?;

    Ok(rows
        .into_iter()
        .map(|(kind, category, status, total)| CellTotal {
            kind,
            category,
            status,
            total: total.unwrap_or(0.0),
        })
        .collect())
}

// ============================================================================
// Rebalancer
// ============================================================================

/// Force a cell's total to an exact value.
///
/// When the cell already sums to the target, returns `unchanged: true`
/// without touching storage. Otherwise deletes every entry in the cell and,
/// for a non-zero target, inserts one synthetic entry carrying the full
/// amount into the user's most recent submission (or a fresh adjustment
/// batch when they have none). Submissions left without entries are pruned.
/// The whole replacement runs in one transaction.
pub fn rebalance_cell(
    conn: &mut SqliteConnection,
    user_id: &str,
    kind: &str,
    category: &str,
    status: &str,
    target_value: f32,
    admin_id: &str,
) -> Result<RebalanceOutcome, LedgerError> {
    validate_cell(kind, category, status)?;
    if !(target_value >= 0.0) || !target_value.is_finite() {
        return Err(LedgerError::InvalidArgument(format!(
            "Target value must be >= 0, got {}",
            target_value
        )));
    }
    users::require_user(conn, user_id)?;

    let current = sum_cell(conn, user_id, kind, category, status)?;
    if current == target_value {
        return Ok(RebalanceOutcome {
            unchanged: true,
            previous_value: current,
        });
    }

    conn.transaction::<_, LedgerError, _>(|conn| {
        diesel::delete(
            entries::table
                .filter(entries::user_id.eq(user_id))
                .filter(entries::kind.eq(kind))
                .filter(entries::category.eq(category))
                .filter(entries::status.eq(status)),
        )
        .execute(conn)?;

        if target_value > 0.0 {
            let submission_id = match ledger::newest_submission_for_user(conn, user_id)? {
                Some(submission) => submission.id,
                None => {
                    let id = Uuid::new_v4().to_string();
                    let now = current_timestamp();
                    let new_submission = NewSubmission {
                        id: &id,
                        user_id,
                        source: submission_sources::ADJUSTMENT,
                        note: Some("Cell rebalance"),
                        created_at: &now,
                    };
                    diesel::insert_into(submissions::table)
                        .values(&new_submission)
                        .execute(conn)?;
                    id
                }
            };

            insert_synthetic_entry(
                conn,
                &submission_id,
                user_id,
                kind,
                category,
                status,
                target_value,
                admin_id,
            )?;
        }

        ledger::prune_empty_submissions(conn, user_id)?;
        Ok(())
    })?;

    Ok(RebalanceOutcome {
        unchanged: false,
        previous_value: current,
    })
}

/// The single replacement entry carrying a rebalanced cell's full amount
#[allow(clippy::too_many_arguments)]
fn insert_synthetic_entry(
    conn: &mut SqliteConnection,
    submission_id: &str,
    user_id: &str,
    kind: &str,
    category: &str,
    status: &str,
    value: f32,
    admin_id: &str,
) -> Result<Entry, LedgerError> {
    let id = Uuid::new_v4().to_string();
    let now = current_timestamp();

    let reviewed_at = if entry_statuses::implies_review(status) {
        Some(now.as_str())
    } else {
        None
    };
    let rejection_reason = if status == entry_statuses::REJECTED {
        Some("Set by cell rebalance")
    } else {
        None
    };

    let new_entry = NewEntry {
        id: &id,
        submission_id,
        user_id,
        kind,
        category,
        value,
        status,
        reviewer_id: Some(admin_id),
        reviewed_at,
        rejection_reason,
        created_at: &now,
        updated_at: &now,
    };

    diesel::insert_into(entries::table)
        .values(&new_entry)
        .execute(conn)?;

    ledger::require_entry(conn, &id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ledger::{
        create_submission, list_user_entries, CreateSubmissionInput, EntryFilter, NewEntryInput,
    };
    use crate::db::schema;
    use crate::db::users::{create_user, CreateUserInput};
    use diesel::sqlite::SqliteConnection;
    use diesel::Connection;

    fn setup_test_db() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:")
            .expect("Failed to create in-memory database");
        schema::create_tables(&mut conn).expect("Failed to create tables");
        create_user(
            &mut conn,
            CreateUserInput {
                id: Some("u1".to_string()),
                display_name: "User One".to_string(),
                email: None,
            },
        )
        .expect("create user");
        conn
    }

    fn seed_cell(conn: &mut SqliteConnection, category: &str, values: &[f32]) {
        let lines = values
            .iter()
            .map(|v| NewEntryInput {
                kind: "credit".to_string(),
                category: category.to_string(),
                value: *v,
            })
            .collect();
        create_submission(
            conn,
            CreateSubmissionInput {
                user_id: "u1".to_string(),
                source: "self_reported".to_string(),
                note: None,
                entries: lines,
            },
        )
        .expect("seed submission");
    }

    #[test]
    fn test_sum_cell_empty_is_zero() {
        let mut conn = setup_test_db();
        let total = sum_cell(&mut conn, "u1", "credit", "ethics", "confirmed").unwrap();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_sum_cell_matches_status_only() {
        let mut conn = setup_test_db();
        seed_cell(&mut conn, "ethics", &[1.5, 2.5]);

        // Entries start unconfirmed
        let unconfirmed = sum_cell(&mut conn, "u1", "credit", "ethics", "unconfirmed").unwrap();
        assert_eq!(unconfirmed, 4.0);
        let confirmed = sum_cell(&mut conn, "u1", "credit", "ethics", "confirmed").unwrap();
        assert_eq!(confirmed, 0.0);
    }

    #[test]
    fn test_sum_cell_rejects_bad_enums() {
        let mut conn = setup_test_db();
        assert!(matches!(
            sum_cell(&mut conn, "u1", "credit", "practice", "confirmed"),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            sum_cell(&mut conn, "u1", "credit", "ethics", "pending"),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rebalance_is_idempotent() {
        let mut conn = setup_test_db();
        seed_cell(&mut conn, "ethics", &[1.0, 2.0]);

        let first =
            rebalance_cell(&mut conn, "u1", "credit", "ethics", "unconfirmed", 5.0, "admin")
                .unwrap();
        assert!(!first.unchanged);
        assert_eq!(first.previous_value, 3.0);
        assert_eq!(
            sum_cell(&mut conn, "u1", "credit", "ethics", "unconfirmed").unwrap(),
            5.0
        );

        let second =
            rebalance_cell(&mut conn, "u1", "credit", "ethics", "unconfirmed", 5.0, "admin")
                .unwrap();
        assert!(second.unchanged);
        assert_eq!(second.previous_value, 5.0);
        assert_eq!(
            sum_cell(&mut conn, "u1", "credit", "ethics", "unconfirmed").unwrap(),
            5.0
        );
    }

    #[test]
    fn test_rebalance_replaces_entries_with_one() {
        let mut conn = setup_test_db();
        seed_cell(&mut conn, "ethics", &[1.0, 2.0, 3.0]);

        rebalance_cell(&mut conn, "u1", "credit", "ethics", "unconfirmed", 10.0, "admin")
            .unwrap();

        let remaining = list_user_entries(
            &mut conn,
            "u1",
            &EntryFilter {
                kind: Some("credit".to_string()),
                category: Some("ethics".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].value, 10.0);
        assert_eq!(remaining[0].reviewer_id.as_deref(), Some("admin"));
        // Unconfirmed synthetic entries carry no review timestamp
        assert!(remaining[0].reviewed_at.is_none());
    }

    #[test]
    fn test_rebalance_confirmed_records_review() {
        let mut conn = setup_test_db();

        rebalance_cell(&mut conn, "u1", "hour", "practice", "confirmed", 40.0, "admin")
            .unwrap();

        let hours = list_user_entries(
            &mut conn,
            "u1",
            &EntryFilter {
                kind: Some("hour".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(hours.len(), 1);
        assert_eq!(hours[0].status, "confirmed");
        assert!(hours[0].reviewed_at.is_some());
    }

    #[test]
    fn test_rebalance_to_zero_empties_cell() {
        let mut conn = setup_test_db();
        seed_cell(&mut conn, "ethics", &[2.0]);

        rebalance_cell(&mut conn, "u1", "credit", "ethics", "unconfirmed", 0.0, "admin")
            .unwrap();

        assert_eq!(
            sum_cell(&mut conn, "u1", "credit", "ethics", "unconfirmed").unwrap(),
            0.0
        );
        // The emptied batch is pruned with its last entry
        let subs = crate::db::ledger::list_user_submissions(&mut conn, "u1", 50, 0).unwrap();
        assert!(subs.is_empty());
    }

    #[test]
    fn test_rebalance_reuses_newest_submission() {
        let mut conn = setup_test_db();
        seed_cell(&mut conn, "ethics", &[2.0]);
        seed_cell(&mut conn, "general", &[1.0]);

        rebalance_cell(&mut conn, "u1", "credit", "cultural_diversity", "unconfirmed", 3.0, "admin")
            .unwrap();

        let subs = crate::db::ledger::list_user_submissions(&mut conn, "u1", 50, 0).unwrap();
        assert_eq!(subs.len(), 2, "no new submission should be created");
    }

    #[test]
    fn test_rebalance_validation() {
        let mut conn = setup_test_db();

        assert!(matches!(
            rebalance_cell(&mut conn, "u1", "credit", "ethics", "unconfirmed", -1.0, "admin"),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            rebalance_cell(&mut conn, "missing", "credit", "ethics", "unconfirmed", 1.0, "admin"),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_cell_matrix_groups_by_cell() {
        let mut conn = setup_test_db();
        seed_cell(&mut conn, "ethics", &[1.0, 2.0]);
        seed_cell(&mut conn, "general", &[4.0]);

        let matrix = cell_matrix(&mut conn, "u1").unwrap();
        assert_eq!(matrix.len(), 2);

        let ethics = matrix
            .iter()
            .find(|c| c.category == "ethics")
            .expect("ethics cell");
        assert_eq!(ethics.total, 3.0);
        assert_eq!(ethics.status, "unconfirmed");
    }
}
