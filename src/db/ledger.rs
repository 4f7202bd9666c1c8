//! Submission and ledger entry CRUD operations
//!
//! Entries are the raw material of every aggregate in the system. They are
//! created in batches (one submission per batch), mutated only by review
//! actions or the cell rebalancer, and summed on demand by `db::cells`.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::diesel_schema::{entries, submissions};
use super::models::{
    current_timestamp, entry_kinds, entry_statuses, submission_sources, Entry, NewEntry,
    NewSubmission, Submission,
};
use super::users;
use crate::error::LedgerError;

// ============================================================================
// Query Types
// ============================================================================

/// One credit or hour line in a submission
#[derive(Debug, Clone, Deserialize)]
pub struct NewEntryInput {
    pub kind: String,
    pub category: String,
    pub value: f32,
}

/// Input for recording a submission batch
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubmissionInput {
    pub user_id: String,
    pub source: String,
    #[serde(default)]
    pub note: Option<String>,
    pub entries: Vec<NewEntryInput>,
}

/// A submission together with the entries it owns
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionWithEntries {
    pub submission: Submission,
    pub entries: Vec<Entry>,
}

/// Optional filters for entry listings
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub kind: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

/// Ledger-wide counters for dashboards
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub submission_count: i64,
    pub entry_count: i64,
    pub status_counts: Vec<(String, i64)>,
}

// ============================================================================
// Read Operations
// ============================================================================

/// Get a submission by ID
pub fn get_submission(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Submission>, LedgerError> {
    submissions::table
        .filter(submissions::id.eq(id))
        .first(conn)
        .optional()
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// Get a submission and its entries by ID
pub fn get_submission_with_entries(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<SubmissionWithEntries>, LedgerError> {
    let submission = match get_submission(conn, id)? {
        Some(s) => s,
        None => return Ok(None),
    };
    let entries = entries_for_submission(conn, id)?;
    Ok(Some(SubmissionWithEntries {
        submission,
        entries,
    }))
}

/// Entries owned by one submission, oldest first
pub fn entries_for_submission(
    conn: &mut SqliteConnection,
    submission_id: &str,
) -> Result<Vec<Entry>, LedgerError> {
    entries::table
        .filter(entries::submission_id.eq(submission_id))
        .order(entries::created_at.asc())
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// List a user's submissions with their entries, newest first
pub fn list_user_submissions(
    conn: &mut SqliteConnection,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<SubmissionWithEntries>, LedgerError> {
    let subs: Vec<Submission> = submissions::table
        .filter(submissions::user_id.eq(user_id))
        .order(submissions::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    let ids: Vec<&str> = subs.iter().map(|s| s.id.as_str()).collect();
    let all_entries: Vec<Entry> = entries::table
        .filter(entries::submission_id.eq_any(&ids))
        .order(entries::created_at.asc())
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    let mut result: Vec<SubmissionWithEntries> = subs
        .into_iter()
        .map(|submission| SubmissionWithEntries {
            submission,
            entries: Vec::new(),
        })
        .collect();
    for entry in all_entries {
        if let Some(swe) = result
            .iter_mut()
            .find(|swe| swe.submission.id == entry.submission_id)
        {
            swe.entries.push(entry);
        }
    }
    Ok(result)
}

/// The user's most recently created submission, if any
pub fn newest_submission_for_user(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<Submission>, LedgerError> {
    submissions::table
        .filter(submissions::user_id.eq(user_id))
        .order(submissions::created_at.desc())
        .first(conn)
        .optional()
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// Get an entry by ID
pub fn get_entry(conn: &mut SqliteConnection, id: &str) -> Result<Option<Entry>, LedgerError> {
    entries::table
        .filter(entries::id.eq(id))
        .first(conn)
        .optional()
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// Get an entry by ID, NotFound when missing
pub fn require_entry(conn: &mut SqliteConnection, id: &str) -> Result<Entry, LedgerError> {
    get_entry(conn, id)?.ok_or_else(|| LedgerError::NotFound(format!("Entry not found: {}", id)))
}

/// List a user's entries with optional kind/category/status filters
pub fn list_user_entries(
    conn: &mut SqliteConnection,
    user_id: &str,
    filter: &EntryFilter,
) -> Result<Vec<Entry>, LedgerError> {
    let mut query = entries::table
        .filter(entries::user_id.eq(user_id))
        .into_boxed();

    if let Some(kind) = &filter.kind {
        query = query.filter(entries::kind.eq(kind.clone()));
    }
    if let Some(category) = &filter.category {
        query = query.filter(entries::category.eq(category.clone()));
    }
    if let Some(status) = &filter.status {
        query = query.filter(entries::status.eq(status.clone()));
    }

    query
        .order(entries::created_at.asc())
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// Ledger-wide counters
pub fn ledger_stats(conn: &mut SqliteConnection) -> Result<LedgerStats, LedgerError> {
    let submission_count: i64 = submissions::table
        .count()
        .get_result(conn)
        .map_err(|e| LedgerError::Internal(format!("Count query failed: {}", e)))?;

    let entry_count: i64 = entries::table
        .count()
        .get_result(conn)
        .map_err(|e| LedgerError::Internal(format!("Count query failed: {}", e)))?;

    let status_counts: Vec<(String, i64)> = entries::table
        .group_by(entries::status)
        .select((entries::status, diesel::dsl::count_star()))
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Stats query failed: {}", e)))?;

    Ok(LedgerStats {
        submission_count,
        entry_count,
        status_counts,
    })
}

// ============================================================================
// Write Operations
// ============================================================================

/// Record a submission batch. Every entry starts UNCONFIRMED; the batch and
/// its entries are inserted in one transaction.
pub fn create_submission(
    conn: &mut SqliteConnection,
    input: CreateSubmissionInput,
) -> Result<SubmissionWithEntries, LedgerError> {
    if !submission_sources::is_valid(&input.source) {
        return Err(LedgerError::InvalidArgument(format!(
            "Invalid submission source '{}'. Valid sources: {:?}",
            input.source,
            submission_sources::ALL
        )));
    }
    if input.entries.is_empty() {
        return Err(LedgerError::InvalidArgument(
            "A submission must contain at least one entry".to_string(),
        ));
    }
    for line in &input.entries {
        validate_entry_line(line)?;
    }
    users::require_user(conn, &input.user_id)?;

    let submission_id = Uuid::new_v4().to_string();
    let now = current_timestamp();

    conn.transaction::<_, LedgerError, _>(|conn| {
        let new_submission = NewSubmission {
            id: &submission_id,
            user_id: &input.user_id,
            source: &input.source,
            note: input.note.as_deref(),
            created_at: &now,
        };
        diesel::insert_into(submissions::table)
            .values(&new_submission)
            .execute(conn)?;

        for line in &input.entries {
            let entry_id = Uuid::new_v4().to_string();
            let new_entry = NewEntry {
                id: &entry_id,
                submission_id: &submission_id,
                user_id: &input.user_id,
                kind: &line.kind,
                category: &line.category,
                value: line.value,
                status: entry_statuses::UNCONFIRMED,
                reviewer_id: None,
                reviewed_at: None,
                rejection_reason: None,
                created_at: &now,
                updated_at: &now,
            };
            diesel::insert_into(entries::table)
                .values(&new_entry)
                .execute(conn)?;
        }
        Ok(())
    })?;

    get_submission_with_entries(conn, &submission_id)?
        .ok_or_else(|| LedgerError::Internal("Failed to retrieve created submission".into()))
}

fn validate_entry_line(line: &NewEntryInput) -> Result<(), LedgerError> {
    if !entry_kinds::cell_is_valid(&line.kind, &line.category) {
        return Err(LedgerError::InvalidArgument(format!(
            "Invalid cell '{}/{}'. Valid kinds: {:?}; categories for '{}': {:?}",
            line.kind,
            line.category,
            entry_kinds::ALL,
            line.kind,
            entry_kinds::categories_for(&line.kind)
        )));
    }
    if !(line.value > 0.0) || !line.value.is_finite() {
        return Err(LedgerError::InvalidArgument(format!(
            "Entry value must be positive, got {}",
            line.value
        )));
    }
    Ok(())
}

/// Set one entry's review status. Rejection requires a reason and any other
/// status clears it; resetting to UNCONFIRMED clears the reviewer fields.
pub fn review_entry(
    conn: &mut SqliteConnection,
    entry_id: &str,
    status: &str,
    reviewer_id: &str,
    rejection_reason: Option<&str>,
) -> Result<Entry, LedgerError> {
    validate_review_inputs(status, rejection_reason)?;
    require_entry(conn, entry_id)?;

    let now = current_timestamp();
    let (reviewer, reviewed_at) = if entry_statuses::implies_review(status) {
        (Some(reviewer_id), Some(now.as_str()))
    } else {
        (None, None)
    };
    let reason = if status == entry_statuses::REJECTED {
        rejection_reason
    } else {
        None
    };

    diesel::update(entries::table.filter(entries::id.eq(entry_id)))
        .set((
            entries::status.eq(status),
            entries::reviewer_id.eq(reviewer),
            entries::reviewed_at.eq(reviewed_at),
            entries::rejection_reason.eq(reason),
            entries::updated_at.eq(&now),
        ))
        .execute(conn)
        .map_err(|e| LedgerError::Internal(format!("Update failed: {}", e)))?;

    require_entry(conn, entry_id)
}

/// Review every entry in a submission at once. Last writer wins per entry;
/// a batch review overwrites earlier per-entry decisions.
pub fn review_submission(
    conn: &mut SqliteConnection,
    submission_id: &str,
    status: &str,
    reviewer_id: &str,
    rejection_reason: Option<&str>,
) -> Result<Vec<Entry>, LedgerError> {
    validate_review_inputs(status, rejection_reason)?;
    if get_submission(conn, submission_id)?.is_none() {
        return Err(LedgerError::NotFound(format!(
            "Submission not found: {}",
            submission_id
        )));
    }

    let now = current_timestamp();
    let (reviewer, reviewed_at) = if entry_statuses::implies_review(status) {
        (Some(reviewer_id), Some(now.as_str()))
    } else {
        (None, None)
    };
    let reason = if status == entry_statuses::REJECTED {
        rejection_reason
    } else {
        None
    };

    conn.transaction::<_, LedgerError, _>(|conn| {
        diesel::update(entries::table.filter(entries::submission_id.eq(submission_id)))
            .set((
                entries::status.eq(status),
                entries::reviewer_id.eq(reviewer),
                entries::reviewed_at.eq(reviewed_at),
                entries::rejection_reason.eq(reason),
                entries::updated_at.eq(&now),
            ))
            .execute(conn)?;
        Ok(())
    })?;

    entries_for_submission(conn, submission_id)
}

/// Delete a user's submissions that no longer own any entries. The cell
/// rebalancer calls this after replacing a cell so emptied batches do not
/// accumulate.
pub fn prune_empty_submissions(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<usize, LedgerError> {
    let empty_ids: Vec<String> = submissions::table
        .left_join(entries::table)
        .filter(submissions::user_id.eq(user_id))
        .filter(entries::id.nullable().is_null())
        .select(submissions::id)
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    if empty_ids.is_empty() {
        return Ok(0);
    }

    diesel::delete(submissions::table.filter(submissions::id.eq_any(&empty_ids)))
        .execute(conn)
        .map_err(|e| LedgerError::Internal(format!("Delete failed: {}", e)))
}

fn validate_review_inputs(
    status: &str,
    rejection_reason: Option<&str>,
) -> Result<(), LedgerError> {
    if !entry_statuses::is_valid(status) {
        return Err(LedgerError::InvalidArgument(format!(
            "Invalid status '{}'. Valid statuses: {:?}",
            status,
            entry_statuses::ALL
        )));
    }
    if status == entry_statuses::REJECTED
        && rejection_reason.map_or(true, |r| r.trim().is_empty())
    {
        return Err(LedgerError::InvalidArgument(
            "Rejecting an entry requires a rejection reason".to_string(),
        ));
    }
    Ok(())
}
