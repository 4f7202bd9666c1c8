//! Target level row operations
//!
//! One row per user, keyed by user id. Absence of a row is the Unset state.
//! The transition rules (who may set or clear, strictly-above checks) live in
//! `services::target_service`; these functions only move rows.

use diesel::prelude::*;

use super::diesel_schema::target_levels;
use super::models::{current_timestamp, NewTargetLevel, TargetLevel};
use crate::error::LedgerError;
use crate::levels::QualLevel;

/// Get a user's stored target, if set
pub fn get_target(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<TargetLevel>, LedgerError> {
    target_levels::table
        .filter(target_levels::user_id.eq(user_id))
        .first(conn)
        .optional()
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// Set or replace a user's target level
pub fn set_target(
    conn: &mut SqliteConnection,
    user_id: &str,
    level: QualLevel,
    set_by: &str,
) -> Result<TargetLevel, LedgerError> {
    let now = current_timestamp();
    let new_target = NewTargetLevel {
        user_id,
        level: level.as_str(),
        set_by,
        set_at: &now,
    };

    diesel::insert_into(target_levels::table)
        .values(&new_target)
        .on_conflict(target_levels::user_id)
        .do_update()
        .set((
            target_levels::level.eq(level.as_str()),
            target_levels::set_by.eq(set_by),
            target_levels::set_at.eq(&now),
        ))
        .execute(conn)
        .map_err(|e| LedgerError::Internal(format!("Upsert failed: {}", e)))?;

    get_target(conn, user_id)?
        .ok_or_else(|| LedgerError::Internal("Failed to retrieve stored target".into()))
}

/// Clear a user's target. Returns false when none was set.
pub fn clear_target(conn: &mut SqliteConnection, user_id: &str) -> Result<bool, LedgerError> {
    let deleted =
        diesel::delete(target_levels::table.filter(target_levels::user_id.eq(user_id)))
            .execute(conn)
            .map_err(|e| LedgerError::Internal(format!("Delete failed: {}", e)))?;
    Ok(deleted > 0)
}
