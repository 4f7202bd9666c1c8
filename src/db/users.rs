//! User and level membership CRUD operations
//!
//! A user's rank is always derived from memberships: the highest-ordered
//! qualification level they hold. Nothing stores a computed rank.

use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use super::diesel_schema::{
    certificates, entries, level_memberships, submissions, target_levels, users,
};
use super::models::{current_timestamp, LevelMembership, NewLevelMembership, NewUser, User};
use crate::error::LedgerError;
use crate::levels::QualLevel;

// ============================================================================
// Query Types
// ============================================================================

/// Input for creating a user
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    #[serde(default)]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

// ============================================================================
// Read Operations
// ============================================================================

/// Get a user by ID
pub fn get_user(conn: &mut SqliteConnection, id: &str) -> Result<Option<User>, LedgerError> {
    users::table
        .filter(users::id.eq(id))
        .first(conn)
        .optional()
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// Get a user by ID, NotFound when missing
pub fn require_user(conn: &mut SqliteConnection, id: &str) -> Result<User, LedgerError> {
    get_user(conn, id)?.ok_or_else(|| LedgerError::NotFound(format!("User not found: {}", id)))
}

/// List users ordered by display name
pub fn list_users(
    conn: &mut SqliteConnection,
    limit: i64,
    offset: i64,
) -> Result<Vec<User>, LedgerError> {
    users::table
        .order(users::display_name.asc())
        .limit(limit)
        .offset(offset)
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// All level memberships for a user, lowest rank first
pub fn get_memberships(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<LevelMembership>, LedgerError> {
    let mut rows: Vec<LevelMembership> = level_memberships::table
        .filter(level_memberships::user_id.eq(user_id))
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    // Level order is the ladder's, not the strings'
    rows.sort_by_key(|m| {
        QualLevel::parse(&m.level)
            .map(|l| l.rank())
            .unwrap_or(u8::MAX)
    });
    Ok(rows)
}

/// Highest-ranked level the user currently holds
pub fn current_level(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<QualLevel>, LedgerError> {
    let levels: Vec<String> = level_memberships::table
        .filter(level_memberships::user_id.eq(user_id))
        .select(level_memberships::level)
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    Ok(levels.iter().filter_map(|l| QualLevel::parse(l).ok()).max())
}

// ============================================================================
// Write Operations
// ============================================================================

/// Create a user
pub fn create_user(
    conn: &mut SqliteConnection,
    input: CreateUserInput,
) -> Result<User, LedgerError> {
    if input.display_name.trim().is_empty() {
        return Err(LedgerError::InvalidArgument(
            "display_name must not be empty".to_string(),
        ));
    }

    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());

    if get_user(conn, &id)?.is_some() {
        return Err(LedgerError::Conflict(format!("User already exists: {}", id)));
    }

    let now = current_timestamp();
    let new_user = NewUser {
        id: &id,
        display_name: &input.display_name,
        email: input.email.as_deref(),
        created_at: &now,
        updated_at: &now,
    };

    diesel::insert_into(users::table)
        .values(&new_user)
        .execute(conn)
        .map_err(|e| LedgerError::Internal(format!("Insert failed: {}", e)))?;

    get_user(conn, &id)?
        .ok_or_else(|| LedgerError::Internal("Failed to retrieve created user".into()))
}

/// Grant a qualification level to a user. Granting a level already held
/// returns the existing membership. When the user's new rank reaches or
/// passes their locked target, the target is cleared in the same
/// transaction (system-driven unlock).
pub fn grant_level(
    conn: &mut SqliteConnection,
    user_id: &str,
    level: QualLevel,
) -> Result<LevelMembership, LedgerError> {
    require_user(conn, user_id)?;

    conn.transaction::<_, LedgerError, _>(|conn| {
        let existing: Option<LevelMembership> = level_memberships::table
            .filter(level_memberships::user_id.eq(user_id))
            .filter(level_memberships::level.eq(level.as_str()))
            .first(conn)
            .optional()?;

        if let Some(membership) = existing {
            return Ok(membership);
        }

        let id = Uuid::new_v4().to_string();
        let now = current_timestamp();
        let new_membership = NewLevelMembership {
            id: &id,
            user_id,
            level: level.as_str(),
            granted_at: &now,
        };

        diesel::insert_into(level_memberships::table)
            .values(&new_membership)
            .execute(conn)?;

        release_reached_target(conn, user_id)?;

        let membership = level_memberships::table
            .filter(level_memberships::id.eq(&id))
            .first(conn)?;
        Ok(membership)
    })
}

/// Clear the user's target when their rank has reached or passed it
fn release_reached_target(conn: &mut SqliteConnection, user_id: &str) -> Result<(), LedgerError> {
    let target: Option<String> = target_levels::table
        .filter(target_levels::user_id.eq(user_id))
        .select(target_levels::level)
        .first(conn)
        .optional()?;

    if let Some(target) = target {
        if let Ok(target_level) = QualLevel::parse(&target) {
            let rank = current_level(conn, user_id)?;
            if rank.map_or(false, |r| r >= target_level) {
                diesel::delete(target_levels::table.filter(target_levels::user_id.eq(user_id)))
                    .execute(conn)?;
            }
        }
    }
    Ok(())
}

/// Remove a held level. Returns false when the user never held it.
pub fn revoke_level(
    conn: &mut SqliteConnection,
    user_id: &str,
    level: QualLevel,
) -> Result<bool, LedgerError> {
    require_user(conn, user_id)?;

    let deleted = diesel::delete(
        level_memberships::table
            .filter(level_memberships::user_id.eq(user_id))
            .filter(level_memberships::level.eq(level.as_str())),
    )
    .execute(conn)
    .map_err(|e| LedgerError::Internal(format!("Delete failed: {}", e)))?;

    Ok(deleted > 0)
}

/// Delete a user and every dependent record in one transaction
pub fn delete_user_cascade(conn: &mut SqliteConnection, user_id: &str) -> Result<(), LedgerError> {
    require_user(conn, user_id)?;

    conn.transaction::<_, LedgerError, _>(|conn| {
        diesel::delete(entries::table.filter(entries::user_id.eq(user_id))).execute(conn)?;
        diesel::delete(submissions::table.filter(submissions::user_id.eq(user_id)))
            .execute(conn)?;
        diesel::delete(certificates::table.filter(certificates::user_id.eq(user_id)))
            .execute(conn)?;
        diesel::delete(target_levels::table.filter(target_levels::user_id.eq(user_id)))
            .execute(conn)?;
        diesel::delete(level_memberships::table.filter(level_memberships::user_id.eq(user_id)))
            .execute(conn)?;
        diesel::delete(users::table.filter(users::id.eq(user_id))).execute(conn)?;
        Ok(())
    })
}
