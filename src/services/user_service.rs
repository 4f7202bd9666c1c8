//! User service - account and level membership administration
//!
//! Wraps the user repository with role checks, event emission, and the
//! system-driven target unlock that rides along with level grants.

use std::sync::Arc;

use crate::auth::{self, Actor};
use crate::db::{self, users, LedgerDb};
use crate::error::LedgerError;
use crate::levels::QualLevel;

use super::events::{EventBus, LedgerEvent};

/// User service for business logic
pub struct UserService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
}

impl UserService {
    /// Create a new user service
    pub fn new(db: Arc<LedgerDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Get a user by ID
    pub fn get(&self, id: &str) -> Result<Option<db::models::User>, LedgerError> {
        self.db.with_conn(|conn| users::get_user(conn, id))
    }

    /// List users ordered by display name
    pub fn list(&self, limit: i64, offset: i64) -> Result<Vec<db::models::User>, LedgerError> {
        self.db.with_conn(|conn| users::list_users(conn, limit, offset))
    }

    /// All levels a user holds, lowest first
    pub fn memberships(
        &self,
        user_id: &str,
    ) -> Result<Vec<db::models::LevelMembership>, LedgerError> {
        self.db.with_conn(|conn| users::get_memberships(conn, user_id))
    }

    /// Highest-ranked level the user holds
    pub fn current_level(&self, user_id: &str) -> Result<Option<QualLevel>, LedgerError> {
        self.db.with_conn(|conn| users::current_level(conn, user_id))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a user
    pub fn create(
        &self,
        actor: &Actor,
        input: users::CreateUserInput,
    ) -> Result<db::models::User, LedgerError> {
        if !auth::can_manage_users(actor) {
            return Err(LedgerError::Forbidden(format!(
                "Actor {} may not manage users",
                actor.id
            )));
        }

        let user = self.db.with_conn(|conn| users::create_user(conn, input))?;

        self.events.emit(LedgerEvent::UserCreated {
            user_id: user.id.clone(),
            display_name: user.display_name.clone(),
        });
        Ok(user)
    }

    /// Grant a qualification level. When the grant advances the user's rank
    /// to a locked target, the lock is released in the same transaction and
    /// a system clear event is emitted.
    pub fn grant_level(
        &self,
        actor: &Actor,
        user_id: &str,
        level: &str,
    ) -> Result<db::models::LevelMembership, LedgerError> {
        if !auth::can_manage_users(actor) {
            return Err(LedgerError::Forbidden(format!(
                "Actor {} may not manage users",
                actor.id
            )));
        }
        let level = QualLevel::parse(level)?;

        let (membership, target_released) = self.db.with_conn(|conn| {
            let had_target = db::target_levels::get_target(conn, user_id)?.is_some();
            let membership = users::grant_level(conn, user_id, level)?;
            let has_target = db::target_levels::get_target(conn, user_id)?.is_some();
            Ok((membership, had_target && !has_target))
        })?;

        self.events.emit(LedgerEvent::LevelGranted {
            user_id: user_id.to_string(),
            level: level.as_str().to_string(),
        });
        if target_released {
            self.events.emit(LedgerEvent::TargetLevelCleared {
                user_id: user_id.to_string(),
                cleared_by: "system".to_string(),
            });
        }
        Ok(membership)
    }

    /// Remove a held level
    pub fn revoke_level(
        &self,
        actor: &Actor,
        user_id: &str,
        level: &str,
    ) -> Result<bool, LedgerError> {
        if !auth::can_manage_users(actor) {
            return Err(LedgerError::Forbidden(format!(
                "Actor {} may not manage users",
                actor.id
            )));
        }
        let level = QualLevel::parse(level)?;

        let revoked = self
            .db
            .with_conn(|conn| users::revoke_level(conn, user_id, level))?;

        if revoked {
            self.events.emit(LedgerEvent::LevelRevoked {
                user_id: user_id.to_string(),
                level: level.as_str().to_string(),
            });
        }
        Ok(revoked)
    }

    /// Delete a user and everything they own
    pub fn delete(&self, actor: &Actor, user_id: &str) -> Result<(), LedgerError> {
        if !auth::can_manage_users(actor) {
            return Err(LedgerError::Forbidden(format!(
                "Actor {} may not manage users",
                actor.id
            )));
        }

        self.db
            .with_conn(|conn| users::delete_user_cascade(conn, user_id))?;

        self.events.emit(LedgerEvent::UserDeleted {
            user_id: user_id.to_string(),
        });
        Ok(())
    }
}
