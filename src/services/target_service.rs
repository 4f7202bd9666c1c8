//! Target level service - the lock state machine
//!
//! A user's target is either unset or locked to one promotable level. Users
//! lock their own next target freely, but once locked only an administrator
//! may change or clear it; the lock otherwise releases itself when the
//! user's rank reaches the target (handled inside level grants).

use std::sync::Arc;

use crate::auth::{self, Actor};
use crate::db::models::TargetLevel;
use crate::db::{target_levels, users, LedgerDb};
use crate::error::LedgerError;
use crate::levels::QualLevel;

use super::events::{EventBus, LedgerEvent};

/// Target level service for the lock state machine
pub struct TargetService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
}

impl TargetService {
    /// Create a new target service
    pub fn new(db: Arc<LedgerDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// The user's stored target, if locked
    pub fn get(&self, user_id: &str) -> Result<Option<TargetLevel>, LedgerError> {
        self.db
            .with_conn(|conn| target_levels::get_target(conn, user_id))
    }

    /// Lock a user's target to `level`, or move an existing lock (admin
    /// only). The level must be promotable and strictly above the user's
    /// current rank.
    pub fn set(
        &self,
        actor: &Actor,
        user_id: &str,
        level: &str,
    ) -> Result<TargetLevel, LedgerError> {
        if !auth::can_edit_target(actor, user_id) {
            return Err(LedgerError::Forbidden(format!(
                "Actor {} may not edit the target for user {}",
                actor.id, user_id
            )));
        }
        let level = QualLevel::parse(level)?;

        let stored = self.db.with_conn(|conn| {
            users::require_user(conn, user_id)?;

            if !level.is_promotable_target() {
                return Err(LedgerError::InvalidArgument(format!(
                    "{} is not a valid target level",
                    level
                )));
            }
            let current = users::current_level(conn, user_id)?;
            if let Some(current) = current {
                if level <= current {
                    return Err(LedgerError::InvalidArgument(format!(
                        "Target {} must be strictly above the current level {}",
                        level, current
                    )));
                }
            }

            if let Some(existing) = target_levels::get_target(conn, user_id)? {
                if !actor.is_admin() {
                    return Err(LedgerError::TargetLocked(format!(
                        "Target for user {} is locked to {} until their rank advances",
                        user_id, existing.level
                    )));
                }
            }

            target_levels::set_target(conn, user_id, level, &actor.id)
        })?;

        self.events.emit(LedgerEvent::TargetLevelSet {
            user_id: user_id.to_string(),
            level: level.as_str().to_string(),
            set_by: actor.id.clone(),
        });
        Ok(stored)
    }

    /// Clear a locked target (admin only). Returns false when nothing was
    /// set.
    pub fn clear(&self, actor: &Actor, user_id: &str) -> Result<bool, LedgerError> {
        if !auth::can_edit_target(actor, user_id) {
            return Err(LedgerError::Forbidden(format!(
                "Actor {} may not edit the target for user {}",
                actor.id, user_id
            )));
        }

        let cleared = self.db.with_conn(|conn| {
            users::require_user(conn, user_id)?;

            match target_levels::get_target(conn, user_id)? {
                None => Ok(false),
                Some(existing) => {
                    if !actor.is_admin() {
                        return Err(LedgerError::TargetLocked(format!(
                            "Target for user {} is locked to {} until their rank advances",
                            user_id, existing.level
                        )));
                    }
                    target_levels::clear_target(conn, user_id)
                }
            }
        })?;

        if cleared {
            self.events.emit(LedgerEvent::TargetLevelCleared {
                user_id: user_id.to_string(),
                cleared_by: actor.id.clone(),
            });
        }
        Ok(cleared)
    }
}
