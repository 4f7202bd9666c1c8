//! Actor roles and capability predicates
//!
//! Transport-level authorization stays with the caller. The predicates here
//! consolidate the rules the engine itself must hold: the self-review
//! prohibition and the role floors for review, rebalance, certificate, and
//! target administration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Actor roles ordered by privilege
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Role {
    /// Practitioner acting on their own record
    #[default]
    Member = 0,
    /// May review submissions from others and issue certificates
    Reviewer = 1,
    /// May rebalance cells, manage users, and override target locks
    Admin = 2,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Member => write!(f, "member"),
            Role::Reviewer => write!(f, "reviewer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Already-authenticated caller identity, supplied by the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role >= Role::Admin
    }
}

/// Review (confirm/reject/spend) entries in a cell owned by `owner_id`.
/// Reviewing one's own submissions is never allowed, whatever the role.
pub fn can_review_cell(actor: &Actor, owner_id: &str) -> bool {
    actor.role >= Role::Reviewer && actor.id != owner_id
}

/// Force a cell total to an exact value. Same self-review bar, admin only.
pub fn can_rebalance_cell(actor: &Actor, owner_id: &str) -> bool {
    actor.role >= Role::Admin && actor.id != owner_id
}

/// Change `user_id`'s target level. Users may set their own (subject to the
/// lock state machine); admins may change anyone's.
pub fn can_edit_target(actor: &Actor, user_id: &str) -> bool {
    actor.role >= Role::Admin || actor.id == user_id
}

/// Issue, edit, and revoke certificates.
pub fn can_manage_certificates(actor: &Actor) -> bool {
    actor.role >= Role::Reviewer
}

/// Create users, grant level memberships, and delete user records.
pub fn can_manage_users(actor: &Actor) -> bool {
    actor.role >= Role::Admin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::Reviewer);
        assert!(Role::Reviewer > Role::Member);
    }

    #[test]
    fn test_review_requires_reviewer_role() {
        let member = Actor::new("u1", Role::Member);
        let reviewer = Actor::new("u2", Role::Reviewer);
        let admin = Actor::new("u3", Role::Admin);

        assert!(!can_review_cell(&member, "owner"));
        assert!(can_review_cell(&reviewer, "owner"));
        assert!(can_review_cell(&admin, "owner"));
    }

    #[test]
    fn test_self_review_blocked_for_every_role() {
        let reviewer = Actor::new("u2", Role::Reviewer);
        let admin = Actor::new("u3", Role::Admin);

        assert!(!can_review_cell(&reviewer, "u2"));
        assert!(!can_review_cell(&admin, "u3"));
        assert!(!can_rebalance_cell(&admin, "u3"));
    }

    #[test]
    fn test_rebalance_is_admin_only() {
        let reviewer = Actor::new("u2", Role::Reviewer);
        let admin = Actor::new("u3", Role::Admin);

        assert!(!can_rebalance_cell(&reviewer, "owner"));
        assert!(can_rebalance_cell(&admin, "owner"));
    }

    #[test]
    fn test_target_edit_self_or_admin() {
        let member = Actor::new("u1", Role::Member);
        let admin = Actor::new("u3", Role::Admin);

        assert!(can_edit_target(&member, "u1"));
        assert!(!can_edit_target(&member, "someone-else"));
        assert!(can_edit_target(&admin, "someone-else"));
    }
}
