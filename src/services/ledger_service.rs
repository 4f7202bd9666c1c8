//! Ledger service - submission recording and review decisions
//!
//! Members record their own batches; reviewers decide them. The self-review
//! prohibition is intrinsic: no role may confirm, reject, or spend entries
//! they own.

use std::sync::Arc;

use crate::auth::{self, Actor, Role};
use crate::db::models::Entry;
use crate::db::{ledger, LedgerDb, LedgerStats, SubmissionWithEntries};
use crate::error::LedgerError;

use super::events::{EventBus, LedgerEvent};

/// Ledger service for business logic
pub struct LedgerService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
}

impl LedgerService {
    /// Create a new ledger service
    pub fn new(db: Arc<LedgerDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Get a submission with its entries
    pub fn get_submission(
        &self,
        id: &str,
    ) -> Result<Option<SubmissionWithEntries>, LedgerError> {
        self.db
            .with_conn(|conn| ledger::get_submission_with_entries(conn, id))
    }

    /// List a user's submissions, newest first
    pub fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SubmissionWithEntries>, LedgerError> {
        self.db
            .with_conn(|conn| ledger::list_user_submissions(conn, user_id, limit, offset))
    }

    /// List a user's entries with optional filters
    pub fn list_entries(
        &self,
        user_id: &str,
        filter: &ledger::EntryFilter,
    ) -> Result<Vec<Entry>, LedgerError> {
        self.db
            .with_conn(|conn| ledger::list_user_entries(conn, user_id, filter))
    }

    /// Ledger-wide counters for dashboards
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        self.db.with_conn(ledger::ledger_stats)
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Record a submission batch. Members may record only their own;
    /// reviewers and admins may record on behalf of anyone.
    pub fn record_submission(
        &self,
        actor: &Actor,
        input: ledger::CreateSubmissionInput,
    ) -> Result<SubmissionWithEntries, LedgerError> {
        if actor.id != input.user_id && actor.role < Role::Reviewer {
            return Err(LedgerError::Forbidden(format!(
                "Actor {} may not record submissions for user {}",
                actor.id, input.user_id
            )));
        }

        let result = self
            .db
            .with_conn(|conn| ledger::create_submission(conn, input))?;

        self.events.emit(LedgerEvent::SubmissionRecorded {
            submission_id: result.submission.id.clone(),
            user_id: result.submission.user_id.clone(),
            entry_count: result.entries.len(),
        });
        Ok(result)
    }

    /// Decide one entry: confirm, reject with a reason, mark spent, or reset
    /// to unconfirmed.
    pub fn review_entry(
        &self,
        actor: &Actor,
        entry_id: &str,
        status: &str,
        rejection_reason: Option<&str>,
    ) -> Result<Entry, LedgerError> {
        let reviewed = self.db.with_conn(|conn| {
            let entry = ledger::require_entry(conn, entry_id)?;
            if !auth::can_review_cell(actor, &entry.user_id) {
                return Err(LedgerError::Forbidden(format!(
                    "Actor {} may not review entries owned by {}",
                    actor.id, entry.user_id
                )));
            }
            ledger::review_entry(conn, entry_id, status, &actor.id, rejection_reason)
        })?;

        self.events.emit(LedgerEvent::EntryReviewed {
            entry_id: reviewed.id.clone(),
            user_id: reviewed.user_id.clone(),
            status: reviewed.status.clone(),
            reviewer_id: actor.id.clone(),
        });
        Ok(reviewed)
    }

    /// Decide a whole submission batch at once
    pub fn review_submission(
        &self,
        actor: &Actor,
        submission_id: &str,
        status: &str,
        rejection_reason: Option<&str>,
    ) -> Result<Vec<Entry>, LedgerError> {
        let (owner, reviewed) = self.db.with_conn(|conn| {
            let submission = ledger::get_submission(conn, submission_id)?.ok_or_else(|| {
                LedgerError::NotFound(format!("Submission not found: {}", submission_id))
            })?;
            if !auth::can_review_cell(actor, &submission.user_id) {
                return Err(LedgerError::Forbidden(format!(
                    "Actor {} may not review entries owned by {}",
                    actor.id, submission.user_id
                )));
            }
            let entries = ledger::review_submission(
                conn,
                submission_id,
                status,
                &actor.id,
                rejection_reason,
            )?;
            Ok((submission.user_id, entries))
        })?;

        self.events.emit(LedgerEvent::SubmissionReviewed {
            submission_id: submission_id.to_string(),
            user_id: owner,
            status: status.to_string(),
            entry_count: reviewed.len(),
        });
        Ok(reviewed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ledger::{CreateSubmissionInput, NewEntryInput};
    use crate::db::users::{create_user, CreateUserInput};

    fn setup() -> LedgerService {
        let db = Arc::new(LedgerDb::open_in_memory().expect("open db"));
        db.with_conn(|conn| {
            create_user(
                conn,
                CreateUserInput {
                    id: Some("owner".to_string()),
                    display_name: "Owner".to_string(),
                    email: None,
                },
            )
        })
        .expect("seed user");
        LedgerService::new(db, Arc::new(EventBus::new()))
    }

    fn submission_input() -> CreateSubmissionInput {
        CreateSubmissionInput {
            user_id: "owner".to_string(),
            source: "self_reported".to_string(),
            note: None,
            entries: vec![NewEntryInput {
                kind: "credit".to_string(),
                category: "ethics".to_string(),
                value: 2.0,
            }],
        }
    }

    #[test]
    fn test_member_records_own_submission_only() {
        let service = setup();
        let owner = Actor::new("owner", Role::Member);
        let stranger = Actor::new("other", Role::Member);

        service
            .record_submission(&owner, submission_input())
            .unwrap();

        let err = service
            .record_submission(&stranger, submission_input())
            .unwrap_err();
        assert!(err.is_forbidden());
    }

    #[test]
    fn test_self_review_is_forbidden() {
        let service = setup();
        let owner_as_reviewer = Actor::new("owner", Role::Reviewer);
        let owner_as_admin = Actor::new("owner", Role::Admin);
        let reviewer = Actor::new("rev", Role::Reviewer);

        let swe = service
            .record_submission(&owner_as_reviewer, submission_input())
            .unwrap();
        let entry_id = swe.entries[0].id.clone();

        // Role does not matter; owners never decide their own entries
        let err = service
            .review_entry(&owner_as_reviewer, &entry_id, "confirmed", None)
            .unwrap_err();
        assert!(err.is_forbidden());
        let err = service
            .review_submission(&owner_as_admin, &swe.submission.id, "confirmed", None)
            .unwrap_err();
        assert!(err.is_forbidden());

        let reviewed = service
            .review_entry(&reviewer, &entry_id, "confirmed", None)
            .unwrap();
        assert_eq!(reviewed.status, "confirmed");
        assert_eq!(reviewed.reviewer_id.as_deref(), Some("rev"));
    }

    #[test]
    fn test_member_cannot_review() {
        let service = setup();
        let owner = Actor::new("owner", Role::Member);
        let member = Actor::new("other", Role::Member);

        let swe = service.record_submission(&owner, submission_input()).unwrap();

        let err = service
            .review_submission(&member, &swe.submission.id, "confirmed", None)
            .unwrap_err();
        assert!(err.is_forbidden());
    }
}
