//! Integration tests for the qualification ledger service surface
//!
//! These tests drive full lifecycles through `Services` over an in-memory
//! database: submissions flowing through review into eligibility reports,
//! destructive matrix rebalances, certificate chain maintenance, and the
//! target-level lock.

use std::sync::{Arc, Mutex};

use credential_ledger::db::certificates::{EditCertificateInput, IssueCertificateInput};
use credential_ledger::db::ledger::{CreateSubmissionInput, NewEntryInput};
use credential_ledger::db::users::CreateUserInput;
use credential_ledger::services::FileStore;
use credential_ledger::{Actor, LedgerDb, LedgerError, LedgerEvent, QualLevel, Role, Services};

/// Acting administrator for setup and corrections
const ADMIN_ID: &str = "admin-1";

fn admin() -> Actor {
    Actor::new(ADMIN_ID, Role::Admin)
}

fn reviewer() -> Actor {
    Actor::new("reviewer-1", Role::Reviewer)
}

/// Helper to build the service container over a fresh in-memory database
fn create_services() -> Services {
    let db = Arc::new(LedgerDb::open_in_memory().unwrap());
    Services::new(db)
}

/// Helper to build services with one registered user
fn create_services_with_user(user_id: &str) -> Services {
    let services = create_services();
    services
        .users
        .create(
            &admin(),
            CreateUserInput {
                id: Some(user_id.to_string()),
                display_name: format!("User {}", user_id),
                email: None,
            },
        )
        .unwrap();
    services
}

fn credit(category: &str, value: f32) -> NewEntryInput {
    NewEntryInput {
        kind: "credit".to_string(),
        category: category.to_string(),
        value,
    }
}

fn hours(category: &str, value: f32) -> NewEntryInput {
    NewEntryInput {
        kind: "hour".to_string(),
        category: category.to_string(),
        value,
    }
}

fn submission(user_id: &str, entries: Vec<NewEntryInput>) -> CreateSubmissionInput {
    CreateSubmissionInput {
        user_id: user_id.to_string(),
        source: "self_reported".to_string(),
        note: None,
        entries,
    }
}

/// Test the full path from self-service submission through review to an
/// eligibility report
#[test]
fn test_submission_review_eligibility_lifecycle() {
    let services = create_services_with_user("marisol");
    services
        .users
        .grant_level(&admin(), "marisol", "apprentice")
        .unwrap();

    // Record one workshop's worth of credits and hours
    let recorded = services
        .ledger
        .record_submission(
            &Actor::new("marisol", Role::Member),
            submission(
                "marisol",
                vec![
                    credit("ethics", 1.0),
                    credit("general", 8.0),
                    hours("practice", 50.0),
                ],
            ),
        )
        .unwrap();
    assert_eq!(recorded.entries.len(), 3);

    // Unreviewed entries count toward nothing yet
    let before = services.eligibility.eligibility("marisol", None).unwrap();
    assert_eq!(before.current_level, Some(QualLevel::Apprentice));
    assert_eq!(before.target_level, Some(QualLevel::Practitioner));
    assert_eq!(before.usable.ceu_ethics, 0.0);
    assert_eq!(before.lifetime.ceu_ethics, 0.0);

    // Reviewer confirms the whole batch
    let confirmed = services
        .ledger
        .review_submission(&reviewer(), &recorded.submission.id, "confirmed", None)
        .unwrap();
    assert_eq!(confirmed.len(), 3);
    assert!(confirmed.iter().all(|entry| entry.status == "confirmed"));

    // Practitioner gate: 2 ethics, 16 general, 100 practice hours
    let report = services.eligibility.eligibility("marisol", None).unwrap();
    assert_eq!(report.usable.ceu_ethics, 1.0);
    let percent = report.percent.unwrap();
    assert_eq!(percent.ceu_ethics, 50);
    assert_eq!(percent.ceu_general, 50);
    assert_eq!(percent.hours_practice, 50);

    // The same totals measured against an explicit higher gate
    let curator = services
        .eligibility
        .eligibility("marisol", Some("curator"))
        .unwrap();
    assert_eq!(curator.target_level, Some(QualLevel::Curator));
    assert_eq!(curator.percent.unwrap().ceu_ethics, 25);
}

/// Test a destructive cell rebalance and its idempotence contract
#[test]
fn test_matrix_rebalance_end_to_end() {
    let services = create_services_with_user("owner");

    let recorded = services
        .ledger
        .record_submission(
            &reviewer(),
            submission("owner", vec![credit("general", 6.0), credit("general", 4.0)]),
        )
        .unwrap();
    services
        .ledger
        .review_submission(&reviewer(), &recorded.submission.id, "confirmed", None)
        .unwrap();

    // Force the confirmed general-credit cell to an audited total
    let outcome = services
        .matrix
        .rebalance(&admin(), "owner", "credit", "general", "confirmed", 24.0)
        .unwrap();
    assert!(!outcome.unchanged);
    assert_eq!(outcome.previous_value, 10.0);
    assert_eq!(
        services
            .matrix
            .sum_cell("owner", "credit", "general", "confirmed")
            .unwrap(),
        24.0
    );

    // Repeating the same target touches nothing
    let repeat = services
        .matrix
        .rebalance(&admin(), "owner", "credit", "general", "confirmed", 24.0)
        .unwrap();
    assert!(repeat.unchanged);
    assert_eq!(repeat.previous_value, 24.0);

    // The matrix view reflects the forced total
    let matrix = services.matrix.matrix("owner").unwrap();
    let cell = matrix
        .iter()
        .find(|cell| cell.category == "general" && cell.status == "confirmed")
        .unwrap();
    assert_eq!(cell.total, 24.0);

    // Administrators may not rebalance their own cells
    let denied = services
        .matrix
        .rebalance(
            &Actor::new("owner", Role::Admin),
            "owner",
            "credit",
            "general",
            "confirmed",
            1.0,
        )
        .unwrap_err();
    assert!(denied.is_forbidden());
}

/// Test chain threading when certificates arrive out of date order
#[test]
fn test_certificate_chain_out_of_order() {
    let services = create_services_with_user("holder");
    let issue_input = |file: &str, issued: &str, expires: &str| IssueCertificateInput {
        user_id: "holder".to_string(),
        level: "practitioner".to_string(),
        file_id: file.to_string(),
        issued_at: issued.to_string(),
        expires_at: expires.to_string(),
    };

    let march = services
        .certificates
        .issue(&reviewer(), issue_input("file-mar", "2024-03-01", "2030-03-01"))
        .unwrap();
    let january = services
        .certificates
        .issue(&reviewer(), issue_input("file-jan", "2024-01-01", "2030-01-01"))
        .unwrap();
    let february = services
        .certificates
        .issue(&reviewer(), issue_input("file-feb", "2024-02-01", "2030-02-01"))
        .unwrap();

    // The chain reads in issue order no matter the arrival order
    let chain = services
        .certificates
        .chain("holder", "practitioner")
        .unwrap();
    let ids: Vec<&str> = chain.iter().map(|cert| cert.id.as_str()).collect();
    assert_eq!(
        ids,
        [january.id.as_str(), february.id.as_str(), march.id.as_str()]
    );
    assert_eq!(chain[0].previous_id, None);
    assert_eq!(chain[1].previous_id.as_deref(), Some(january.id.as_str()));
    assert_eq!(chain[2].previous_id.as_deref(), Some(february.id.as_str()));
    assert_eq!(chain[0].is_renewal, 0);
    assert_eq!(chain[1].is_renewal, 1);

    // Revoking the middle link reattaches its successor to its predecessor
    services
        .certificates
        .revoke(&reviewer(), &february.id)
        .unwrap();
    let chain = services
        .certificates
        .chain("holder", "practitioner")
        .unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[1].previous_id.as_deref(), Some(january.id.as_str()));

    // Active is the unexpired certificate with the latest expiry
    let active = services
        .certificates
        .find_active("holder", "practitioner")
        .unwrap()
        .unwrap();
    assert_eq!(active.id, march.id);
}

/// Records released file ids so collaborator calls can be asserted
struct RecordingStore {
    released: Mutex<Vec<String>>,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            released: Mutex::new(Vec::new()),
        }
    }

    fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

impl FileStore for RecordingStore {
    fn release_file(&self, file_id: &str) -> Result<(), LedgerError> {
        self.released.lock().unwrap().push(file_id.to_string());
        Ok(())
    }
}

/// Test that editing a certificate re-threads its chain and releases the
/// replaced file only after the commit
#[test]
fn test_certificate_edit_rethreads_and_releases_file() {
    let db = Arc::new(LedgerDb::open_in_memory().unwrap());
    let store = Arc::new(RecordingStore::new());
    let services = Services::with_file_store(db, store.clone() as Arc<dyn FileStore>);
    services
        .users
        .create(
            &admin(),
            CreateUserInput {
                id: Some("holder".to_string()),
                display_name: "Holder".to_string(),
                email: None,
            },
        )
        .unwrap();
    let issue_input = |file: &str, issued: &str, expires: &str| IssueCertificateInput {
        user_id: "holder".to_string(),
        level: "curator".to_string(),
        file_id: file.to_string(),
        issued_at: issued.to_string(),
        expires_at: expires.to_string(),
    };

    let first = services
        .certificates
        .issue(&reviewer(), issue_input("file-a", "2024-01-01", "2030-01-01"))
        .unwrap();
    let second = services
        .certificates
        .issue(&reviewer(), issue_input("file-b", "2025-06-01", "2031-06-01"))
        .unwrap();

    // A file already bound to a certificate cannot be bound again
    let conflict = services
        .certificates
        .issue(&reviewer(), issue_input("file-a", "2026-01-01", "2032-01-01"))
        .unwrap_err();
    assert!(matches!(conflict, LedgerError::Conflict(_)));
    assert!(store.released().is_empty());

    // Moving the first certificate past the second re-threads the chain
    let edited = services
        .certificates
        .edit(
            &reviewer(),
            &first.id,
            EditCertificateInput {
                issued_at: Some("2026-02-01".to_string()),
                file_id: Some("file-c".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(edited.file_id, "file-c");
    assert_eq!(store.released(), ["file-a".to_string()]);

    let chain = services.certificates.chain("holder", "curator").unwrap();
    assert_eq!(chain[0].id, second.id);
    assert_eq!(chain[1].id, first.id);
    assert_eq!(chain[1].previous_id.as_deref(), Some(second.id.as_str()));
}

/// Test the target lock from first choice through rank-up release
#[test]
fn test_target_lock_lifecycle() {
    let services = create_services_with_user("aspiring");
    services
        .users
        .grant_level(&admin(), "aspiring", "apprentice")
        .unwrap();

    // First choice is self-service
    let own = Actor::new("aspiring", Role::Member);
    let target = services
        .targets
        .set(&own, "aspiring", "practitioner")
        .unwrap();
    assert_eq!(target.level, "practitioner");

    // Locked until the rank advances
    let locked = services.targets.set(&own, "aspiring", "curator").unwrap_err();
    assert!(matches!(locked, LedgerError::TargetLocked(_)));
    assert!(locked.is_forbidden());
    let cleared = services.targets.clear(&own, "aspiring").unwrap_err();
    assert!(cleared.is_forbidden());

    // Administrators may override
    services.targets.set(&admin(), "aspiring", "curator").unwrap();

    // Advancing to practitioner stays below the curator target
    services
        .users
        .grant_level(&admin(), "aspiring", "practitioner")
        .unwrap();
    assert!(services.targets.get("aspiring").unwrap().is_some());

    // Reaching the target releases the lock for the next choice
    services
        .users
        .grant_level(&admin(), "aspiring", "curator")
        .unwrap();
    assert!(services.targets.get("aspiring").unwrap().is_none());
    services
        .targets
        .set(&own, "aspiring", "supervisor")
        .unwrap();
}

/// Test that the docent promotion gate and annual maintenance stay separate
#[test]
fn test_docent_maintenance_decoupled_from_promotion() {
    let services = create_services_with_user("elder");
    services
        .users
        .grant_level(&admin(), "elder", "docent")
        .unwrap();

    // Terminal holders face a zero promotion gate
    let report = services.eligibility.eligibility("elder", None).unwrap();
    assert_eq!(report.current_level, Some(QualLevel::Docent));
    assert_eq!(report.target_level, None);
    let required = report.required.unwrap();
    assert_eq!(required.ceu_ethics, 0.0);
    assert_eq!(report.percent.unwrap().ceu_ethics, 0);

    // Maintenance runs on its own annual table
    let recorded = services
        .ledger
        .record_submission(
            &Actor::new("elder", Role::Member),
            submission("elder", vec![credit("ethics", 1.0), hours("supervision", 4.0)]),
        )
        .unwrap();
    services
        .ledger
        .review_submission(&reviewer(), &recorded.submission.id, "confirmed", None)
        .unwrap();

    let maintenance = services
        .eligibility
        .maintenance_status("elder")
        .unwrap()
        .unwrap();
    assert_eq!(maintenance.required.ceu_ethics, 1.0);
    assert_eq!(maintenance.percent.ceu_ethics, 100);
    assert_eq!(maintenance.percent.hours_supervision, 50);

    // Non-terminal holders have no maintenance report
    services
        .users
        .create(
            &admin(),
            CreateUserInput {
                id: Some("junior".to_string()),
                display_name: "Junior".to_string(),
                email: None,
            },
        )
        .unwrap();
    services
        .users
        .grant_level(&admin(), "junior", "practitioner")
        .unwrap();
    assert!(services
        .eligibility
        .maintenance_status("junior")
        .unwrap()
        .is_none());
}

/// Test that write operations publish events in order after commit
#[test]
fn test_write_operations_publish_events() {
    let services = create_services();
    let mut rx = services.events.subscribe();

    services
        .users
        .create(
            &admin(),
            CreateUserInput {
                id: Some("pilot".to_string()),
                display_name: "Pilot".to_string(),
                email: None,
            },
        )
        .unwrap();
    services
        .users
        .grant_level(&admin(), "pilot", "apprentice")
        .unwrap();
    let recorded = services
        .ledger
        .record_submission(&reviewer(), submission("pilot", vec![credit("general", 4.0)]))
        .unwrap();
    services
        .matrix
        .rebalance(&admin(), "pilot", "credit", "general", "confirmed", 12.0)
        .unwrap();

    assert!(matches!(
        rx.try_recv().unwrap(),
        LedgerEvent::UserCreated { .. }
    ));
    assert!(matches!(
        rx.try_recv().unwrap(),
        LedgerEvent::LevelGranted { .. }
    ));
    match rx.try_recv().unwrap() {
        LedgerEvent::SubmissionRecorded {
            submission_id,
            entry_count,
            ..
        } => {
            assert_eq!(submission_id, recorded.submission.id);
            assert_eq!(entry_count, 1);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    match rx.try_recv().unwrap() {
        LedgerEvent::CellRebalanced {
            previous_value,
            new_value,
            ..
        } => {
            assert_eq!(previous_value, 0.0);
            assert_eq!(new_value, 12.0);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(rx.try_recv().is_err());
}
