//! Service layer for the qualification ledger
//!
//! Services encapsulate business logic between the calling surface and the
//! repositories. Each service wraps database operations with:
//! - Input validation
//! - Capability checks (role floors, self-review prohibition, target lock)
//! - Event emission for audit/notifications
//! - Transaction boundaries
//!
//! ## Architecture
//!
//! ```text
//! Caller (admin surface, self-service)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod certificate_service;
pub mod eligibility_service;
pub mod events;
pub mod files;
pub mod ledger_service;
pub mod matrix_service;
pub mod target_service;
pub mod user_service;

// Re-exports
pub use certificate_service::CertificateService;
pub use eligibility_service::{Eligibility, EligibilityService, MaintenanceStatus};
pub use events::{EventBus, EventListener, LedgerEvent};
pub use files::{FileStore, NullFileStore};
pub use ledger_service::LedgerService;
pub use matrix_service::MatrixService;
pub use target_service::TargetService;
pub use user_service::UserService;

use crate::db::LedgerDb;
use std::sync::Arc;

/// Service container for dependency injection
///
/// Holds all services with a shared database pool and event bus.
pub struct Services {
    pub users: Arc<UserService>,
    pub ledger: Arc<LedgerService>,
    pub matrix: Arc<MatrixService>,
    pub eligibility: Arc<EligibilityService>,
    pub certificates: Arc<CertificateService>,
    pub targets: Arc<TargetService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services with a no-op file store
    pub fn new(db: Arc<LedgerDb>) -> Self {
        Self::with_file_store(db, Arc::new(NullFileStore))
    }

    /// Create all services against a real file storage collaborator
    pub fn with_file_store(db: Arc<LedgerDb>, files: Arc<dyn FileStore>) -> Self {
        Self::assemble(db, Arc::new(EventBus::new()), files)
    }

    /// Create all services sized from configuration
    pub fn from_config(
        db: Arc<LedgerDb>,
        config: &crate::config::Config,
        files: Arc<dyn FileStore>,
    ) -> Self {
        let events = Arc::new(EventBus::with_capacity(config.event_capacity));
        Self::assemble(db, events, files)
    }

    fn assemble(db: Arc<LedgerDb>, events: Arc<EventBus>, files: Arc<dyn FileStore>) -> Self {
        Self {
            users: Arc::new(UserService::new(db.clone(), events.clone())),
            ledger: Arc::new(LedgerService::new(db.clone(), events.clone())),
            matrix: Arc::new(MatrixService::new(db.clone(), events.clone())),
            eligibility: Arc::new(EligibilityService::new(db.clone())),
            certificates: Arc::new(CertificateService::new(
                db.clone(),
                events.clone(),
                files,
            )),
            targets: Arc::new(TargetService::new(db, events.clone())),
            events,
        }
    }
}
