//! Certificate service - chain mutations behind per-chain locks
//!
//! Every mutation rewrites the whole (user, level) chain, so two concurrent
//! mutations of the same chain must not interleave. A dashmap of per-chain
//! mutexes serializes them; different chains proceed in parallel. Reads take
//! no lock; they see whichever committed chain state is current.
//!
//! File bindings are released only after the owning transaction commits, and
//! release failures are logged, never surfaced.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::auth::{self, Actor};
use crate::db::models::Certificate;
use crate::db::{certificates, LedgerDb};
use crate::error::LedgerError;
use crate::levels::QualLevel;

use super::events::{EventBus, LedgerEvent};
use super::files::{release_best_effort, FileStore};

/// Certificate service for business logic
pub struct CertificateService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
    files: Arc<dyn FileStore>,
    chain_locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl CertificateService {
    /// Create a new certificate service
    pub fn new(db: Arc<LedgerDb>, events: Arc<EventBus>, files: Arc<dyn FileStore>) -> Self {
        Self {
            db,
            events,
            files,
            chain_locks: DashMap::new(),
        }
    }

    fn chain_lock(&self, user_id: &str, level: QualLevel) -> Arc<Mutex<()>> {
        self.chain_locks
            .entry((user_id.to_string(), level.as_str().to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn require_manager(&self, actor: &Actor) -> Result<(), LedgerError> {
        if !auth::can_manage_certificates(actor) {
            return Err(LedgerError::Forbidden(format!(
                "Actor {} may not manage certificates",
                actor.id
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Get a certificate by ID
    pub fn get(&self, id: &str) -> Result<Option<Certificate>, LedgerError> {
        self.db.with_conn(|conn| certificates::get_certificate(conn, id))
    }

    /// The chain for one (user, level), oldest first
    pub fn chain(&self, user_id: &str, level: &str) -> Result<Vec<Certificate>, LedgerError> {
        let level = QualLevel::parse(level)?;
        self.db
            .with_conn(|conn| certificates::list_chain(conn, user_id, level))
    }

    /// All certificates a user holds across levels
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Certificate>, LedgerError> {
        self.db
            .with_conn(|conn| certificates::list_user_certificates(conn, user_id))
    }

    /// The certificate currently in force for (user, level)
    pub fn find_active(
        &self,
        user_id: &str,
        level: &str,
    ) -> Result<Option<Certificate>, LedgerError> {
        let level = QualLevel::parse(level)?;
        self.db
            .with_conn(|conn| certificates::find_active(conn, user_id, level))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Issue a certificate into a chain
    pub fn issue(
        &self,
        actor: &Actor,
        input: certificates::IssueCertificateInput,
    ) -> Result<Certificate, LedgerError> {
        self.require_manager(actor)?;
        let level = QualLevel::parse(&input.level)?;

        let lock = self.chain_lock(&input.user_id, level);
        let issued = {
            let _guard = lock
                .lock()
                .map_err(|_| LedgerError::Internal("Chain lock poisoned".into()))?;
            self.db
                .with_conn(|conn| certificates::issue_certificate(conn, input))?
        };

        self.events.emit(LedgerEvent::CertificateIssued {
            certificate_id: issued.id.clone(),
            user_id: issued.user_id.clone(),
            level: issued.level.clone(),
        });
        Ok(issued)
    }

    /// Edit a certificate's dates or file, re-threading its chain. A
    /// displaced file binding is released after the commit.
    pub fn edit(
        &self,
        actor: &Actor,
        certificate_id: &str,
        input: certificates::EditCertificateInput,
    ) -> Result<Certificate, LedgerError> {
        self.require_manager(actor)?;

        let existing = self.require(certificate_id)?;
        let level = QualLevel::parse(&existing.level)?;

        let lock = self.chain_lock(&existing.user_id, level);
        let update = {
            let _guard = lock
                .lock()
                .map_err(|_| LedgerError::Internal("Chain lock poisoned".into()))?;
            self.db
                .with_conn(|conn| certificates::edit_certificate(conn, certificate_id, input))?
        };

        if let Some(old_file) = &update.replaced_file_id {
            release_best_effort(self.files.as_ref(), old_file);
        }
        self.events.emit(LedgerEvent::CertificateUpdated {
            certificate_id: update.certificate.id.clone(),
            user_id: update.certificate.user_id.clone(),
            level: update.certificate.level.clone(),
        });
        Ok(update.certificate)
    }

    /// Revoke a certificate, re-threading the survivors and releasing the
    /// revoked document's binding.
    pub fn revoke(&self, actor: &Actor, certificate_id: &str) -> Result<(), LedgerError> {
        self.require_manager(actor)?;

        let existing = self.require(certificate_id)?;
        let level = QualLevel::parse(&existing.level)?;

        let lock = self.chain_lock(&existing.user_id, level);
        let revoked = {
            let _guard = lock
                .lock()
                .map_err(|_| LedgerError::Internal("Chain lock poisoned".into()))?;
            self.db
                .with_conn(|conn| certificates::revoke_certificate(conn, certificate_id))?
        };

        release_best_effort(self.files.as_ref(), &revoked.file_id);
        self.events.emit(LedgerEvent::CertificateRevoked {
            certificate_id: revoked.id,
            user_id: revoked.user_id,
            level: revoked.level,
        });
        Ok(())
    }

    fn require(&self, certificate_id: &str) -> Result<Certificate, LedgerError> {
        self.db
            .with_conn(|conn| certificates::require_certificate(conn, certificate_id))
    }
}
