//! File storage collaborator seam
//!
//! Certificates bind a file id owned by an external document store. The
//! engine never touches file bytes; it only reports when a binding is
//! dropped (revocation, file replacement) so the store can clean up.
//! Release is best-effort: a failure is logged, never propagated into the
//! operation that dropped the binding.

use tracing::warn;

use crate::error::LedgerError;

/// External file storage collaborator
pub trait FileStore: Send + Sync {
    /// Drop a stored file. Called only after the transaction that unbound
    /// the file has committed.
    fn release_file(&self, file_id: &str) -> Result<(), LedgerError>;
}

/// No-op store for deployments that manage certificate documents elsewhere
pub struct NullFileStore;

impl FileStore for NullFileStore {
    fn release_file(&self, _file_id: &str) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// Release a file binding, logging instead of failing
pub(crate) fn release_best_effort(store: &dyn FileStore, file_id: &str) {
    if let Err(e) = store.release_file(file_id) {
        warn!(file = %file_id, error = %e, "Failed to release certificate file");
    }
}
