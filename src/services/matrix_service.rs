//! Matrix service - cell aggregation and the administrative rebalance
//!
//! Reads are plain queries. The rebalance is the one write: admin only,
//! never on the admin's own cells, and the owner is notified through the
//! event bus after the replacement commits.

use std::sync::Arc;

use crate::auth::{self, Actor};
use crate::db::{cells, CellTotal, LedgerDb, RebalanceOutcome};
use crate::error::LedgerError;

use super::events::{EventBus, LedgerEvent};

/// Matrix service for business logic
pub struct MatrixService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
}

impl MatrixService {
    /// Create a new matrix service
    pub fn new(db: Arc<LedgerDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Current sum for one cell
    pub fn sum_cell(
        &self,
        user_id: &str,
        kind: &str,
        category: &str,
        status: &str,
    ) -> Result<f32, LedgerError> {
        self.db
            .with_conn(|conn| cells::sum_cell(conn, user_id, kind, category, status))
    }

    /// Every non-empty cell for a user
    pub fn matrix(&self, user_id: &str) -> Result<Vec<CellTotal>, LedgerError> {
        self.db.with_conn(|conn| cells::cell_matrix(conn, user_id))
    }

    /// Force a cell to an exact total. Notifies the owner unless the cell
    /// already matched and nothing was touched.
    pub fn rebalance(
        &self,
        actor: &Actor,
        user_id: &str,
        kind: &str,
        category: &str,
        status: &str,
        target_value: f32,
    ) -> Result<RebalanceOutcome, LedgerError> {
        if !auth::can_rebalance_cell(actor, user_id) {
            return Err(LedgerError::Forbidden(format!(
                "Actor {} may not rebalance cells for user {}",
                actor.id, user_id
            )));
        }

        let outcome = self.db.with_conn(|conn| {
            cells::rebalance_cell(conn, user_id, kind, category, status, target_value, &actor.id)
        })?;

        if !outcome.unchanged {
            self.events.emit(LedgerEvent::CellRebalanced {
                user_id: user_id.to_string(),
                kind: kind.to_string(),
                category: category.to_string(),
                status: status.to_string(),
                previous_value: outcome.previous_value,
                new_value: target_value,
            });
        }
        Ok(outcome)
    }
}
