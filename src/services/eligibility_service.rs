//! Eligibility service - requirement resolution and attainment reporting
//!
//! Resolves which level a user is measured against, folds their confirmed
//! ledger cells into category totals, and reports attainment against the
//! requirement tables. Read-only; every call sees one database snapshot.
//!
//! Terminal-level holders are a special case: promotion requirements are
//! zero (there is nothing above), while the separate annual maintenance
//! table is reported through `maintenance_status`.

use std::sync::Arc;

use serde::Serialize;

use crate::db::models::{current_date, entry_statuses};
use crate::db::{cells, ledger, target_levels, users, LedgerDb};
use crate::error::LedgerError;
use crate::levels::QualLevel;
use crate::requirements::{
    attainment_percents, maintenance_requirements, requirements_to_attain, CategoryPercents,
    CategoryTotals,
};

/// Attainment report for one user against one target level
#[derive(Debug, Clone, Serialize)]
pub struct Eligibility {
    pub user_id: String,
    pub current_level: Option<QualLevel>,
    /// Level the report measures against; None when the user holds no level
    /// and no target was given or stored
    pub target_level: Option<QualLevel>,
    /// Requirement table for the target; None when no target resolves
    pub required: Option<CategoryTotals>,
    /// Confirmed, unspent totals per category
    pub usable: CategoryTotals,
    /// Confirmed plus spent totals per category
    pub lifetime: CategoryTotals,
    /// Raw attainment, may exceed 100
    pub percent: Option<CategoryPercents>,
    /// Attainment capped at 100 for progress displays
    pub progress: Option<CategoryPercents>,
}

/// Annual maintenance report for a terminal-level holder
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceStatus {
    pub user_id: String,
    pub year: String,
    pub required: CategoryTotals,
    /// Confirmed totals reviewed within the year
    pub usable: CategoryTotals,
    pub percent: CategoryPercents,
}

/// Eligibility service for requirement resolution
pub struct EligibilityService {
    db: Arc<LedgerDb>,
}

impl EligibilityService {
    /// Create a new eligibility service
    pub fn new(db: Arc<LedgerDb>) -> Self {
        Self { db }
    }

    /// Attainment against a target level. The target is the explicit
    /// argument when given, else the user's stored target, else the level
    /// immediately above their current one.
    pub fn eligibility(
        &self,
        user_id: &str,
        explicit_target: Option<&str>,
    ) -> Result<Eligibility, LedgerError> {
        let explicit = match explicit_target {
            Some(name) => Some(QualLevel::parse(name)?),
            None => None,
        };

        self.db.with_conn(|conn| {
            users::require_user(conn, user_id)?;

            let current = users::current_level(conn, user_id)?;
            let stored = match target_levels::get_target(conn, user_id)? {
                Some(row) => Some(QualLevel::parse(&row.level)?),
                None => None,
            };
            let target = explicit
                .or(stored)
                .or_else(|| current.and_then(|level| level.next()));

            let required = match target {
                Some(level) => requirements_to_attain(level),
                // Terminal holders have nowhere to promote to; the gate is zero
                None if current.map_or(false, |level| level.is_terminal()) => {
                    Some(CategoryTotals::ZERO)
                }
                None => None,
            };

            let (usable, lifetime) = fold_cells(conn, user_id)?;

            let percent = required
                .as_ref()
                .map(|req| attainment_percents(req, &usable));
            let progress = percent.as_ref().map(|p| p.clamped());

            Ok(Eligibility {
                user_id: user_id.to_string(),
                current_level: current,
                target_level: target,
                required,
                usable,
                lifetime,
                percent,
                progress,
            })
        })
    }

    /// Annual maintenance report. None unless the user holds the terminal
    /// level; the window is the current calendar year of review timestamps.
    pub fn maintenance_status(
        &self,
        user_id: &str,
    ) -> Result<Option<MaintenanceStatus>, LedgerError> {
        self.db.with_conn(|conn| {
            users::require_user(conn, user_id)?;

            let holds_terminal = users::current_level(conn, user_id)?
                .map_or(false, |level| level.is_terminal());
            if !holds_terminal {
                return Ok(None);
            }

            let year = current_date()[..4].to_string();
            let confirmed = ledger::list_user_entries(
                conn,
                user_id,
                &ledger::EntryFilter {
                    status: Some(entry_statuses::CONFIRMED.to_string()),
                    ..Default::default()
                },
            )?;

            let mut usable = CategoryTotals::ZERO;
            for entry in &confirmed {
                let in_window = entry
                    .reviewed_at
                    .as_deref()
                    .map_or(false, |ts| ts.starts_with(&year));
                if in_window {
                    usable.add(&entry.kind, &entry.category, entry.value);
                }
            }

            let required = maintenance_requirements();
            let percent = attainment_percents(&required, &usable);

            Ok(Some(MaintenanceStatus {
                user_id: user_id.to_string(),
                year,
                required,
                usable,
                percent,
            }))
        })
    }
}

/// Fold a user's cells into (usable, lifetime) category totals
fn fold_cells(
    conn: &mut diesel::sqlite::SqliteConnection,
    user_id: &str,
) -> Result<(CategoryTotals, CategoryTotals), LedgerError> {
    let matrix = cells::cell_matrix(conn, user_id)?;

    let mut usable = CategoryTotals::ZERO;
    let mut lifetime = CategoryTotals::ZERO;
    for cell in &matrix {
        if entry_statuses::is_usable(&cell.status) {
            usable.add(&cell.kind, &cell.category, cell.total);
        }
        if entry_statuses::counts_toward_lifetime(&cell.status) {
            lifetime.add(&cell.kind, &cell.category, cell.total);
        }
    }
    Ok((usable, lifetime))
}
