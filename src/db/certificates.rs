//! Certificate chain CRUD and the full-chain rebuild
//!
//! Certificates for one (user, level) form a single linked list ordered by
//! issue date, threaded through `previous_id`. Every mutation rebuilds the
//! whole chain from scratch instead of patching pointers around the change:
//! fetch the set ordered by issue date and reassign every pointer. Dangling
//! or duplicated `previous` links cannot survive a rebuild, no matter where
//! in history the mutation landed.
//!
//! Ties on `issued_at` are broken by `created_at`, then id, so rebuilds are
//! deterministic.

use chrono::NaiveDate;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use super::diesel_schema::certificates;
use super::models::{current_date, current_timestamp, Certificate, NewCertificate};
use super::users;
use crate::error::LedgerError;
use crate::levels::QualLevel;

// ============================================================================
// Query Types
// ============================================================================

/// Input for issuing a certificate
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCertificateInput {
    pub user_id: String,
    pub level: String,
    pub file_id: String,
    pub issued_at: String,
    pub expires_at: String,
}

/// Input for editing a certificate; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditCertificateInput {
    #[serde(default)]
    pub issued_at: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
}

/// An edited certificate plus the file binding it displaced, if any
#[derive(Debug, Clone)]
pub struct CertificateUpdate {
    pub certificate: Certificate,
    /// Previous file id when the edit replaced the bound file. The caller
    /// releases it only after the transaction has committed.
    pub replaced_file_id: Option<String>,
}

fn validate_date(field: &str, value: &str) -> Result<(), LedgerError> {
    // Stored dates compare lexicographically, so only the zero-padded
    // canonical form may be persisted
    let canonical = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string());
    if canonical.as_deref() != Some(value) {
        return Err(LedgerError::InvalidArgument(format!(
            "Invalid {} '{}', expected YYYY-MM-DD",
            field, value
        )));
    }
    Ok(())
}

fn validate_date_pair(issued_at: &str, expires_at: &str) -> Result<(), LedgerError> {
    validate_date("issued_at", issued_at)?;
    validate_date("expires_at", expires_at)?;
    if issued_at > current_date().as_str() {
        return Err(LedgerError::InvalidArgument(format!(
            "issued_at '{}' must not be in the future",
            issued_at
        )));
    }
    if expires_at <= issued_at {
        return Err(LedgerError::InvalidArgument(format!(
            "expires_at '{}' must be after issued_at '{}'",
            expires_at, issued_at
        )));
    }
    Ok(())
}

// ============================================================================
// Read Operations
// ============================================================================

/// Get a certificate by ID
pub fn get_certificate(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Certificate>, LedgerError> {
    certificates::table
        .filter(certificates::id.eq(id))
        .first(conn)
        .optional()
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// Get a certificate by ID, NotFound when missing
pub fn require_certificate(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Certificate, LedgerError> {
    get_certificate(conn, id)?
        .ok_or_else(|| LedgerError::NotFound(format!("Certificate not found: {}", id)))
}

/// All certificates for one (user, level), oldest first
pub fn list_chain(
    conn: &mut SqliteConnection,
    user_id: &str,
    level: QualLevel,
) -> Result<Vec<Certificate>, LedgerError> {
    certificates::table
        .filter(certificates::user_id.eq(user_id))
        .filter(certificates::level.eq(level.as_str()))
        .order((
            certificates::issued_at.asc(),
            certificates::created_at.asc(),
            certificates::id.asc(),
        ))
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// All certificates for a user across levels, grouped by level then date
pub fn list_user_certificates(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<Certificate>, LedgerError> {
    certificates::table
        .filter(certificates::user_id.eq(user_id))
        .order((
            certificates::level.asc(),
            certificates::issued_at.asc(),
            certificates::created_at.asc(),
            certificates::id.asc(),
        ))
        .load(conn)
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))
}

/// Whether a file id is already bound to a certificate other than `exclude`
pub fn file_in_use(
    conn: &mut SqliteConnection,
    file_id: &str,
    exclude: Option<&str>,
) -> Result<bool, LedgerError> {
    let mut query = certificates::table
        .filter(certificates::file_id.eq(file_id))
        .into_boxed();
    if let Some(id) = exclude {
        query = query.filter(certificates::id.ne(id.to_string()));
    }

    let count: i64 = query
        .count()
        .get_result(conn)
        .map_err(|e| LedgerError::Internal(format!("Count query failed: {}", e)))?;
    Ok(count > 0)
}

/// The certificate currently in force for (user, level): the one with the
/// latest expiry that has not yet expired, else the most recently issued.
pub fn find_active(
    conn: &mut SqliteConnection,
    user_id: &str,
    level: QualLevel,
) -> Result<Option<Certificate>, LedgerError> {
    let chain = list_chain(conn, user_id, level)?;
    let today = current_date();

    let active = chain
        .iter()
        .filter(|c| c.expires_at.as_str() >= today.as_str())
        .max_by(|a, b| {
            (a.expires_at.as_str(), a.issued_at.as_str(), a.id.as_str()).cmp(&(
                b.expires_at.as_str(),
                b.issued_at.as_str(),
                b.id.as_str(),
            ))
        })
        .cloned();

    Ok(active.or_else(|| chain.last().cloned()))
}

// ============================================================================
// Write Operations
// ============================================================================

/// Issue a certificate into the (user, level) chain. The insert position
/// follows from the issue date; the whole chain is rebuilt so the new node's
/// neighbors point where they should.
pub fn issue_certificate(
    conn: &mut SqliteConnection,
    input: IssueCertificateInput,
) -> Result<Certificate, LedgerError> {
    let level = QualLevel::parse(&input.level)?;
    validate_date_pair(&input.issued_at, &input.expires_at)?;
    if input.file_id.trim().is_empty() {
        return Err(LedgerError::InvalidArgument(
            "file_id must not be empty".to_string(),
        ));
    }
    users::require_user(conn, &input.user_id)?;
    if file_in_use(conn, &input.file_id, None)? {
        return Err(LedgerError::Conflict(format!(
            "File already bound to a certificate: {}",
            input.file_id
        )));
    }

    let id = Uuid::new_v4().to_string();
    let now = current_timestamp();

    conn.transaction::<_, LedgerError, _>(|conn| {
        let new_certificate = NewCertificate {
            id: &id,
            user_id: &input.user_id,
            level: level.as_str(),
            file_id: &input.file_id,
            previous_id: None,
            is_renewal: 0,
            issued_at: &input.issued_at,
            expires_at: &input.expires_at,
            created_at: &now,
            updated_at: &now,
        };
        diesel::insert_into(certificates::table)
            .values(&new_certificate)
            .execute(conn)?;

        rebuild_chain(conn, &input.user_id, level)?;
        Ok(())
    })?;

    require_certificate(conn, &id)
}

/// Apply field changes to a certificate, then rebuild its chain. Returns the
/// refreshed certificate and the displaced file id when the file changed.
pub fn edit_certificate(
    conn: &mut SqliteConnection,
    certificate_id: &str,
    input: EditCertificateInput,
) -> Result<CertificateUpdate, LedgerError> {
    let existing = require_certificate(conn, certificate_id)?;
    let level = QualLevel::parse(&existing.level)?;

    let issued_at = input.issued_at.as_deref().unwrap_or(&existing.issued_at);
    let expires_at = input.expires_at.as_deref().unwrap_or(&existing.expires_at);
    validate_date_pair(issued_at, expires_at)?;

    let file_id = input.file_id.as_deref().unwrap_or(&existing.file_id);
    let replaced_file_id = if file_id != existing.file_id {
        if file_id.trim().is_empty() {
            return Err(LedgerError::InvalidArgument(
                "file_id must not be empty".to_string(),
            ));
        }
        if file_in_use(conn, file_id, Some(certificate_id))? {
            return Err(LedgerError::Conflict(format!(
                "File already bound to a certificate: {}",
                file_id
            )));
        }
        Some(existing.file_id.clone())
    } else {
        None
    };

    conn.transaction::<_, LedgerError, _>(|conn| {
        diesel::update(certificates::table.filter(certificates::id.eq(certificate_id)))
            .set((
                certificates::issued_at.eq(issued_at),
                certificates::expires_at.eq(expires_at),
                certificates::file_id.eq(file_id),
                certificates::updated_at.eq(current_timestamp()),
            ))
            .execute(conn)?;

        rebuild_chain(conn, &existing.user_id, level)?;
        Ok(())
    })?;

    let certificate = require_certificate(conn, certificate_id)?;
    Ok(CertificateUpdate {
        certificate,
        replaced_file_id,
    })
}

/// Remove a certificate and re-thread the surviving chain around the gap.
/// Returns the removed certificate so the caller can release its file.
pub fn revoke_certificate(
    conn: &mut SqliteConnection,
    certificate_id: &str,
) -> Result<Certificate, LedgerError> {
    let existing = require_certificate(conn, certificate_id)?;
    let level = QualLevel::parse(&existing.level)?;

    conn.transaction::<_, LedgerError, _>(|conn| {
        diesel::delete(certificates::table.filter(certificates::id.eq(certificate_id)))
            .execute(conn)?;

        rebuild_chain(conn, &existing.user_id, level)?;
        Ok(())
    })?;

    Ok(existing)
}

/// Reassign every `previous_id` and renewal flag for one (user, level) from
/// the issue-date order. Runs inside the caller's transaction.
fn rebuild_chain(
    conn: &mut SqliteConnection,
    user_id: &str,
    level: QualLevel,
) -> Result<(), diesel::result::Error> {
    let chain: Vec<(String, Option<String>, i32)> = certificates::table
        .filter(certificates::user_id.eq(user_id))
        .filter(certificates::level.eq(level.as_str()))
        .order((
            certificates::issued_at.asc(),
            certificates::created_at.asc(),
            certificates::id.asc(),
        ))
        .select((
            certificates::id,
            certificates::previous_id,
            certificates::is_renewal,
        ))
        .load(conn)?;

    let mut expected_previous: Option<String> = None;
    for (index, (id, stored_previous, stored_renewal)) in chain.iter().enumerate() {
        let renewal = i32::from(index > 0);
        if *stored_previous != expected_previous || *stored_renewal != renewal {
            diesel::update(certificates::table.filter(certificates::id.eq(id)))
                .set((
                    certificates::previous_id.eq(expected_previous.as_deref()),
                    certificates::is_renewal.eq(renewal),
                ))
                .execute(conn)?;
        }
        expected_previous = Some(id.clone());
    }
    Ok(())
}
