//! Credential Ledger - qualification tracking and certificate chains
//!
//! Tracks continuing-education credits and supervised-practice hours for
//! professional practitioners, compares them against per-level requirement
//! tables, and maintains a time-ordered chain of certificates per user and
//! qualification level.
//!
//! ## Architecture
//!
//! - **Ledger store** (`db::ledger`): raw credit/hour entries batched into
//!   submissions, each entry carrying a review status
//! - **Aggregation** (`db::cells`): per-(user, kind, category, status) cell
//!   sums, always derived, never persisted
//! - **Rebalancer** (`db::cells`): administrative override forcing a cell to
//!   an exact total by destructive replacement
//! - **Requirement resolver** (`requirements`, `services::eligibility_service`):
//!   level requirement tables and attainment percentages
//! - **Certificate chains** (`db::certificates`): a linked list per
//!   (user, level), rebuilt whole on every mutation
//! - **Target lock** (`services::target_service`): which level a user may
//!   pursue next, locked once chosen
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use credential_ledger::{Config, LedgerDb, Services};
//!
//! # fn main() -> Result<(), credential_ledger::LedgerError> {
//! let config = Config::default();
//! let db = Arc::new(LedgerDb::open(&config)?);
//! let services = Services::new(db);
//!
//! let report = services.eligibility.eligibility("some-user", None)?;
//! println!("usable ethics CEUs: {}", report.usable.ceu_ethics);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod levels;
pub mod requirements;
pub mod services;

// Re-exports
pub use auth::{Actor, Role};
pub use config::Config;
pub use db::LedgerDb;
pub use error::LedgerError;
pub use levels::QualLevel;
pub use requirements::{CategoryPercents, CategoryTotals};
pub use services::{EventBus, LedgerEvent, Services};
