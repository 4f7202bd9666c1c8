//! Qualification levels and the canonical promotion ladder
//!
//! One enumeration orders every level. Legacy roster names are normalized
//! at parse time and never stored or branched on downstream.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;

/// Qualification levels, lowest rank first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum QualLevel {
    /// Entry level - never a promotion target
    Apprentice = 0,
    Practitioner = 1,
    Curator = 2,
    Supervisor = 3,
    /// Terminal level - holders fall under annual maintenance instead
    Docent = 4,
}

impl QualLevel {
    pub const ALL: [QualLevel; 5] = [
        QualLevel::Apprentice,
        QualLevel::Practitioner,
        QualLevel::Curator,
        QualLevel::Supervisor,
        QualLevel::Docent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualLevel::Apprentice => "apprentice",
            QualLevel::Practitioner => "practitioner",
            QualLevel::Curator => "curator",
            QualLevel::Supervisor => "supervisor",
            QualLevel::Docent => "docent",
        }
    }

    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn from_rank(rank: u8) -> Option<QualLevel> {
        QualLevel::ALL.get(rank as usize).copied()
    }

    /// The level immediately above, None at the top of the ladder.
    pub fn next(&self) -> Option<QualLevel> {
        QualLevel::from_rank(self.rank() + 1)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QualLevel::Docent)
    }

    /// Levels the Target-Level Lock may point at: strictly above the entry
    /// level, below the terminal one (which needs no target).
    pub fn is_promotable_target(&self) -> bool {
        !matches!(self, QualLevel::Apprentice | QualLevel::Docent)
    }

    /// Parse a level name, case-insensitively. Accepts current names and the
    /// legacy roster names still present in imported data.
    pub fn parse(name: &str) -> Result<QualLevel, LedgerError> {
        match name.to_ascii_lowercase().as_str() {
            "apprentice" | "aspirant" => Ok(QualLevel::Apprentice),
            "practitioner" | "associate" => Ok(QualLevel::Practitioner),
            "curator" | "steward" => Ok(QualLevel::Curator),
            "supervisor" | "examiner" => Ok(QualLevel::Supervisor),
            "docent" | "emeritus" => Ok(QualLevel::Docent),
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown qualification level: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for QualLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
