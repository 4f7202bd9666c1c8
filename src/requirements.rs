//! Promotion and maintenance requirement tables
//!
//! Requirements are cumulative lifetime totals keyed by the level being
//! attained. Tables are monotonically non-decreasing along the ladder. The
//! entry level has no table (nothing is required to hold it) and promotion
//! from the terminal level requires nothing; terminal holders instead carry
//! the separate annual maintenance table.

use serde::{Deserialize, Serialize};

use crate::db::models::{credit_categories, entry_kinds, hour_categories};
use crate::levels::QualLevel;

/// Per-category totals, used both for requirement tables and ledger sums
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub ceu_ethics: f32,
    pub ceu_cultural_diversity: f32,
    pub ceu_supervision: f32,
    pub ceu_general: f32,
    pub hours_practice: f32,
    pub hours_supervision: f32,
    pub hours_mentor: f32,
}

impl CategoryTotals {
    pub const ZERO: CategoryTotals = CategoryTotals {
        ceu_ethics: 0.0,
        ceu_cultural_diversity: 0.0,
        ceu_supervision: 0.0,
        ceu_general: 0.0,
        hours_practice: 0.0,
        hours_supervision: 0.0,
        hours_mentor: 0.0,
    };

    /// Accumulate a (kind, category) sum into the matching field. Unknown
    /// pairs are ignored so stale rows cannot poison a report.
    pub fn add(&mut self, kind: &str, category: &str, value: f32) {
        match (kind, category) {
            (entry_kinds::CREDIT, credit_categories::ETHICS) => self.ceu_ethics += value,
            (entry_kinds::CREDIT, credit_categories::CULTURAL_DIVERSITY) => {
                self.ceu_cultural_diversity += value
            }
            (entry_kinds::CREDIT, credit_categories::SUPERVISION) => self.ceu_supervision += value,
            (entry_kinds::CREDIT, credit_categories::GENERAL) => self.ceu_general += value,
            (entry_kinds::HOUR, hour_categories::PRACTICE) => self.hours_practice += value,
            (entry_kinds::HOUR, hour_categories::SUPERVISION) => self.hours_supervision += value,
            (entry_kinds::HOUR, hour_categories::MENTOR) => self.hours_mentor += value,
            _ => {}
        }
    }
}

const PRACTITIONER: CategoryTotals = CategoryTotals {
    ceu_ethics: 2.0,
    ceu_cultural_diversity: 2.0,
    ceu_supervision: 0.0,
    ceu_general: 16.0,
    hours_practice: 100.0,
    hours_supervision: 10.0,
    hours_mentor: 0.0,
};

const CURATOR: CategoryTotals = CategoryTotals {
    ceu_ethics: 4.0,
    ceu_cultural_diversity: 4.0,
    ceu_supervision: 8.0,
    ceu_general: 24.0,
    hours_practice: 400.0,
    hours_supervision: 40.0,
    hours_mentor: 0.0,
};

const SUPERVISOR: CategoryTotals = CategoryTotals {
    ceu_ethics: 6.0,
    ceu_cultural_diversity: 6.0,
    ceu_supervision: 24.0,
    ceu_general: 44.0,
    hours_practice: 1200.0,
    hours_supervision: 120.0,
    hours_mentor: 12.0,
};

const DOCENT: CategoryTotals = CategoryTotals {
    ceu_ethics: 8.0,
    ceu_cultural_diversity: 8.0,
    ceu_supervision: 48.0,
    ceu_general: 56.0,
    hours_practice: 2400.0,
    hours_supervision: 240.0,
    hours_mentor: 48.0,
};

const DOCENT_MAINTENANCE: CategoryTotals = CategoryTotals {
    ceu_ethics: 1.0,
    ceu_cultural_diversity: 1.0,
    ceu_supervision: 4.0,
    ceu_general: 6.0,
    hours_practice: 0.0,
    hours_supervision: 8.0,
    hours_mentor: 4.0,
};

/// Totals required to attain `level`. None for the entry level, which is
/// never a promotion target.
pub fn requirements_to_attain(level: QualLevel) -> Option<CategoryTotals> {
    match level {
        QualLevel::Apprentice => None,
        QualLevel::Practitioner => Some(PRACTITIONER),
        QualLevel::Curator => Some(CURATOR),
        QualLevel::Supervisor => Some(SUPERVISOR),
        QualLevel::Docent => Some(DOCENT),
    }
}

/// Totals required to advance from `level` to the one above it. The terminal
/// level has no further gate and requires nothing.
pub fn requirements_to_advance_from(level: QualLevel) -> CategoryTotals {
    level
        .next()
        .and_then(requirements_to_attain)
        .unwrap_or(CategoryTotals::ZERO)
}

/// Annual maintenance table applying to terminal-level holders.
pub fn maintenance_requirements() -> CategoryTotals {
    DOCENT_MAINTENANCE
}

/// Per-category attainment percentages, rounded to whole points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryPercents {
    pub ceu_ethics: u32,
    pub ceu_cultural_diversity: u32,
    pub ceu_supervision: u32,
    pub ceu_general: u32,
    pub hours_practice: u32,
    pub hours_supervision: u32,
    pub hours_mentor: u32,
}

impl CategoryPercents {
    /// Copy with every field capped at 100, for progress-bar contexts.
    pub fn clamped(&self) -> CategoryPercents {
        CategoryPercents {
            ceu_ethics: self.ceu_ethics.min(100),
            ceu_cultural_diversity: self.ceu_cultural_diversity.min(100),
            ceu_supervision: self.ceu_supervision.min(100),
            ceu_general: self.ceu_general.min(100),
            hours_practice: self.hours_practice.min(100),
            hours_supervision: self.hours_supervision.min(100),
            hours_mentor: self.hours_mentor.min(100),
        }
    }
}

/// Rounded attainment percentage. A requirement of zero reports zero no
/// matter what was attained.
pub fn attainment_percent(required: f32, usable: f32) -> u32 {
    if required > 0.0 {
        (usable / required * 100.0).round() as u32
    } else {
        0
    }
}

/// Field-by-field attainment against a requirement table. Unclamped.
pub fn attainment_percents(required: &CategoryTotals, usable: &CategoryTotals) -> CategoryPercents {
    CategoryPercents {
        ceu_ethics: attainment_percent(required.ceu_ethics, usable.ceu_ethics),
        ceu_cultural_diversity: attainment_percent(
            required.ceu_cultural_diversity,
            usable.ceu_cultural_diversity,
        ),
        ceu_supervision: attainment_percent(required.ceu_supervision, usable.ceu_supervision),
        ceu_general: attainment_percent(required.ceu_general, usable.ceu_general),
        hours_practice: attainment_percent(required.hours_practice, usable.hours_practice),
        hours_supervision: attainment_percent(required.hours_supervision, usable.hours_supervision),
        hours_mentor: attainment_percent(required.hours_mentor, usable.hours_mentor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(t: &CategoryTotals) -> [f32; 7] {
        [
            t.ceu_ethics,
            t.ceu_cultural_diversity,
            t.ceu_supervision,
            t.ceu_general,
            t.hours_practice,
            t.hours_supervision,
            t.hours_mentor,
        ]
    }

    #[test]
    fn test_tables_monotonic_along_ladder() {
        let ladder = [PRACTITIONER, CURATOR, SUPERVISOR, DOCENT];
        for pair in ladder.windows(2) {
            let (lower, upper) = (fields(&pair[0]), fields(&pair[1]));
            for i in 0..lower.len() {
                assert!(
                    upper[i] >= lower[i],
                    "field {} regresses between adjacent levels",
                    i
                );
            }
        }
    }

    #[test]
    fn test_entry_level_has_no_table() {
        assert!(requirements_to_attain(QualLevel::Apprentice).is_none());
    }

    #[test]
    fn test_terminal_level_requires_nothing_further() {
        assert_eq!(
            requirements_to_advance_from(QualLevel::Docent),
            CategoryTotals::ZERO
        );
    }

    #[test]
    fn test_advance_from_matches_attain_next() {
        assert_eq!(
            requirements_to_advance_from(QualLevel::Curator),
            requirements_to_attain(QualLevel::Supervisor).unwrap()
        );
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(attainment_percent(2.0, 1.0), 50);
        assert_eq!(attainment_percent(3.0, 1.0), 33);
        assert_eq!(attainment_percent(3.0, 2.0), 67);
    }

    #[test]
    fn test_zero_requirement_reports_zero() {
        assert_eq!(attainment_percent(0.0, 42.0), 0);
    }

    #[test]
    fn test_percent_unclamped_until_asked() {
        let required = CategoryTotals {
            ceu_ethics: 2.0,
            ..CategoryTotals::ZERO
        };
        let usable = CategoryTotals {
            ceu_ethics: 5.0,
            ..CategoryTotals::ZERO
        };
        let percents = attainment_percents(&required, &usable);
        assert_eq!(percents.ceu_ethics, 250);
        assert_eq!(percents.clamped().ceu_ethics, 100);
    }

    #[test]
    fn test_totals_accumulate_by_cell() {
        let mut totals = CategoryTotals::ZERO;
        totals.add(entry_kinds::CREDIT, credit_categories::ETHICS, 1.5);
        totals.add(entry_kinds::CREDIT, credit_categories::ETHICS, 0.5);
        totals.add(entry_kinds::HOUR, hour_categories::PRACTICE, 40.0);
        totals.add("bogus", "cell", 99.0);

        assert_eq!(totals.ceu_ethics, 2.0);
        assert_eq!(totals.hours_practice, 40.0);
        assert_eq!(totals.ceu_general, 0.0);
    }
}
