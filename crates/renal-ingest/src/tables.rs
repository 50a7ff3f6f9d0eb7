//! The six registry tables and their merge rules.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableKind {
    Patients,
    Visits,
    Labs,
    Medications,
    Variants,
    Events,
}

const PATIENT_COLUMNS: &[&str] = &["center_code", "module", "patient_code"];

impl TableKind {
    /// Every table, in merge and write order.
    pub const ALL: [TableKind; 6] = [
        TableKind::Patients,
        TableKind::Visits,
        TableKind::Labs,
        TableKind::Medications,
        TableKind::Variants,
        TableKind::Events,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TableKind::Patients => "patients_baseline",
            TableKind::Visits => "visits_long",
            TableKind::Labs => "labs_long",
            TableKind::Medications => "meds_long",
            TableKind::Variants => "variants_long",
            TableKind::Events => "events_long",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            TableKind::Patients => "patients_baseline.csv",
            TableKind::Visits => "visits_long.csv",
            TableKind::Labs => "labs_long.csv",
            TableKind::Medications => "meds_long.csv",
            TableKind::Variants => "variants_long.csv",
            TableKind::Events => "events_long.csv",
        }
    }

    /// Whether every center export must provide this table.
    pub fn required_for_merge(self) -> bool {
        matches!(self, TableKind::Patients | TableKind::Visits)
    }

    /// Whether the analysis input directory must provide this table.
    pub fn required_for_analysis(self) -> bool {
        !matches!(self, TableKind::Events)
    }

    /// Columns that identify a record; the first occurrence of a key wins.
    pub fn dedup_key(self) -> &'static [&'static str] {
        match self {
            TableKind::Patients => &["center_code", "patient_code"],
            TableKind::Visits => &["center_code", "patient_code", "visit_date"],
            TableKind::Labs => &["center_code", "patient_code", "lab_date", "lab_name"],
            TableKind::Medications => &["center_code", "patient_code", "drug_name", "start_date"],
            TableKind::Variants => &["center_code", "patient_code", "gene", "variant"],
            TableKind::Events => &["center_code", "patient_code", "event_type"],
        }
    }

    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            TableKind::Visits => &["center_code", "module", "patient_code", "visit_date"],
            _ => PATIENT_COLUMNS,
        }
    }

    pub fn sort_columns(self) -> &'static [&'static str] {
        match self {
            TableKind::Visits => &["center_code", "patient_code", "visit_date"],
            TableKind::Labs => &["center_code", "patient_code", "lab_date"],
            TableKind::Events => &["center_code", "patient_code", "event_date"],
            _ => &["center_code", "patient_code"],
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_patients_and_visits_required_for_merge() {
        let required: Vec<_> = TableKind::ALL
            .iter()
            .filter(|t| t.required_for_merge())
            .copied()
            .collect();
        assert_eq!(required, vec![TableKind::Patients, TableKind::Visits]);
    }

    #[test]
    fn test_events_optional_for_analysis() {
        assert!(!TableKind::Events.required_for_analysis());
        assert!(TableKind::Variants.required_for_analysis());
    }

    #[test]
    fn test_dedup_keys_start_with_patient_identity() {
        for table in TableKind::ALL {
            assert_eq!(&table.dedup_key()[..2], &["center_code", "patient_code"]);
        }
    }
}
