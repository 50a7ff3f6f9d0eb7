use serde::{Deserialize, Serialize};

use crate::{
    EventRecord, LabRecord, MedicationRecord, PatientRecord, VariantRecord, VisitRecord,
};

/// The typed registry tables of one analysis run.
///
/// Records keep their input order; every derived stage relies on that order
/// for first-occurrence tie-breaking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDataset {
    pub patients: Vec<PatientRecord>,
    pub visits: Vec<VisitRecord>,
    pub labs: Vec<LabRecord>,
    pub medications: Vec<MedicationRecord>,
    pub variants: Vec<VariantRecord>,
    pub events: Vec<EventRecord>,
}

impl RegistryDataset {
    /// Number of distinct center codes among the patients.
    pub fn center_count(&self) -> usize {
        let mut centers: Vec<&str> = self
            .patients
            .iter()
            .map(|p| p.key.center_code())
            .collect();
        centers.sort_unstable();
        centers.dedup();
        centers.len()
    }
}
