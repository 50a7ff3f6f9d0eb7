//! Typed registry records shared by every stage of the analysis.
//!
//! Raw CSV tables are converted into these records by `renal-ingest`; the
//! endpoint and scoring engine in `renal-core` only ever sees typed values.

pub mod dataset;
pub mod error;
pub mod ids;
pub mod options;
pub mod records;

pub use dataset::RegistryDataset;
pub use error::{ModelError, Result};
pub use ids::PatientKey;
pub use options::{AnalysisOptions, MixedModelMode, VisitEgfrMode};
pub use records::{
    EventRecord, LabRecord, MedicationRecord, OxfordScores, PatientRecord, Sex, VariantRecord,
    VisitRecord,
};

/// Disease-module tag of IgA nephropathy patients.
pub const IGAN_MODULE: &str = "IGAN";

/// Returns true when the module tag denotes IgA nephropathy (case-insensitive).
pub fn is_igan_module(module: &str) -> bool {
    module.trim().eq_ignore_ascii_case(IGAN_MODULE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_igan_module_is_case_insensitive() {
        assert!(is_igan_module("IGAN"));
        assert!(is_igan_module("igan"));
        assert!(is_igan_module(" IgAN "));
        assert!(!is_igan_module("FSGS"));
        assert!(!is_igan_module(""));
    }
}
