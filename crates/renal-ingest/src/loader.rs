//! Analysis input loading.

use std::path::Path;

use polars::prelude::DataFrame;
use renal_model::RegistryDataset;

use crate::csv_table::{read_csv_frame, require_columns};
use crate::error::{IngestError, Result};
use crate::records::{
    event_records, lab_records, medication_records, patient_records, variant_records,
    visit_records,
};
use crate::tables::TableKind;

const IDENTITY_COLUMNS: &[&str] = &["center_code", "module", "patient_code"];

/// Loads one table; `Ok(None)` for an absent optional table.
fn load_table(data_dir: &Path, table: TableKind) -> Result<Option<DataFrame>> {
    let path = data_dir.join(table.file_name());
    if !path.is_file() {
        if table.required_for_analysis() {
            return Err(IngestError::FileNotFound { path });
        }
        tracing::info!(table = %table, "optional table not present");
        return Ok(None);
    }
    let df = read_csv_frame(&path)?;
    if table.required_for_analysis() {
        require_columns(&df, IDENTITY_COLUMNS, &path)?;
    }
    tracing::debug!(table = %table, rows = df.height(), "table loaded");
    Ok(Some(df))
}

/// Loads the merged registry tables of `data_dir` into typed records.
///
/// Fails when a required table or one of its identity columns is missing.
pub fn load_dataset(data_dir: &Path) -> Result<RegistryDataset> {
    if !data_dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: data_dir.to_path_buf(),
        });
    }

    let mut dataset = RegistryDataset::default();
    for table in TableKind::ALL {
        let Some(df) = load_table(data_dir, table)? else {
            continue;
        };
        match table {
            TableKind::Patients => dataset.patients = patient_records(&df),
            TableKind::Visits => dataset.visits = visit_records(&df),
            TableKind::Labs => dataset.labs = lab_records(&df),
            TableKind::Medications => dataset.medications = medication_records(&df),
            TableKind::Variants => dataset.variants = variant_records(&df),
            TableKind::Events => dataset.events = event_records(&df),
        }
    }

    tracing::info!(
        patients = dataset.patients.len(),
        visits = dataset.visits.len(),
        labs = dataset.labs.len(),
        medications = dataset.medications.len(),
        variants = dataset.variants.len(),
        events = dataset.events.len(),
        "registry loaded"
    );
    Ok(dataset)
}
