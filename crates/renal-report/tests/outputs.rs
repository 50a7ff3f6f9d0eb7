//! Integration tests for analysis output writing.

use std::fs;

use chrono::{Duration, NaiveDate};
use renal_core::AnalysisPipeline;
use renal_ingest::{MergeReport, TableKind};
use renal_model::{AnalysisOptions, PatientKey, PatientRecord, RegistryDataset, Sex, VisitRecord};
use renal_report::{write_analysis_outputs, write_merge_qc};
use tempfile::TempDir;

fn dataset() -> RegistryDataset {
    let start = NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();
    let mut dataset = RegistryDataset::default();
    for i in 0..6 {
        let key = PatientKey::new("C01", format!("P{i:02}")).unwrap();
        let mut patient = PatientRecord::new(key.clone(), if i % 2 == 0 { "IGAN" } else { "FSGS" });
        patient.sex = Some(if i % 2 == 0 { Sex::Female } else { Sex::Male });
        patient.birth_year = Some(1955 + i);
        patient.baseline_date = Some(start);
        patient.baseline_upcr = Some(1200.0);
        dataset.patients.push(patient);

        for year in 0..3_i64 {
            let mut visit = VisitRecord::new(key.clone(), Some(start + Duration::days(365 * year)));
            visit.egfr = Some(70.0 - 4.0 * year as f64 + f64::from(i) + ((year + i64::from(i)) % 3) as f64);
            visit.upcr = Some(1200.0 - 350.0 * year as f64);
            visit.sbp = Some(if i == 0 && year == 1 { 300.0 } else { 130.0 });
            dataset.visits.push(visit);
        }
    }
    dataset
}

fn analyze_into(dir: &TempDir) -> Vec<String> {
    let dataset = dataset();
    let result = AnalysisPipeline::new(AnalysisOptions::default()).run(&dataset);
    let outputs = write_analysis_outputs(dir.path(), &dataset, &result).unwrap();
    outputs
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_writes_every_analysis_table() {
    let dir = TempDir::new().unwrap();
    let files = analyze_into(&dir);

    assert_eq!(
        files,
        [
            "table1_baseline.csv",
            "qc_missingness.csv",
            "qc_duplicates.csv",
            "qc_outliers.csv",
            "qc_center_summary.csv",
            "outcomes_12m.csv",
            "endpoints_egfr_decline.csv",
            "kfre_scores.csv",
            "trend_egfr.csv",
            "trend_upcr.csv",
            "endpoints_igan_remission.csv",
            "egfr_slope_lme.csv",
            "egfr_slope_per_patient.csv",
            "RUN_LOG.json",
        ]
    );

    let table1 = fs::read_to_string(dir.path().join("table1_baseline.csv")).unwrap();
    assert!(table1.starts_with("Variable,Value,Notes\n"));
    let first_row = table1.lines().nth(1).unwrap();
    assert!(first_row.starts_with("\"Patients, n\",6,"));

    let outliers = fs::read_to_string(dir.path().join("qc_outliers.csv")).unwrap();
    assert_eq!(outliers.lines().count(), 2);
    assert!(outliers.contains("SBP_outlier"));

    let slope = fs::read_to_string(dir.path().join("egfr_slope_lme.csv")).unwrap();
    assert!(slope.contains("LME (random intercept per patient)"));

    let log: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("RUN_LOG.json")).unwrap())
            .unwrap();
    assert_eq!(log["patients_n"], 6);
    assert_eq!(log["visits_n"], 18);
    assert_eq!(log["mixed_model_used"], true);
    assert_eq!(log["igan_remission"]["n_patients"], 3);
}

#[test]
fn test_repeated_runs_write_identical_bytes() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let files = analyze_into(&first);
    analyze_into(&second);

    for name in files {
        let a = fs::read(first.path().join(&name)).unwrap();
        let b = fs::read(second.path().join(&name)).unwrap();
        assert_eq!(a, b, "{name} differs between runs");
    }
}

#[test]
fn test_merge_qc_writes_status_sheets() {
    let dir = TempDir::new().unwrap();
    let report = MergeReport {
        row_counts: vec![(TableKind::Patients, 4), (TableKind::Visits, 12)],
        ..MergeReport::default()
    };
    let files = write_merge_qc(dir.path(), &report).unwrap();
    assert_eq!(files.len(), 5);

    let collisions =
        fs::read_to_string(dir.path().join("merge_patient_collisions.csv")).unwrap();
    assert_eq!(
        collisions,
        "status\nNo cross-center patient_code collisions found\n"
    );
    let counts = fs::read_to_string(dir.path().join("merge_row_counts.csv")).unwrap();
    assert_eq!(counts, "table,rows_merged\npatients_baseline,4\nvisits_long,12\n");
}
