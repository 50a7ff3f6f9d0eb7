//! Merging center exports and loading the result as typed records.

use std::fs;
use std::path::{Path, PathBuf};

use renal_ingest::{
    IngestError, TableKind, column_strings, load_dataset, merge_centers, write_merged_tables,
};
use renal_model::Sex;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

fn center(root: &Path, name: &str, patients: &str, visits: &str) -> PathBuf {
    let dir = root.join(name);
    write(&dir, "patients_baseline.csv", patients);
    write(&dir, "visits_long.csv", visits);
    dir
}

#[test]
fn test_merge_dedupes_and_reports() {
    let root = TempDir::new().unwrap();
    let a = center(
        root.path(),
        "center_a",
        "center_code,module,patient_code,sex\nHK,IGAN,001,F\nHK,IGAN,001,M\nHK,IGAN,002,M\n",
        "center_code,module,patient_code,visit_date,egfr\nHK,IGAN,001,2020-01-01,80\nHK,IGAN,001,2020-01-01,81\n",
    );
    let b = center(
        root.path(),
        "center_b",
        "center_code,module,patient_code,sex\nBJ,IGAN,001,F\n",
        "center_code,module,patient_code,visit_date,sbp\nBJ,IGAN,001,2021-05-05,130\n",
    );
    let missing = root.path().join("center_missing");

    let merged = merge_centers(&[a, b, missing]).unwrap();

    assert_eq!(merged.row_count(TableKind::Patients), 3);
    assert_eq!(merged.row_count(TableKind::Visits), 2);
    assert_eq!(merged.row_count(TableKind::Labs), 0);
    assert_eq!(merged.center_code_count(), 2);

    let report = &merged.report;
    assert_eq!(report.centers.len(), 2);
    assert_eq!(report.centers[0].center_code, "HK");
    assert_eq!(report.centers[0].patients_n, 3);
    assert_eq!(report.centers[1].visits_n, 1);
    assert_eq!(report.duplicates.len(), 2);
    assert_eq!(report.collisions.len(), 1);
    assert_eq!(report.collisions[0].center_codes, vec!["BJ", "HK"]);
    assert!(report.warnings.iter().any(|w| w.starts_with("[SKIP] Directory not found")));

    // First occurrence survives; rows sorted by center then patient.
    let patients = merged.table(TableKind::Patients).unwrap();
    assert_eq!(
        column_strings(patients, "center_code"),
        vec![Some("BJ".into()), Some("HK".into()), Some("HK".into())]
    );
    assert_eq!(column_strings(patients, "sex")[1].as_deref(), Some("F"));

    // Columns missing in one center are null-filled, not dropped.
    let visits = merged.table(TableKind::Visits).unwrap();
    assert!(visits.column("sbp").is_ok());
    assert!(visits.column("egfr").is_ok());
}

#[test]
fn test_file_without_required_column_is_skipped() {
    let root = TempDir::new().unwrap();
    let a = center(
        root.path(),
        "a",
        "center_code,module,patient_code\nA,IGAN,1\n",
        "center_code,module,patient_code\nA,IGAN,1\n",
    );

    let merged = merge_centers(&[a]).unwrap();

    assert_eq!(merged.row_count(TableKind::Visits), 0);
    assert!(
        merged
            .report
            .warnings
            .iter()
            .any(|w| w.contains("required column 'visit_date' missing"))
    );
}

#[test]
fn test_merged_tables_round_trip_into_dataset() {
    let root = TempDir::new().unwrap();
    let a = center(
        root.path(),
        "a",
        "center_code,module,patient_code,sex,birth_year,baseline_date,baseline_scr\nA,IGAN,1,f,1970,2020-01-01,88.4\n",
        "center_code,module,patient_code,visit_date,egfr,upcr\nA,IGAN,1,2020-06-01,70,450\n",
    );
    write(
        &a,
        "labs_long.csv",
        "center_code,module,patient_code,lab_date,lab_name,lab_value,lab_unit\nA,IGAN,1,2020-01-10,Albumin,38,g/L\n",
    );
    for (file, header) in [
        ("meds_long.csv", "center_code,module,patient_code,drug_name,drug_class\nA,IGAN,1,losartan,ARB\n"),
        ("variants_long.csv", "center_code,module,patient_code,gene,variant\nA,IGAN,1,COL4A3,c.1A>G\n"),
    ] {
        write(&a, file, header);
    }

    let merged = merge_centers(&[a]).unwrap();
    let data_dir = root.path().join("data");
    let written = write_merged_tables(&merged, &data_dir).unwrap();
    assert_eq!(written.len(), 5);
    assert!(!data_dir.join("events_long.csv").exists());

    let dataset = load_dataset(&data_dir).unwrap();
    assert_eq!(dataset.patients.len(), 1);
    assert_eq!(dataset.patients[0].sex, Some(Sex::Female));
    assert_eq!(dataset.patients[0].baseline_scr, Some(88.4));
    assert_eq!(dataset.visits[0].upcr, Some(450.0));
    assert_eq!(dataset.labs[0].lab_name, "Albumin");
    assert_eq!(dataset.medications[0].drug_class.as_deref(), Some("ARB"));
    assert_eq!(dataset.variants[0].gene.as_deref(), Some("COL4A3"));
    assert!(dataset.events.is_empty());
}

#[test]
fn test_load_fails_without_required_table() {
    let root = TempDir::new().unwrap();
    write(
        root.path(),
        "patients_baseline.csv",
        "center_code,module,patient_code\nA,IGAN,1\n",
    );

    let err = load_dataset(root.path()).unwrap_err();
    assert!(matches!(err, IngestError::FileNotFound { ref path } if path.ends_with("visits_long.csv")));
}

#[test]
fn test_load_fails_without_identity_column() {
    let root = TempDir::new().unwrap();
    for table in TableKind::ALL {
        if table.required_for_analysis() {
            write(root.path(), table.file_name(), "center_code,module,patient_code\n");
        }
    }
    write(root.path(), "labs_long.csv", "center_code,patient_code\nA,1\n");

    let err = load_dataset(root.path()).unwrap_err();
    assert!(matches!(err, IngestError::MissingColumn { ref column, .. } if column == "module"));
}
