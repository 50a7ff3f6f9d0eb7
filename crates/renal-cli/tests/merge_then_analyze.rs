//! End-to-end runs of the `merge` and `analyze` commands on small fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use renal_cli::cli::{AnalyzeArgs, Cli, Command, MergeArgs};
use renal_cli::commands::{run_analyze, run_merge};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

fn seed_centers(root: &Path) {
    let hk = root.join("centers").join("hong_kong");
    write(
        &hk,
        "patients_baseline.csv",
        "center_code,module,patient_code,sex,birth_year,baseline_date,baseline_scr,baseline_upcr\n\
         HK,IGAN,001,F,1970,2020-01-01,100,1500\n\
         HK,IGAN,002,M,1965,2020-02-01,150,800\n",
    );
    write(
        &hk,
        "visits_long.csv",
        "center_code,module,patient_code,visit_date,sbp,dbp,scr_umol_l,upcr,egfr\n\
         HK,IGAN,001,2020-01-01,130,80,100,1500,60\n\
         HK,IGAN,001,2020-07-01,128,78,110,600,55\n\
         HK,IGAN,001,2021-01-05,125,75,160,250,33\n\
         HK,IGAN,002,2020-02-01,140,90,150,800,45\n\
         HK,IGAN,002,2021-02-01,138,88,155,700,44\n\
         HK,IGAN,002,2021-02-01,138,88,155,700,44\n",
    );
    write(
        &hk,
        "labs_long.csv",
        "center_code,module,patient_code,lab_date,lab_name,lab_value,lab_unit\n\
         HK,IGAN,001,2020-01-10,albumin,40,g/L\n\
         HK,IGAN,001,2020-01-10,phosphate,1.1,mmol/L\n",
    );
    write(
        &hk,
        "meds_long.csv",
        "center_code,module,patient_code,drug_name,drug_class,start_date,end_date\n\
         HK,IGAN,001,ramipril,ACEi,2020-01-01,\n",
    );
    write(
        &hk,
        "variants_long.csv",
        "center_code,module,patient_code,gene,variant\n\
         HK,IGAN,002,COL4A3,c.1A>G\n",
    );

    let bj = root.join("centers").join("beijing");
    write(
        &bj,
        "patients_baseline.csv",
        "center_code,module,patient_code,sex,birth_year,baseline_date,baseline_scr,baseline_upcr\n\
         BJ,FSGS,101,M,1980,2019-06-01,90,\n",
    );
    write(
        &bj,
        "visits_long.csv",
        "center_code,module,patient_code,visit_date,sbp,dbp,scr_umol_l,upcr,egfr\n\
         BJ,FSGS,101,2019-06-01,300,85,90,400,88\n\
         BJ,FSGS,101,2020-06-03,122,80,95,350,82\n",
    );
    write(
        &bj,
        "events_long.csv",
        "center_code,module,patient_code,event_type,event_date\n\
         BJ,FSGS,101,dialysis,2021-01-01\n",
    );
}

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["renal"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn merge_args(root: &Path) -> MergeArgs {
    let cli = parse(&[
        "merge",
        "--centers-root",
        root.join("centers").to_str().unwrap(),
        "--out",
        root.join("data").to_str().unwrap(),
        "--qc",
        root.join("merge_qc").to_str().unwrap(),
    ]);
    match cli.command {
        Command::Merge(args) => args,
        Command::Analyze(_) => panic!("expected merge"),
    }
}

fn analyze_args(data_dir: &Path, output_dir: Option<&Path>) -> AnalyzeArgs {
    let mut argv = vec!["analyze", data_dir.to_str().unwrap()];
    if let Some(dir) = output_dir {
        argv.push("--output-dir");
        argv.push(dir.to_str().unwrap());
    }
    match parse(&argv).command {
        Command::Analyze(args) => args,
        Command::Merge(_) => panic!("expected analyze"),
    }
}

fn file_names(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_merge_discovers_centers_and_writes_tables() {
    let root = TempDir::new().unwrap();
    seed_centers(root.path());

    let result = run_merge(&merge_args(root.path())).unwrap();

    // Discovery is sorted by directory name.
    assert_eq!(result.center_dirs.len(), 2);
    assert!(result.center_dirs[0].ends_with("beijing"));
    assert_eq!(result.center_codes, 2);
    assert_eq!(
        file_names(&result.merged_files),
        vec![
            "patients_baseline.csv",
            "visits_long.csv",
            "labs_long.csv",
            "meds_long.csv",
            "variants_long.csv",
            "events_long.csv",
        ]
    );
    assert_eq!(result.qc_files.len(), 5);
    assert_eq!(result.report.duplicates.len(), 1);

    let visits = fs::read_to_string(root.path().join("data/visits_long.csv")).unwrap();
    assert_eq!(visits.lines().count(), 8);
}

#[test]
fn test_merge_without_centers_fails() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("centers")).unwrap();

    let error = run_merge(&merge_args(root.path())).unwrap_err();
    assert!(error.to_string().contains("no center directories found"));
}

#[test]
fn test_analyze_writes_outputs_next_to_data() {
    let root = TempDir::new().unwrap();
    seed_centers(root.path());
    run_merge(&merge_args(root.path())).unwrap();

    let result = run_analyze(&analyze_args(&root.path().join("data"), None)).unwrap();

    assert_eq!(result.output_dir, root.path().join("outputs"));
    assert!(root.path().join("outputs/RUN_LOG.json").is_file());
    assert!(root.path().join("outputs/table1_baseline.csv").is_file());
    assert!(root.path().join("outputs/kfre_scores.csv").is_file());

    let log = &result.run_log;
    assert_eq!(log.patients_n, 3);
    assert_eq!(log.visits_n, 7);
    assert_eq!(log.centers_n, 2);
    assert_eq!(log.igan_remission.n_patients, 2);
    assert!(!log.mixed_model_used);
    assert!(result.slope.is_none());
    assert!(log.slope_method.starts_with("LME skipped"));
    assert_eq!(
        log.generated_files.last().map(String::as_str),
        Some("egfr_slope_per_patient.csv")
    );
    assert_eq!(result.files.len(), log.generated_files.len() + 1);

    let decline = fs::read_to_string(root.path().join("outputs/endpoints_egfr_decline.csv")).unwrap();
    assert!(decline.lines().next().unwrap().ends_with("manual_dialysis"));
}

#[test]
fn test_analyze_missing_data_dir_fails() {
    let root = TempDir::new().unwrap();
    let error = run_analyze(&analyze_args(&root.path().join("absent"), None)).unwrap_err();
    assert!(format!("{error:#}").contains("load registry"));
}

#[test]
fn test_repeated_analysis_is_byte_identical() {
    let root = TempDir::new().unwrap();
    seed_centers(root.path());
    run_merge(&merge_args(root.path())).unwrap();
    let data = root.path().join("data");

    let first = run_analyze(&analyze_args(&data, Some(&root.path().join("run1")))).unwrap();
    let second = run_analyze(&analyze_args(&data, Some(&root.path().join("run2")))).unwrap();

    assert_eq!(first.run_log, second.run_log);
    for name in &first.run_log.generated_files {
        let a = fs::read(root.path().join("run1").join(name)).unwrap();
        let b = fs::read(root.path().join("run2").join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between runs");
    }
    let a = fs::read(root.path().join("run1/RUN_LOG.json")).unwrap();
    let b = fs::read(root.path().join("run2/RUN_LOG.json")).unwrap();
    assert_eq!(a, b);
}
