//! CSV and JSON output writers.

use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use renal_core::AnalysisResult;
use renal_ingest::MergeReport;
use renal_model::RegistryDataset;

use crate::error::{ReportError, Result};
use crate::frames::{
    baseline_frame, decline_frame, kfre_frame, merge_qc_frames, outcomes_frame,
    patient_slopes_frame, population_slope_frame, quality_frames, remission_frame, trend_frame,
};
use crate::quality::quality_report;
use crate::run_log::{RUN_LOG_FILE, RunLog};
use crate::table1::baseline_characteristics;

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| ReportError::FileWrite {
        path: dir.to_path_buf(),
        source,
    })
}

/// Writes `df` as a headed, comma-separated UTF-8 file.
pub fn write_csv(path: &Path, df: &DataFrame) -> Result<()> {
    let mut file = File::create(path).map_err(|source| ReportError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let mut df = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    tracing::debug!(path = %path.display(), rows = df.height(), "table written");
    Ok(())
}

/// Files written by [`write_analysis_outputs`].
#[derive(Debug, Clone)]
pub struct AnalysisOutputs {
    pub files: Vec<PathBuf>,
    pub run_log: RunLog,
}

/// Writes every analysis table plus `RUN_LOG.json` into `out_dir`.
///
/// The remission and per-patient slope tables are skipped when empty.
pub fn write_analysis_outputs(
    out_dir: &Path,
    dataset: &RegistryDataset,
    result: &AnalysisResult,
) -> Result<AnalysisOutputs> {
    create_dir(out_dir)?;

    let mut tables: Vec<(&str, DataFrame)> = vec![(
        "table1_baseline",
        baseline_frame(&baseline_characteristics(dataset, result))?,
    )];
    tables.extend(quality_frames(&quality_report(&dataset.visits))?);
    tables.push(("outcomes_12m", outcomes_frame(&result.outcomes)?));
    tables.push((
        "endpoints_egfr_decline",
        decline_frame(&result.decline, &result.manual_event_types)?,
    ));
    tables.push(("kfre_scores", kfre_frame(&result.kfre)?));
    tables.push(("trend_egfr", trend_frame(&result.trend_egfr)?));
    tables.push(("trend_upcr", trend_frame(&result.trend_upcr)?));
    if !result.remission.is_empty() {
        tables.push(("endpoints_igan_remission", remission_frame(&result.remission)?));
    }
    tables.push((
        "egfr_slope_lme",
        population_slope_frame(&result.population_slope)?,
    ));
    if !result.patient_slopes.is_empty() {
        tables.push((
            "egfr_slope_per_patient",
            patient_slopes_frame(&result.patient_slopes)?,
        ));
    }

    let mut run_log = RunLog::new(dataset, result);
    let mut files = Vec::with_capacity(tables.len() + 1);
    for (stem, df) in &tables {
        let file_name = format!("{stem}.csv");
        let path = out_dir.join(&file_name);
        write_csv(&path, df)?;
        run_log.generated_files.push(file_name);
        files.push(path);
    }

    let log_path = out_dir.join(RUN_LOG_FILE);
    run_log.write(&log_path)?;
    files.push(log_path);

    tracing::info!(
        out_dir = %out_dir.display(),
        files = files.len(),
        "analysis outputs written"
    );
    Ok(AnalysisOutputs { files, run_log })
}

/// Writes the merge QC sheets into `qc_dir`, one CSV per sheet.
pub fn write_merge_qc(qc_dir: &Path, report: &MergeReport) -> Result<Vec<PathBuf>> {
    create_dir(qc_dir)?;
    let mut files = Vec::new();
    for (stem, df) in merge_qc_frames(report)? {
        let path = qc_dir.join(format!("{stem}.csv"));
        write_csv(&path, &df)?;
        files.push(path);
    }
    tracing::info!(qc_dir = %qc_dir.display(), files = files.len(), "merge QC written");
    Ok(files)
}
