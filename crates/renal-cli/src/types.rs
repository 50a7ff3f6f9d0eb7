use std::path::PathBuf;

use renal_core::SlopeEstimate;
use renal_ingest::MergeReport;
use renal_report::RunLog;

#[derive(Debug)]
pub struct MergeResult {
    pub out_dir: PathBuf,
    pub qc_dir: PathBuf,
    pub center_dirs: Vec<PathBuf>,
    /// Distinct center codes in the merged patients table.
    pub center_codes: usize,
    pub merged_files: Vec<PathBuf>,
    pub qc_files: Vec<PathBuf>,
    pub report: MergeReport,
}

#[derive(Debug)]
pub struct AnalyzeResult {
    pub output_dir: PathBuf,
    pub anchored: usize,
    pub kfre4_evaluable: usize,
    pub kfre8_evaluable: usize,
    pub slope: Option<SlopeEstimate>,
    pub files: Vec<PathBuf>,
    pub run_log: RunLog,
}
