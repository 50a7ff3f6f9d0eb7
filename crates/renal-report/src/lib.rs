//! Report generation for registry analyses.
//!
//! This crate turns the derived tables of `renal-core` into the run outputs:
//! - Baseline characteristics (Table 1)
//! - Visit data-quality report
//! - Endpoint, KFRE, slope, outcome and trend tables as CSV
//! - `RUN_LOG.json`
//! - Merge QC sheets for the `merge` command

mod error;
pub mod frames;
pub mod quality;
pub mod run_log;
pub mod table1;
mod writer;

pub use error::{ReportError, Result};
pub use quality::{
    CenterQuality, MissingField, QualityReport, VisitDuplicate, VisitOutlier, quality_report,
};
pub use run_log::{RUN_LOG_FILE, RunLog};
pub use table1::{BaselineRow, baseline_characteristics};
pub use writer::{AnalysisOutputs, write_analysis_outputs, write_csv, write_merge_qc};
