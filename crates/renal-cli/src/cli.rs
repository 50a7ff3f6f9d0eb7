//! CLI argument definitions for the registry tool.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use renal_model::{AnalysisOptions, MixedModelMode, VisitEgfrMode};

#[derive(Parser)]
#[command(
    name = "renal",
    version,
    about = "Kidney registry toolkit - merge center exports and derive renal endpoints",
    long_about = "Merge per-center registry CSV exports and analyse the merged data.\n\n\
                  Derives eGFR decline and IgAN remission endpoints, KFRE risk scores,\n\
                  eGFR slopes, 12-month outcomes, Table 1 and a data-quality report."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow patient-level values in logs (redacted otherwise).
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge per-center CSV exports into one deduplicated dataset.
    Merge(MergeArgs),

    /// Run the endpoint and risk analysis on a merged data directory.
    Analyze(AnalyzeArgs),
}

#[derive(Parser)]
pub struct MergeArgs {
    /// Center data directories, each holding patients_baseline.csv.
    ///
    /// When omitted, every subdirectory of --centers-root holding a
    /// patients table is merged.
    #[arg(long = "dirs", value_name = "DIR", num_args = 1..)]
    pub dirs: Vec<PathBuf>,

    /// Root folder scanned for center subdirectories.
    #[arg(long = "centers-root", value_name = "DIR", default_value = "centers")]
    pub centers_root: PathBuf,

    /// Output directory for the merged CSV tables.
    #[arg(long = "out", value_name = "DIR", default_value = "data")]
    pub out: PathBuf,

    /// Output directory for the merge QC sheets.
    #[arg(long = "qc", value_name = "DIR", default_value = "merge_qc")]
    pub qc: PathBuf,
}

#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Directory holding the merged registry tables.
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Output directory (default: an `outputs` folder next to DATA_DIR).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Half-width in days of the lab window around the baseline anchor.
    #[arg(long = "lab-window-days", value_name = "DAYS", default_value_t = 90)]
    pub lab_window_days: i64,

    /// Compute CKD-EPI eGFR for visits that carry creatinine but no eGFR.
    #[arg(long = "derive-visit-egfr")]
    pub derive_visit_egfr: bool,

    /// Skip the population mixed-effects slope model.
    #[arg(long = "no-mixed-model")]
    pub no_mixed_model: bool,
}

impl AnalyzeArgs {
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            self.data_dir
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("outputs")
        })
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions::new()
            .with_lab_window_days(self.lab_window_days)
            .with_mixed_model(if self.no_mixed_model {
                MixedModelMode::Skip
            } else {
                MixedModelMode::Fit
            })
            .with_visit_egfr(if self.derive_visit_egfr {
                VisitEgfrMode::DeriveMissing
            } else {
                VisitEgfrMode::AsRecorded
            })
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_defaults() {
        let cli = Cli::try_parse_from(["renal", "analyze", "study/data"]).unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.resolved_output_dir(), PathBuf::from("study/outputs"));
        let options = args.analysis_options();
        assert_eq!(options.lab_window_days, 90);
        assert_eq!(options.mixed_model, MixedModelMode::Fit);
        assert_eq!(options.visit_egfr, VisitEgfrMode::AsRecorded);
    }

    #[test]
    fn test_analyze_flags_map_to_options() {
        let cli = Cli::try_parse_from([
            "renal",
            "analyze",
            "data",
            "--lab-window-days",
            "30",
            "--derive-visit-egfr",
            "--no-mixed-model",
            "--output-dir",
            "out",
        ])
        .unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.resolved_output_dir(), PathBuf::from("out"));
        let options = args.analysis_options();
        assert_eq!(options.lab_window_days, 30);
        assert_eq!(options.mixed_model, MixedModelMode::Skip);
        assert_eq!(options.visit_egfr, VisitEgfrMode::DeriveMissing);
    }

    #[test]
    fn test_merge_defaults_and_global_quiet() {
        let cli = Cli::try_parse_from(["renal", "merge", "--quiet"]).unwrap();
        let Command::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert!(args.dirs.is_empty());
        assert_eq!(args.centers_root, PathBuf::from("centers"));
        assert_eq!(args.out, PathBuf::from("data"));
        assert_eq!(args.qc, PathBuf::from("merge_qc"));
        assert!(cli.verbosity.is_present());
    }

    #[test]
    fn test_merge_accepts_several_dirs() {
        let cli = Cli::try_parse_from(["renal", "merge", "--dirs", "a", "b"]).unwrap();
        let Command::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(args.dirs, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }
}
