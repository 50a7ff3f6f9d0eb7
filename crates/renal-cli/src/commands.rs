use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, info_span, warn};

use renal_core::AnalysisPipeline;
use renal_ingest::{discover_center_dirs, load_dataset, merge_centers, write_merged_tables};
use renal_report::{write_analysis_outputs, write_merge_qc};

use crate::cli::{AnalyzeArgs, MergeArgs};
use crate::logging::redact_value;
use crate::types::{AnalyzeResult, MergeResult};

pub fn run_merge(args: &MergeArgs) -> Result<MergeResult> {
    let span = info_span!("merge");
    let _guard = span.enter();
    let start = Instant::now();

    // =========================================================================
    // Stage 1: Resolve center directories
    // =========================================================================
    let center_dirs = if args.dirs.is_empty() {
        let root = &args.centers_root;
        let dirs = discover_center_dirs(root).with_context(|| {
            format!(
                "no --dirs given and centers root {} is not usable",
                root.display()
            )
        })?;
        if dirs.is_empty() {
            bail!(
                "no center directories found in {} (each needs patients_baseline.csv)",
                root.display()
            );
        }
        info!(root = %root.display(), centers = dirs.len(), "auto-discovered centers");
        dirs
    } else {
        args.dirs.clone()
    };

    // =========================================================================
    // Stage 2: Merge and deduplicate
    // =========================================================================
    let merged = merge_centers(&center_dirs).context("merge center tables")?;
    for collision in &merged.report.collisions {
        debug!(
            patient_code = redact_value(&collision.patient_code),
            centers = ?collision.center_codes,
            "patient code shared across centers"
        );
    }

    // =========================================================================
    // Stage 3: Write merged tables and QC
    // =========================================================================
    let merged_files =
        write_merged_tables(&merged, &args.out).context("write merged tables")?;
    let qc_files = write_merge_qc(&args.qc, &merged.report).context("write merge QC")?;

    if !merged.report.warnings.is_empty() {
        warn!(
            warnings = merged.report.warnings.len(),
            qc_dir = %args.qc.display(),
            "merge finished with warnings"
        );
    }
    info!(
        files = merged_files.len(),
        duration_ms = start.elapsed().as_millis(),
        "merge complete"
    );

    Ok(MergeResult {
        out_dir: args.out.clone(),
        qc_dir: args.qc.clone(),
        center_codes: merged.center_code_count(),
        center_dirs,
        merged_files,
        qc_files,
        report: merged.report,
    })
}

pub fn run_analyze(args: &AnalyzeArgs) -> Result<AnalyzeResult> {
    let span = info_span!("analyze", data_dir = %args.data_dir.display());
    let _guard = span.enter();
    let output_dir = args.resolved_output_dir();

    let dataset = load_dataset(&args.data_dir)
        .with_context(|| format!("load registry from {}", args.data_dir.display()))?;

    let pipeline = AnalysisPipeline::new(args.analysis_options());
    let result = pipeline.run(&dataset);

    let outputs = write_analysis_outputs(&output_dir, &dataset, &result)
        .with_context(|| format!("write outputs to {}", output_dir.display()))?;

    Ok(AnalyzeResult {
        output_dir,
        anchored: result.anchored_count(),
        kfre4_evaluable: result.kfre.iter().filter(|r| r.kfre4.is_some()).count(),
        kfre8_evaluable: result.kfre.iter().filter(|r| r.kfre8.is_some()).count(),
        slope: result.population_slope.estimate,
        files: outputs.files,
        run_log: outputs.run_log,
    })
}
