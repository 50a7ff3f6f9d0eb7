//! `RUN_LOG.json`: counts and provenance of one analysis run.
//!
//! The log carries no timestamps or absolute paths so that repeated runs on
//! the same input produce identical bytes.

use std::path::Path;

use renal_core::{AnalysisResult, DeclineEndpoint};
use renal_model::RegistryDataset;
use serde::Serialize;

use crate::error::{ReportError, Result};

pub const RUN_LOG_FILE: &str = "RUN_LOG.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointCounts {
    pub n_40pct: usize,
    pub n_57pct: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemissionCounts {
    pub n_patients: usize,
    pub n_cr: usize,
    pub n_pr: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarmonizationEntry {
    pub covariate: &'static str,
    pub conversion: &'static str,
    pub cohort_median: f64,
    pub values_converted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLog {
    pub patients_n: usize,
    pub visits_n: usize,
    pub centers_n: usize,
    pub egfr_endpoints: EndpointCounts,
    pub igan_remission: RemissionCounts,
    pub mixed_model_used: bool,
    pub slope_method: String,
    pub derived_visit_egfr: usize,
    pub unit_harmonizations: Vec<HarmonizationEntry>,
    /// Output file names, in write order.
    pub generated_files: Vec<String>,
}

impl RunLog {
    pub fn new(dataset: &RegistryDataset, result: &AnalysisResult) -> Self {
        let count_hits = |f: fn(&DeclineEndpoint) -> bool| {
            result.decline.iter().filter(|e| f(e)).count()
        };
        Self {
            patients_n: dataset.patients.len(),
            visits_n: dataset.visits.len(),
            centers_n: dataset.center_count(),
            egfr_endpoints: EndpointCounts {
                n_40pct: count_hits(|e| e.decline_40pct.is_some()),
                n_57pct: count_hits(|e| e.decline_57pct.is_some()),
            },
            igan_remission: RemissionCounts {
                n_patients: result.remission.len(),
                n_cr: result.remission.iter().filter(|r| r.complete.is_some()).count(),
                n_pr: result.remission.iter().filter(|r| r.partial.is_some()).count(),
            },
            mixed_model_used: result.population_slope.used_mixed_model(),
            slope_method: result.population_slope.method.label(),
            derived_visit_egfr: result.derived_visit_egfr,
            unit_harmonizations: result
                .harmonizations
                .iter()
                .map(|h| HarmonizationEntry {
                    covariate: h.covariate.name(),
                    conversion: h.conversion.description(),
                    cohort_median: h.cohort_median,
                    values_converted: h.values_converted,
                })
                .collect(),
            generated_files: Vec::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json().map_err(|source| ReportError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ReportError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renal_core::AnalysisPipeline;
    use renal_model::AnalysisOptions;

    #[test]
    fn test_empty_run_log() {
        let dataset = RegistryDataset::default();
        let result = AnalysisPipeline::new(AnalysisOptions::default()).run(&dataset);
        let mut log = RunLog::new(&dataset, &result);
        log.generated_files.push("table1_baseline.csv".to_string());

        insta::assert_snapshot!(log.to_json().unwrap(), @r#"
        {
          "patients_n": 0,
          "visits_n": 0,
          "centers_n": 0,
          "egfr_endpoints": {
            "n_40pct": 0,
            "n_57pct": 0
          },
          "igan_remission": {
            "n_patients": 0,
            "n_cr": 0,
            "n_pr": 0
          },
          "mixed_model_used": false,
          "slope_method": "LME skipped (< 10 observations)",
          "derived_visit_egfr": 0,
          "unit_harmonizations": [],
          "generated_files": [
            "table1_baseline.csv"
          ]
        }
        "#);
    }
}
