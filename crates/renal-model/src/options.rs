//! Tunables of an analysis run.

use serde::{Deserialize, Serialize};

/// Whether the population mixed-effects slope model is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MixedModelMode {
    /// Fit the random-intercept model when enough data is available.
    #[default]
    Fit,
    /// Do not fit; report the model as skipped.
    Skip,
}

/// Handling of visits that carry creatinine but no recorded eGFR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VisitEgfrMode {
    /// Use visit eGFR exactly as recorded.
    #[default]
    AsRecorded,
    /// Compute CKD-EPI 2021 eGFR for visits missing it.
    DeriveMissing,
}

/// Options controlling endpoint derivation, scoring and slope estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// eGFR / baseline ratio below which the 40% decline endpoint fires.
    pub decline_40_ratio: f64,
    /// eGFR / baseline ratio below which the 57% decline endpoint fires.
    pub decline_57_ratio: f64,
    /// Complete remission: UPCR strictly below this value (mg/g).
    pub complete_remission_upcr: f64,
    /// Partial remission: UPCR at most this fraction of baseline...
    pub partial_remission_fraction: f64,
    /// ...and strictly below this value (mg/g).
    pub partial_remission_ceiling: f64,
    /// Half-width of the window around the anchor for KFRE-8 labs.
    pub lab_window_days: i64,
    pub mixed_model: MixedModelMode,
    pub mixed_model_min_observations: usize,
    pub mixed_model_min_patients: usize,
    /// 12-month outcome window, inclusive on both ends.
    pub outcome_window_days: (i64, i64),
    pub outcome_target_day: i64,
    pub visit_egfr: VisitEgfrMode,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            decline_40_ratio: 0.60,
            decline_57_ratio: 0.43,
            complete_remission_upcr: 300.0,
            partial_remission_fraction: 0.5,
            partial_remission_ceiling: 1000.0,
            lab_window_days: 90,
            mixed_model: MixedModelMode::Fit,
            mixed_model_min_observations: 10,
            mixed_model_min_patients: 5,
            outcome_window_days: (270, 450),
            outcome_target_day: 365,
            visit_egfr: VisitEgfrMode::AsRecorded,
        }
    }
}

impl AnalysisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lab_window_days(mut self, days: i64) -> Self {
        self.lab_window_days = days;
        self
    }

    pub fn with_mixed_model(mut self, mode: MixedModelMode) -> Self {
        self.mixed_model = mode;
        self
    }

    pub fn with_visit_egfr(mut self, mode: VisitEgfrMode) -> Self {
        self.visit_egfr = mode;
        self
    }
}
