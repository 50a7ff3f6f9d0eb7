//! Endpoint derivation, risk scoring and slope estimation for the registry.
//!
//! Everything here is a pure function of a loaded [`RegistryDataset`]; the
//! [`AnalysisPipeline`] runs the stages in order and collects the derived
//! tables for reporting.
//!
//! [`RegistryDataset`]: renal_model::RegistryDataset

pub mod anchor;
pub mod egfr;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod kfre;
pub mod labs;
pub mod outcomes;
pub mod pipeline;
pub mod slope;
pub mod stats;
pub mod timeline;
pub mod trend;

pub use anchor::{AnchorSource, AnchoredPatient, EgfrSource, resolve_anchors};
pub use egfr::{CREATININE_UMOL_PER_MG_DL, ckd_epi_2021, fill_visit_egfr, umol_to_mg_dl};
pub use endpoints::{
    DeclineEndpoint, EndpointHit, RemissionEndpoint, attach_manual_events, detect_egfr_decline,
    detect_igan_remission,
};
pub use error::{Result, SlopeError};
pub use events::{ManualEvents, earliest_events, event_types};
pub use kfre::{KfreInputs, KfreRisk, KfreRow, kfre_4var, kfre_8var, score_patients};
pub use labs::{
    BaselineLabs, LabCovariate, UnitConversion, UnitHarmonization, extract_baseline_labs,
    harmonize_lab_units,
};
pub use outcomes::{OutcomeVisit, TwelveMonthOutcome, twelve_month_outcomes};
pub use pipeline::{AnalysisPipeline, AnalysisResult};
pub use slope::{
    MixedModelFit, PatientSlope, PopulationSlope, SlopeEstimate, SlopeMethod,
    estimate_population_slope, fit_random_intercept, ols_line, per_patient_slopes,
};
pub use timeline::{DAYS_PER_YEAR, TimelineRow, build_timeline};
pub use trend::{TrendMetric, TrendPoint, trend_summary};
