//! Analysis pipeline with explicit stages.
//!
//! The pipeline runs these stages in order over one loaded dataset:
//! 1. **Visit eGFR**: optionally derive missing visit eGFR from creatinine
//! 2. **Anchors**: resolve baseline date, eGFR, UPCR and age per patient
//! 3. **Timeline**: join dated visits to anchors
//! 4. **Endpoints**: eGFR decline (with manual events) and IgAN remission
//! 5. **KFRE**: source baseline labs, harmonise units, score
//! 6. **Slopes**: population mixed model and per-patient OLS
//! 7. **Summaries**: 12-month outcomes and monthly trends
//!
//! No stage fails: patients that cannot be evaluated are left out of the
//! affected table and model failures become a labelled slope row.

use std::borrow::Cow;
use std::time::Instant;

use renal_model::{AnalysisOptions, RegistryDataset, VisitEgfrMode};
use tracing::{debug, info, info_span};

use crate::anchor::{AnchoredPatient, resolve_anchors};
use crate::egfr::fill_visit_egfr;
use crate::endpoints::{
    DeclineEndpoint, RemissionEndpoint, attach_manual_events, detect_egfr_decline,
    detect_igan_remission,
};
use crate::events::{earliest_events, event_types};
use crate::kfre::{KfreRow, score_patients};
use crate::labs::{UnitHarmonization, extract_baseline_labs, harmonize_lab_units};
use crate::outcomes::{TwelveMonthOutcome, twelve_month_outcomes};
use crate::slope::{
    PatientSlope, PopulationSlope, estimate_population_slope, per_patient_slopes,
};
use crate::timeline::{TimelineRow, build_timeline};
use crate::trend::{TrendMetric, TrendPoint, trend_summary};

/// Every table derived by one run.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// One entry per patient, anchored or not, in patient order.
    pub anchors: Vec<AnchoredPatient>,
    pub timeline: Vec<TimelineRow>,
    pub decline: Vec<DeclineEndpoint>,
    /// Sorted manual event types; one `manual_<type>` column each.
    pub manual_event_types: Vec<String>,
    pub remission: Vec<RemissionEndpoint>,
    pub kfre: Vec<KfreRow>,
    pub harmonizations: Vec<UnitHarmonization>,
    pub population_slope: PopulationSlope,
    pub patient_slopes: Vec<PatientSlope>,
    pub outcomes: Vec<TwelveMonthOutcome>,
    pub trend_egfr: Vec<TrendPoint>,
    pub trend_upcr: Vec<TrendPoint>,
    /// Visits whose eGFR was computed from creatinine.
    pub derived_visit_egfr: usize,
}

impl AnalysisResult {
    pub fn anchored_count(&self) -> usize {
        self.anchors.iter().filter(|a| a.is_anchored()).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisPipeline {
    options: AnalysisOptions,
}

impl AnalysisPipeline {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn run(&self, dataset: &RegistryDataset) -> AnalysisResult {
        let options = &self.options;
        let run_start = Instant::now();

        // ===== Stage 1: Visit eGFR =====
        let mut derived_visit_egfr = 0;
        let dataset = match options.visit_egfr {
            VisitEgfrMode::AsRecorded => Cow::Borrowed(dataset),
            VisitEgfrMode::DeriveMissing => {
                let mut owned = dataset.clone();
                derived_visit_egfr = fill_visit_egfr(&mut owned);
                info!(visits = derived_visit_egfr, "visit eGFR derived from creatinine");
                Cow::Owned(owned)
            }
        };
        let dataset = dataset.as_ref();

        // ===== Stage 2-3: Anchors and timeline =====
        let (anchors, timeline) = info_span!("anchors").in_scope(|| {
            let start = Instant::now();
            let anchors = resolve_anchors(&dataset.patients, &dataset.visits);
            let timeline = build_timeline(&anchors, &dataset.visits);
            info!(
                patients = anchors.len(),
                anchored = anchors.iter().filter(|a| a.is_anchored()).count(),
                timeline_rows = timeline.len(),
                duration_ms = start.elapsed().as_millis(),
                "anchors resolved"
            );
            (anchors, timeline)
        });

        // ===== Stage 4: Endpoints =====
        let (decline, manual_event_types, remission) = info_span!("endpoints").in_scope(|| {
            let start = Instant::now();
            let mut decline = detect_egfr_decline(&timeline, options);
            let events = earliest_events(&dataset.events);
            attach_manual_events(&mut decline, &events);
            let remission = detect_igan_remission(&timeline, options);
            debug!(
                event_patients = events.len(),
                duration_ms = start.elapsed().as_millis(),
                "endpoints complete"
            );
            (decline, event_types(&events), remission)
        });

        // ===== Stage 5: KFRE =====
        let (kfre, harmonizations) = info_span!("kfre").in_scope(|| {
            let start = Instant::now();
            let mut labs = extract_baseline_labs(&anchors, &dataset.labs, options.lab_window_days);
            let harmonizations = harmonize_lab_units(&mut labs);
            let kfre = score_patients(&anchors, &labs);
            debug!(duration_ms = start.elapsed().as_millis(), "KFRE complete");
            (kfre, harmonizations)
        });

        // ===== Stage 6: Slopes =====
        let (population_slope, patient_slopes) = info_span!("slopes").in_scope(|| {
            let start = Instant::now();
            let population = estimate_population_slope(&timeline, options);
            let per_patient = per_patient_slopes(&timeline);
            info!(
                method = %population.method.label(),
                per_patient = per_patient.len(),
                duration_ms = start.elapsed().as_millis(),
                "eGFR slopes estimated"
            );
            (population, per_patient)
        });

        // ===== Stage 7: Summaries =====
        let outcomes = twelve_month_outcomes(&anchors, &timeline, options);
        let trend_egfr = trend_summary(&timeline, TrendMetric::Egfr);
        let trend_upcr = trend_summary(&timeline, TrendMetric::Upcr);

        info!(
            duration_ms = run_start.elapsed().as_millis(),
            "analysis complete"
        );
        AnalysisResult {
            anchors,
            timeline,
            decline,
            manual_event_types,
            remission,
            kfre,
            harmonizations,
            population_slope,
            patient_slopes,
            outcomes,
            trend_egfr,
            trend_upcr,
            derived_visit_egfr,
        }
    }
}
