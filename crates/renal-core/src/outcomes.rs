//! Outcome at 12 months after the anchor.

use chrono::NaiveDate;
use renal_model::{AnalysisOptions, PatientKey};
use serde::Serialize;

use crate::anchor::AnchoredPatient;
use crate::timeline::{TimelineRow, rows_by_patient};

/// The visit picked as the 12-month measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeVisit {
    pub date: NaiveDate,
    pub days_from_baseline: i64,
    pub egfr: Option<f64>,
    pub upcr: Option<f64>,
    pub scr_umol_l: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwelveMonthOutcome {
    pub key: PatientKey,
    pub baseline_date: NaiveDate,
    pub egfr_baseline: Option<f64>,
    pub upcr_baseline: Option<f64>,
    /// `None` when no visit falls inside the window.
    pub visit: Option<OutcomeVisit>,
}

impl TwelveMonthOutcome {
    pub fn egfr_delta(&self) -> Option<f64> {
        Some(self.visit.as_ref()?.egfr? - self.egfr_baseline?)
    }

    pub fn upcr_delta(&self) -> Option<f64> {
        Some(self.visit.as_ref()?.upcr? - self.upcr_baseline?)
    }
}

/// One row per anchored patient, in patient order.
///
/// Among visits with elapsed days inside the inclusive window, the one
/// closest to the target day wins; the earliest wins a tie.
pub fn twelve_month_outcomes(
    anchors: &[AnchoredPatient],
    timeline: &[TimelineRow],
    options: &AnalysisOptions,
) -> Vec<TwelveMonthOutcome> {
    let (from, to) = options.outcome_window_days;
    let in_window = timeline
        .iter()
        .filter(|row| (from..=to).contains(&row.days_from_baseline));
    let by_patient = rows_by_patient(in_window);

    let outcomes: Vec<TwelveMonthOutcome> = anchors
        .iter()
        .filter_map(|patient| {
            let baseline_date = patient.anchor_date?;
            let visit = by_patient
                .get(&patient.key)
                .and_then(|rows| {
                    rows.iter().min_by_key(|row| {
                        (row.days_from_baseline - options.outcome_target_day).abs()
                    })
                })
                .map(|row| OutcomeVisit {
                    date: row.visit_date,
                    days_from_baseline: row.days_from_baseline,
                    egfr: row.egfr,
                    upcr: row.upcr,
                    scr_umol_l: row.scr_umol_l,
                });
            Some(TwelveMonthOutcome {
                key: patient.key.clone(),
                baseline_date,
                egfr_baseline: patient.baseline_egfr,
                upcr_baseline: patient.baseline_upcr,
                visit,
            })
        })
        .collect();

    tracing::info!(
        patients = outcomes.len(),
        with_visit = outcomes.iter().filter(|o| o.visit.is_some()).count(),
        "12-month outcomes"
    );
    outcomes
}
