//! Longitudinal timeline: every dated visit joined to its patient's anchor.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use renal_model::{PatientKey, VisitRecord};
use serde::Serialize;

use crate::anchor::AnchoredPatient;

pub const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineRow {
    pub key: PatientKey,
    /// Disease module of the patient.
    pub module: String,
    pub visit_date: NaiveDate,
    pub days_from_baseline: i64,
    pub time_yr: f64,
    pub egfr: Option<f64>,
    pub upcr: Option<f64>,
    pub scr_umol_l: Option<f64>,
    pub baseline_egfr: Option<f64>,
    pub baseline_upcr: Option<f64>,
}

impl TimelineRow {
    /// Visit eGFR as a fraction of baseline; needs a positive baseline.
    pub fn pct_of_baseline(&self) -> Option<f64> {
        let baseline = self.baseline_egfr.filter(|b| *b > 0.0)?;
        Some(self.egfr? / baseline)
    }
}

/// Joins visits to anchored patients, keeping visit order.
///
/// Visits without a date and visits of patients without an anchor are left out.
pub fn build_timeline(anchors: &[AnchoredPatient], visits: &[VisitRecord]) -> Vec<TimelineRow> {
    let by_key: HashMap<&PatientKey, (&AnchoredPatient, NaiveDate)> = anchors
        .iter()
        .filter_map(|a| Some((&a.key, (a, a.anchor_date?))))
        .collect();

    let rows: Vec<TimelineRow> = visits
        .iter()
        .filter_map(|visit| {
            let visit_date = visit.visit_date?;
            let (patient, anchor_date) = by_key.get(&visit.key)?;
            let days = (visit_date - *anchor_date).num_days();
            Some(TimelineRow {
                key: visit.key.clone(),
                module: patient.module.clone(),
                visit_date,
                days_from_baseline: days,
                time_yr: days as f64 / DAYS_PER_YEAR,
                egfr: visit.egfr,
                upcr: visit.upcr,
                scr_umol_l: visit.scr_umol_l,
                baseline_egfr: patient.baseline_egfr,
                baseline_upcr: patient.baseline_upcr,
            })
        })
        .collect();

    tracing::info!(rows = rows.len(), "timeline built");
    rows
}

/// Groups rows per patient (sorted by key), each group stably sorted by
/// elapsed days.
pub fn rows_by_patient<'a>(
    rows: impl IntoIterator<Item = &'a TimelineRow>,
) -> BTreeMap<&'a PatientKey, Vec<&'a TimelineRow>> {
    let mut groups: BTreeMap<&PatientKey, Vec<&TimelineRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(&row.key).or_default().push(row);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|row| row.days_from_baseline);
    }
    groups
}
