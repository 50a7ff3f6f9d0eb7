//! Baseline anchor resolution.
//!
//! Every patient gets one time-zero date plus a baseline eGFR and UPCR. The
//! declared baseline fields win; the earliest dated visit fills the gaps.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use renal_model::{PatientKey, PatientRecord, Sex, VisitRecord};
use serde::Serialize;

use crate::egfr::{ckd_epi_2021, umol_to_mg_dl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnchorSource {
    DeclaredBaseline,
    FirstVisit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EgfrSource {
    /// CKD-EPI 2021 from the declared baseline creatinine.
    BaselineCreatinine,
    /// eGFR recorded at the earliest visit.
    FirstVisit,
}

/// A patient with resolved baseline values.
///
/// `anchor_date` is `None` when the patient has neither a declared baseline
/// date nor a dated visit; such patients stay in descriptive summaries but
/// produce no timeline rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchoredPatient {
    pub key: PatientKey,
    pub module: String,
    pub sex: Option<Sex>,
    pub birth_year: Option<i32>,
    pub anchor_date: Option<NaiveDate>,
    pub anchor_source: Option<AnchorSource>,
    pub baseline_egfr: Option<f64>,
    pub egfr_source: Option<EgfrSource>,
    pub baseline_upcr: Option<f64>,
    /// Anchor year minus birth year.
    pub age: Option<i32>,
}

impl AnchoredPatient {
    pub fn is_anchored(&self) -> bool {
        self.anchor_date.is_some()
    }
}

/// Values taken from a patient's earliest dated visits.
#[derive(Debug, Default)]
struct FirstVisit {
    date: Option<NaiveDate>,
    egfr: Option<f64>,
    upcr: Option<f64>,
}

/// Earliest visit date, and the first non-null eGFR and UPCR in date order.
fn first_visits(visits: &[VisitRecord]) -> HashMap<&PatientKey, FirstVisit> {
    let mut dated: Vec<(&VisitRecord, NaiveDate)> = visits
        .iter()
        .filter_map(|v| Some((v, v.visit_date?)))
        .collect();
    dated.sort_by_key(|(_, date)| *date);

    let mut first: HashMap<&PatientKey, FirstVisit> = HashMap::new();
    for (visit, date) in dated {
        let entry = first.entry(&visit.key).or_default();
        entry.date.get_or_insert(date);
        if entry.egfr.is_none() {
            entry.egfr = visit.egfr;
        }
        if entry.upcr.is_none() {
            entry.upcr = visit.upcr;
        }
    }
    first
}

fn resolve_one(patient: &PatientRecord, first: Option<&FirstVisit>) -> AnchoredPatient {
    let (anchor_date, anchor_source) = match (patient.baseline_date, first.and_then(|f| f.date)) {
        (Some(date), _) => (Some(date), Some(AnchorSource::DeclaredBaseline)),
        (None, Some(date)) => (Some(date), Some(AnchorSource::FirstVisit)),
        (None, None) => (None, None),
    };
    let age = anchor_date
        .zip(patient.birth_year)
        .map(|(date, birth_year)| date.year() - birth_year);

    let from_creatinine = match (patient.baseline_scr, age, patient.sex) {
        (Some(scr), Some(age), Some(sex)) => ckd_epi_2021(umol_to_mg_dl(scr), age, sex),
        _ => None,
    };
    let (baseline_egfr, egfr_source) = match (from_creatinine, first.and_then(|f| f.egfr)) {
        (Some(egfr), _) => (Some(egfr), Some(EgfrSource::BaselineCreatinine)),
        (None, Some(egfr)) => (Some(egfr), Some(EgfrSource::FirstVisit)),
        (None, None) => (None, None),
    };

    AnchoredPatient {
        key: patient.key.clone(),
        module: patient.module.clone(),
        sex: patient.sex,
        birth_year: patient.birth_year,
        anchor_date,
        anchor_source,
        baseline_egfr,
        egfr_source,
        baseline_upcr: patient.baseline_upcr.or_else(|| first.and_then(|f| f.upcr)),
        age,
    }
}

/// Resolves the baseline of every patient, in patient order.
pub fn resolve_anchors(patients: &[PatientRecord], visits: &[VisitRecord]) -> Vec<AnchoredPatient> {
    let first = first_visits(visits);
    let resolved: Vec<AnchoredPatient> = patients
        .iter()
        .map(|patient| resolve_one(patient, first.get(&patient.key)))
        .collect();

    let anchored = resolved.iter().filter(|p| p.is_anchored()).count();
    let with_egfr = resolved.iter().filter(|p| p.baseline_egfr.is_some()).count();
    tracing::info!(
        patients = resolved.len(),
        anchored,
        with_baseline_egfr = with_egfr,
        "baseline anchors resolved"
    );
    resolved
}
