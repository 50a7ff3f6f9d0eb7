//! Data-quality checks over the visit table.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use renal_core::stats::percent;
use renal_model::{PatientKey, VisitRecord};
use serde::Serialize;

/// Plausible ranges; values outside are flagged, never dropped.
const SBP_RANGE: (f64, f64) = (60.0, 250.0);
const DBP_RANGE: (f64, f64) = (30.0, 150.0);
const SCR_RANGE: (f64, f64) = (20.0, 2000.0);
const UPCR_RANGE: (f64, f64) = (0.0, 20000.0);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingField {
    pub field: &'static str,
    pub missing_n: usize,
    pub missing_pct: Option<f64>,
}

/// More than one visit for a patient on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitDuplicate {
    pub key: PatientKey,
    pub visit_date: NaiveDate,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitOutlier {
    pub key: PatientKey,
    pub visit_date: Option<NaiveDate>,
    pub sbp: Option<f64>,
    pub dbp: Option<f64>,
    pub scr_umol_l: Option<f64>,
    pub upcr: Option<f64>,
    /// `;`-joined flags such as `SBP_outlier;UPCR_outlier`.
    pub reasons: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CenterQuality {
    pub center_code: String,
    pub visits_n: usize,
    pub patients_n: usize,
    pub miss_sbp: usize,
    pub miss_scr: usize,
    pub miss_upcr: usize,
}

impl CenterQuality {
    pub fn miss_sbp_pct(&self) -> Option<f64> {
        percent(self.miss_sbp, self.visits_n)
    }

    pub fn miss_scr_pct(&self) -> Option<f64> {
        percent(self.miss_scr, self.visits_n)
    }

    pub fn miss_upcr_pct(&self) -> Option<f64> {
        percent(self.miss_upcr, self.visits_n)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub missingness: Vec<MissingField>,
    pub duplicates: Vec<VisitDuplicate>,
    pub outliers: Vec<VisitOutlier>,
    pub centers: Vec<CenterQuality>,
}

fn outside(value: Option<f64>, (low, high): (f64, f64)) -> bool {
    value.is_some_and(|v| v < low || v > high)
}

fn missingness(visits: &[VisitRecord]) -> Vec<MissingField> {
    let count = |missing: fn(&VisitRecord) -> bool| visits.iter().filter(|v| missing(v)).count();
    let fields: [(&'static str, usize); 4] = [
        ("visit_date", count(|v| v.visit_date.is_none())),
        ("sbp", count(|v| v.sbp.is_none())),
        ("scr_umol_l", count(|v| v.scr_umol_l.is_none())),
        ("upcr", count(|v| v.upcr.is_none())),
    ];
    fields
        .into_iter()
        .map(|(field, missing_n)| MissingField {
            field,
            missing_n,
            missing_pct: percent(missing_n, visits.len()),
        })
        .collect()
}

fn duplicates(visits: &[VisitRecord]) -> Vec<VisitDuplicate> {
    let mut counts: BTreeMap<(&PatientKey, NaiveDate), usize> = BTreeMap::new();
    for visit in visits {
        if let Some(date) = visit.visit_date {
            *counts.entry((&visit.key, date)).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|((key, visit_date), n)| VisitDuplicate {
            key: key.clone(),
            visit_date,
            n,
        })
        .collect()
}

fn outliers(visits: &[VisitRecord]) -> Vec<VisitOutlier> {
    visits
        .iter()
        .filter_map(|visit| {
            let checks = [
                (outside(visit.sbp, SBP_RANGE), "SBP_outlier"),
                (outside(visit.dbp, DBP_RANGE), "DBP_outlier"),
                (outside(visit.scr_umol_l, SCR_RANGE), "Scr_outlier"),
                (outside(visit.upcr, UPCR_RANGE), "UPCR_outlier"),
            ];
            let reasons: Vec<&str> = checks
                .iter()
                .filter(|(flagged, _)| *flagged)
                .map(|(_, reason)| *reason)
                .collect();
            if reasons.is_empty() {
                return None;
            }
            Some(VisitOutlier {
                key: visit.key.clone(),
                visit_date: visit.visit_date,
                sbp: visit.sbp,
                dbp: visit.dbp,
                scr_umol_l: visit.scr_umol_l,
                upcr: visit.upcr,
                reasons: reasons.join(";"),
            })
        })
        .collect()
}

fn centers(visits: &[VisitRecord]) -> Vec<CenterQuality> {
    let mut by_center: BTreeMap<&str, (CenterQuality, BTreeSet<&str>)> = BTreeMap::new();
    for visit in visits {
        let center = visit.key.center_code();
        let (summary, patients) = by_center.entry(center).or_insert_with(|| {
            (
                CenterQuality {
                    center_code: center.to_string(),
                    visits_n: 0,
                    patients_n: 0,
                    miss_sbp: 0,
                    miss_scr: 0,
                    miss_upcr: 0,
                },
                BTreeSet::new(),
            )
        });
        summary.visits_n += 1;
        summary.miss_sbp += usize::from(visit.sbp.is_none());
        summary.miss_scr += usize::from(visit.scr_umol_l.is_none());
        summary.miss_upcr += usize::from(visit.upcr.is_none());
        patients.insert(visit.key.patient_code());
    }
    by_center
        .into_values()
        .map(|(mut summary, patients)| {
            summary.patients_n = patients.len();
            summary
        })
        .collect()
}

/// Missingness, duplicate visits, range outliers and per-center counts.
pub fn quality_report(visits: &[VisitRecord]) -> QualityReport {
    let report = QualityReport {
        missingness: missingness(visits),
        duplicates: duplicates(visits),
        outliers: outliers(visits),
        centers: centers(visits),
    };
    if !report.duplicates.is_empty() || !report.outliers.is_empty() {
        tracing::warn!(
            duplicate_visits = report.duplicates.len(),
            outlier_visits = report.outliers.len(),
            "visit data-quality findings"
        );
    }
    report
}
