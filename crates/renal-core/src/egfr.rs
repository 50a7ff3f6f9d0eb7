//! CKD-EPI 2021 creatinine equation (race-free).

use std::collections::HashMap;

use chrono::Datelike;
use renal_model::{RegistryDataset, Sex};

/// Creatinine conversion: µmol/L per mg/dL.
pub const CREATININE_UMOL_PER_MG_DL: f64 = 88.4;

pub fn umol_to_mg_dl(scr_umol_l: f64) -> f64 {
    scr_umol_l / CREATININE_UMOL_PER_MG_DL
}

/// eGFR in mL/min/1.73m² from serum creatinine (mg/dL), age and sex.
///
/// `None` when creatinine is not a positive finite number or the result is
/// not finite.
pub fn ckd_epi_2021(scr_mg_dl: f64, age_years: i32, sex: Sex) -> Option<f64> {
    if !scr_mg_dl.is_finite() || scr_mg_dl <= 0.0 {
        return None;
    }
    let (kappa, alpha) = match sex {
        Sex::Female => (0.7, -0.241),
        Sex::Male => (0.9, -0.302),
    };
    let ratio = scr_mg_dl / kappa;
    let mut egfr = 142.0
        * ratio.min(1.0).powf(alpha)
        * ratio.max(1.0).powf(-1.200)
        * 0.9938_f64.powi(age_years);
    if sex.is_female() {
        egfr *= 1.012;
    }
    egfr.is_finite().then_some(egfr)
}

/// Fills missing visit eGFR from visit creatinine.
///
/// Age is the visit year minus the patient's birth year. Returns the number
/// of visits filled.
pub fn fill_visit_egfr(dataset: &mut RegistryDataset) -> usize {
    let demographics: HashMap<_, _> = dataset
        .patients
        .iter()
        .filter_map(|p| Some((p.key.clone(), (p.sex?, p.birth_year?))))
        .collect();

    let mut filled = 0;
    for visit in dataset.visits.iter_mut().filter(|v| v.egfr.is_none()) {
        let (Some(scr), Some(date)) = (visit.scr_umol_l, visit.visit_date) else {
            continue;
        };
        let Some(&(sex, birth_year)) = demographics.get(&visit.key) else {
            continue;
        };
        let age = date.year() - birth_year;
        if let Some(egfr) = ckd_epi_2021(umol_to_mg_dl(scr), age, sex) {
            visit.egfr = Some(egfr);
            filled += 1;
        }
    }
    filled
}
