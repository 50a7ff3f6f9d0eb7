//! Kidney Failure Risk Equation (Tangri et al., JAMA 2011).
//!
//! UPCR stands in for the albumin-creatinine ratio of the published model.
//! The two are not equivalent, so scores are indicative only.

use renal_model::{PatientKey, Sex};
use serde::Serialize;

use crate::anchor::AnchoredPatient;
use crate::labs::BaselineLabs;
use crate::stats::round_to;

const AGE_COEF: f64 = 0.2201;
const FEMALE_COEF: f64 = 0.2467;
const EGFR_COEF: f64 = -0.5567;
const LOG2_UACR_COEF: f64 = 0.4510;

const AGE_CENTER: f64 = 7.036;
const FEMALE_CENTER: f64 = 0.5642;
const EGFR_CENTER: f64 = 7.222;
const LOG2_UACR_CENTER: f64 = 5.137;

const ALBUMIN_COEF: f64 = -0.3369;
const PHOSPHATE_COEF: f64 = 0.4681;
const BICARBONATE_COEF: f64 = -0.2170;
const CALCIUM_COEF: f64 = -0.4573;

const ALBUMIN_CENTER: f64 = 3.997;
const PHOSPHATE_CENTER: f64 = 3.916;
const BICARBONATE_CENTER: f64 = 25.57;
const CALCIUM_CENTER: f64 = 9.355;

const S0_2YR: f64 = 0.9832;
const KFRE4_S0_5YR: f64 = 0.9365;
const KFRE8_S0_5YR: f64 = 0.9240;

/// Covariates shared by both equations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KfreInputs {
    pub age: Option<f64>,
    pub sex: Option<Sex>,
    pub egfr: Option<f64>,
    /// mg/g, used in place of uACR.
    pub upcr_mg_g: Option<f64>,
}

/// Predicted probability of kidney failure, as proportions rounded to five
/// decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KfreRisk {
    pub risk_2yr: f64,
    pub risk_5yr: f64,
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn linear_predictor_4var(inputs: &KfreInputs) -> Option<f64> {
    let age = positive(inputs.age)?;
    let egfr = positive(inputs.egfr)?;
    let upcr = positive(inputs.upcr_mg_g)?;
    let female = if inputs.sex?.is_female() { 1.0 } else { 0.0 };

    Some(
        AGE_COEF * (age / 10.0 - AGE_CENTER)
            + FEMALE_COEF * (female - FEMALE_CENTER)
            + EGFR_COEF * (egfr / 5.0 - EGFR_CENTER)
            + LOG2_UACR_COEF * (upcr.log2() - LOG2_UACR_CENTER),
    )
}

fn risk(lp: f64, s0_2yr: f64, s0_5yr: f64) -> Option<KfreRisk> {
    let hazard = lp.exp();
    let risk_2yr = 1.0 - s0_2yr.powf(hazard);
    let risk_5yr = 1.0 - s0_5yr.powf(hazard);
    if !risk_2yr.is_finite() || !risk_5yr.is_finite() {
        return None;
    }
    Some(KfreRisk {
        risk_2yr: round_to(risk_2yr, 5),
        risk_5yr: round_to(risk_5yr, 5),
    })
}

/// 4-variable KFRE. `None` unless age, sex, eGFR and UPCR are all present
/// and age, eGFR and UPCR are positive.
pub fn kfre_4var(inputs: &KfreInputs) -> Option<KfreRisk> {
    risk(linear_predictor_4var(inputs)?, S0_2YR, KFRE4_S0_5YR)
}

/// 8-variable KFRE: the 4-variable predictor plus albumin (g/dL), phosphate
/// (mg/dL), bicarbonate (mmol/L) and calcium (mg/dL).
pub fn kfre_8var(inputs: &KfreInputs, labs: &BaselineLabs) -> Option<KfreRisk> {
    let lp4 = linear_predictor_4var(inputs)?;
    let extra = ALBUMIN_COEF * (finite(labs.albumin)? - ALBUMIN_CENTER)
        + PHOSPHATE_COEF * (finite(labs.phosphate)? - PHOSPHATE_CENTER)
        + BICARBONATE_COEF * (finite(labs.bicarbonate)? - BICARBONATE_CENTER)
        + CALCIUM_COEF * (finite(labs.calcium)? - CALCIUM_CENTER);
    risk(lp4 + extra, S0_2YR, KFRE8_S0_5YR)
}

/// Scores and inputs of one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KfreRow {
    pub key: PatientKey,
    pub age: Option<i32>,
    pub sex: Option<Sex>,
    pub baseline_egfr: Option<f64>,
    pub baseline_upcr: Option<f64>,
    pub kfre4: Option<KfreRisk>,
    /// Harmonised lab covariates.
    pub labs: BaselineLabs,
    pub kfre8: Option<KfreRisk>,
}

/// Scores every patient; `labs` is parallel to `patients`.
pub fn score_patients(patients: &[AnchoredPatient], labs: &[BaselineLabs]) -> Vec<KfreRow> {
    let rows: Vec<KfreRow> = patients
        .iter()
        .zip(labs)
        .map(|(patient, labs)| {
            let inputs = KfreInputs {
                age: patient.age.map(f64::from),
                sex: patient.sex,
                egfr: patient.baseline_egfr,
                upcr_mg_g: patient.baseline_upcr,
            };
            KfreRow {
                key: patient.key.clone(),
                age: patient.age,
                sex: patient.sex,
                baseline_egfr: patient.baseline_egfr,
                baseline_upcr: patient.baseline_upcr,
                kfre4: kfre_4var(&inputs),
                labs: *labs,
                kfre8: kfre_8var(&inputs, labs),
            }
        })
        .collect();

    tracing::info!(
        patients = rows.len(),
        kfre4 = rows.iter().filter(|r| r.kfre4.is_some()).count(),
        kfre8 = rows.iter().filter(|r| r.kfre8.is_some()).count(),
        "KFRE scores computed"
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inputs(age: f64, sex: Sex, egfr: f64, upcr: f64) -> KfreInputs {
        KfreInputs {
            age: Some(age),
            sex: Some(sex),
            egfr: Some(egfr),
            upcr_mg_g: Some(upcr),
        }
    }

    fn reference_labs() -> BaselineLabs {
        BaselineLabs {
            albumin: Some(4.0),
            phosphate: Some(3.5),
            bicarbonate: Some(24.0),
            calcium: Some(9.5),
        }
    }

    #[test]
    fn test_kfre4_reference_values() {
        let risk = kfre_4var(&inputs(70.0, Sex::Female, 30.0, 300.0)).unwrap();
        assert_eq!(risk.risk_2yr, 0.13845);
        assert_eq!(risk.risk_5yr, 0.43845);

        let risk = kfre_4var(&inputs(55.0, Sex::Male, 45.0, 1000.0)).unwrap();
        assert_eq!(risk.risk_2yr, 0.0339);
        assert_eq!(risk.risk_5yr, 0.125);
    }

    #[test]
    fn test_kfre8_reference_values() {
        let risk = kfre_8var(&inputs(70.0, Sex::Female, 30.0, 300.0), &reference_labs()).unwrap();
        assert_eq!(risk.risk_2yr, 0.14889);
        assert_eq!(risk.risk_5yr, 0.52864);
    }

    #[test]
    fn test_any_missing_input_is_undefined() {
        let complete = inputs(70.0, Sex::Female, 30.0, 300.0);
        for broken in [
            KfreInputs { age: None, ..complete },
            KfreInputs { sex: None, ..complete },
            KfreInputs { egfr: None, ..complete },
            KfreInputs { upcr_mg_g: None, ..complete },
            KfreInputs { egfr: Some(0.0), ..complete },
            KfreInputs { upcr_mg_g: Some(-5.0), ..complete },
            KfreInputs { age: Some(f64::NAN), ..complete },
        ] {
            assert_eq!(kfre_4var(&broken), None);
            assert_eq!(kfre_8var(&broken, &reference_labs()), None);
        }
        for labs in [
            BaselineLabs { albumin: None, ..reference_labs() },
            BaselineLabs { phosphate: None, ..reference_labs() },
            BaselineLabs { bicarbonate: Some(f64::INFINITY), ..reference_labs() },
            BaselineLabs { calcium: None, ..reference_labs() },
        ] {
            assert_eq!(kfre_8var(&complete, &labs), None);
        }
    }

    proptest! {
        #[test]
        fn test_prop_risks_are_proportions(
            age in 18.0f64..100.0,
            female in any::<bool>(),
            egfr in 5.0f64..120.0,
            upcr in 10.0f64..10000.0,
        ) {
            let sex = if female { Sex::Female } else { Sex::Male };
            let risk = kfre_4var(&inputs(age, sex, egfr, upcr)).unwrap();
            prop_assert!((0.0..=1.0).contains(&risk.risk_2yr));
            prop_assert!((0.0..=1.0).contains(&risk.risk_5yr));
            prop_assert!(risk.risk_5yr >= risk.risk_2yr);
        }

        #[test]
        fn test_prop_five_year_exceeds_two_year(
            age in 40.0f64..90.0,
            female in any::<bool>(),
            egfr in 10.0f64..60.0,
            upcr in 100.0f64..3000.0,
        ) {
            let sex = if female { Sex::Female } else { Sex::Male };
            let risk = kfre_4var(&inputs(age, sex, egfr, upcr)).unwrap();
            prop_assert!(risk.risk_5yr > risk.risk_2yr);
        }
    }
}
