//! Baseline lab sourcing for the 8-variable KFRE.
//!
//! Lab names are free text, so each covariate is matched by keyword. Units
//! are not trusted either: after extraction the cohort median decides
//! whether a covariate was reported in SI units and needs rescaling. This is
//! a cohort-level heuristic and the result must be checked by the
//! investigator.

use std::collections::HashMap;
use std::fmt;

use renal_model::LabRecord;
use serde::Serialize;

use crate::anchor::AnchoredPatient;
use crate::stats::{median, present};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LabCovariate {
    Albumin,
    Phosphate,
    Bicarbonate,
    Calcium,
}

impl LabCovariate {
    pub const ALL: [LabCovariate; 4] = [
        LabCovariate::Albumin,
        LabCovariate::Phosphate,
        LabCovariate::Bicarbonate,
        LabCovariate::Calcium,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LabCovariate::Albumin => "albumin",
            LabCovariate::Phosphate => "phosphate",
            LabCovariate::Bicarbonate => "bicarbonate",
            LabCovariate::Calcium => "calcium",
        }
    }

    /// Lower-case substrings that identify the covariate in a lab name.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            LabCovariate::Albumin => &["albumin"],
            LabCovariate::Phosphate => &["phosphate", "phosphorus"],
            LabCovariate::Bicarbonate => &["bicarbonate", "hco3", "co2"],
            LabCovariate::Calcium => &["calcium"],
        }
    }

    pub fn matches(self, lab_name: &str) -> bool {
        let lower = lab_name.to_lowercase();
        self.keywords().iter().any(|keyword| lower.contains(keyword))
    }

    /// The unit rescaling this covariate is checked for, if any.
    pub fn unit_conversion(self) -> Option<UnitConversion> {
        match self {
            LabCovariate::Albumin => Some(UnitConversion::AlbuminGramsPerLitre),
            LabCovariate::Phosphate => Some(UnitConversion::PhosphateMmolPerLitre),
            LabCovariate::Bicarbonate => None,
            LabCovariate::Calcium => Some(UnitConversion::CalciumMmolPerLitre),
        }
    }
}

impl fmt::Display for LabCovariate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Median-triggered unit conversions to the units the KFRE expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitConversion {
    /// Median above 10: g/L, divided by 10 to g/dL.
    AlbuminGramsPerLitre,
    /// Median below 3: mmol/L, multiplied by 3.097 to mg/dL.
    PhosphateMmolPerLitre,
    /// Median below 5: mmol/L, multiplied by 4.008 to mg/dL.
    CalciumMmolPerLitre,
}

impl UnitConversion {
    pub fn applies_to(self, cohort_median: f64) -> bool {
        match self {
            UnitConversion::AlbuminGramsPerLitre => cohort_median > 10.0,
            UnitConversion::PhosphateMmolPerLitre => cohort_median < 3.0,
            UnitConversion::CalciumMmolPerLitre => cohort_median < 5.0,
        }
    }

    pub fn convert(self, value: f64) -> f64 {
        match self {
            UnitConversion::AlbuminGramsPerLitre => value / 10.0,
            UnitConversion::PhosphateMmolPerLitre => value * 3.097,
            UnitConversion::CalciumMmolPerLitre => value * 4.008,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            UnitConversion::AlbuminGramsPerLitre => "albumin g/L -> g/dL (/10)",
            UnitConversion::PhosphateMmolPerLitre => "phosphate mmol/L -> mg/dL (x3.097)",
            UnitConversion::CalciumMmolPerLitre => "calcium mmol/L -> mg/dL (x4.008)",
        }
    }
}

/// A conversion applied to the whole cohort column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitHarmonization {
    pub covariate: LabCovariate,
    pub conversion: UnitConversion,
    pub cohort_median: f64,
    pub values_converted: usize,
}

/// The four 8-variable KFRE covariates of one patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BaselineLabs {
    pub albumin: Option<f64>,
    pub phosphate: Option<f64>,
    pub bicarbonate: Option<f64>,
    pub calcium: Option<f64>,
}

impl BaselineLabs {
    pub fn get(&self, covariate: LabCovariate) -> Option<f64> {
        match covariate {
            LabCovariate::Albumin => self.albumin,
            LabCovariate::Phosphate => self.phosphate,
            LabCovariate::Bicarbonate => self.bicarbonate,
            LabCovariate::Calcium => self.calcium,
        }
    }

    fn slot(&mut self, covariate: LabCovariate) -> &mut Option<f64> {
        match covariate {
            LabCovariate::Albumin => &mut self.albumin,
            LabCovariate::Phosphate => &mut self.phosphate,
            LabCovariate::Bicarbonate => &mut self.bicarbonate,
            LabCovariate::Calcium => &mut self.calcium,
        }
    }
}

/// Per patient (parallel to `anchors`), the value of the lab closest to the
/// anchor within `window_days` for each covariate.
///
/// Only labs with a date and a numeric value count. Equal distances keep the
/// record that comes first in input order.
pub fn extract_baseline_labs(
    anchors: &[AnchoredPatient],
    labs: &[LabRecord],
    window_days: i64,
) -> Vec<BaselineLabs> {
    let index: HashMap<_, _> = anchors
        .iter()
        .enumerate()
        .filter_map(|(idx, a)| Some((&a.key, (idx, a.anchor_date?))))
        .collect();

    // (distance, value) of the best record so far per patient and covariate.
    let mut best: Vec<[Option<(i64, f64)>; 4]> = vec![[None; 4]; anchors.len()];
    for lab in labs {
        let (Some(lab_date), Some(value)) = (lab.lab_date, lab.lab_value) else {
            continue;
        };
        let Some(&(idx, anchor_date)) = index.get(&lab.key) else {
            continue;
        };
        let distance = (lab_date - anchor_date).num_days().abs();
        if distance > window_days {
            continue;
        }
        for (slot, covariate) in LabCovariate::ALL.iter().enumerate() {
            if !covariate.matches(&lab.lab_name) {
                continue;
            }
            let current = &mut best[idx][slot];
            if current.is_none_or(|(d, _)| distance < d) {
                *current = Some((distance, value));
            }
        }
    }

    best.into_iter()
        .map(|slots| {
            let mut labs = BaselineLabs::default();
            for (slot, covariate) in LabCovariate::ALL.iter().enumerate() {
                *labs.slot(*covariate) = slots[slot].map(|(_, value)| value);
            }
            labs
        })
        .collect()
}

/// Rescales a covariate across the cohort when its median points to the
/// wrong unit.
pub fn harmonize_lab_units(labs: &mut [BaselineLabs]) -> Vec<UnitHarmonization> {
    let mut applied = Vec::new();
    for covariate in LabCovariate::ALL {
        let Some(conversion) = covariate.unit_conversion() else {
            continue;
        };
        let values: Vec<Option<f64>> = labs.iter().map(|l| l.get(covariate)).collect();
        let Some(cohort_median) = median(&present(&values)) else {
            continue;
        };
        if !conversion.applies_to(cohort_median) {
            continue;
        }

        let mut converted = 0;
        for patient in labs.iter_mut() {
            if let Some(value) = patient.slot(covariate).as_mut() {
                *value = conversion.convert(*value);
                converted += 1;
            }
        }
        tracing::warn!(
            covariate = %covariate,
            cohort_median,
            values = converted,
            conversion = conversion.description(),
            "lab unit harmonisation applied; verify units"
        );
        applied.push(UnitHarmonization {
            covariate,
            conversion,
            cohort_median,
            values_converted: converted,
        });
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::resolve_anchors;
    use chrono::NaiveDate;
    use renal_model::{PatientKey, PatientRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lab(code: &str, d: NaiveDate, name: &str, value: Option<f64>) -> LabRecord {
        LabRecord {
            key: PatientKey::new("A", code).unwrap(),
            lab_date: Some(d),
            lab_name: name.to_string(),
            lab_value: value,
            lab_unit: None,
        }
    }

    fn anchored(codes: &[&str]) -> Vec<AnchoredPatient> {
        let patients: Vec<_> = codes
            .iter()
            .map(|code| {
                let mut p = PatientRecord::new(PatientKey::new("A", *code).unwrap(), "IGAN");
                p.baseline_date = Some(date(2020, 6, 1));
                p
            })
            .collect();
        resolve_anchors(&patients, &[])
    }

    #[test]
    fn test_keyword_matching() {
        assert!(LabCovariate::Albumin.matches("Serum ALBUMIN"));
        assert!(LabCovariate::Phosphate.matches("phosphorus, inorganic"));
        assert!(LabCovariate::Bicarbonate.matches("tCO2"));
        assert!(LabCovariate::Bicarbonate.matches("HCO3-"));
        assert!(!LabCovariate::Calcium.matches("creatinine"));
    }

    #[test]
    fn test_closest_in_window_with_value() {
        let anchors = anchored(&["1"]);
        let labs = vec![
            lab("1", date(2020, 5, 1), "Albumin", Some(3.1)),
            lab("1", date(2020, 6, 3), "Albumin", None),
            lab("1", date(2020, 6, 11), "Albumin", Some(3.9)),
            lab("1", date(2020, 5, 22), "Albumin", Some(3.5)),
            lab("1", date(2020, 12, 1), "Calcium", Some(9.0)),
        ];
        let result = extract_baseline_labs(&anchors, &labs, 90);

        // Both candidates are 10 days away; the earlier record in input order wins.
        assert_eq!(result[0].albumin, Some(3.9));
        assert_eq!(result[0].calcium, None);
    }

    #[test]
    fn test_window_is_inclusive() {
        let anchors = anchored(&["1"]);
        let labs = vec![lab("1", date(2020, 8, 30), "bicarbonate", Some(22.0))];
        assert_eq!(extract_baseline_labs(&anchors, &labs, 90)[0].bicarbonate, Some(22.0));
        assert_eq!(extract_baseline_labs(&anchors, &labs, 89)[0].bicarbonate, None);
    }

    #[test]
    fn test_harmonize_albumin_from_grams_per_litre() {
        let mut labs = vec![
            BaselineLabs {
                albumin: Some(38.0),
                phosphate: Some(3.6),
                ..Default::default()
            },
            BaselineLabs {
                albumin: Some(42.0),
                calcium: Some(2.3),
                ..Default::default()
            },
            BaselineLabs::default(),
        ];
        let applied = harmonize_lab_units(&mut labs);

        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0].covariate, LabCovariate::Albumin);
        assert_eq!(applied[0].cohort_median, 40.0);
        assert_eq!(applied[0].values_converted, 2);
        assert!((labs[0].albumin.unwrap() - 3.8).abs() < 1e-12);
        assert_eq!(labs[0].phosphate, Some(3.6));
        assert_eq!(applied[1].covariate, LabCovariate::Calcium);
        assert!((labs[1].calcium.unwrap() - 2.3 * 4.008).abs() < 1e-12);
        assert_eq!(labs[2], BaselineLabs::default());
    }
}
