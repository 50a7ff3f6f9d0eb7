//! One struct per registry table row.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{ModelError, PatientKey};

/// Biological sex as recorded in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    /// Registry code ("F" or "M").
    pub fn code(self) -> &'static str {
        match self {
            Sex::Female => "F",
            Sex::Male => "M",
        }
    }

    pub fn is_female(self) -> bool {
        self == Sex::Female
    }
}

impl FromStr for Sex {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("F") {
            Ok(Sex::Female)
        } else if trimmed.eq_ignore_ascii_case("M") {
            Ok(Sex::Male)
        } else {
            Err(ModelError::InvalidSex(trimmed.to_string()))
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Oxford classification (MEST-C) scores from the diagnostic biopsy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OxfordScores {
    pub m: Option<i64>,
    pub e: Option<i64>,
    pub s: Option<i64>,
    pub t: Option<i64>,
    pub c: Option<i64>,
}

impl OxfordScores {
    /// Scores paired with their one-letter labels, in M, E, S, T, C order.
    pub fn labelled(&self) -> [(&'static str, Option<i64>); 5] {
        [
            ("M", self.m),
            ("E", self.e),
            ("S", self.s),
            ("T", self.t),
            ("C", self.c),
        ]
    }
}

/// A row of `patients_baseline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub key: PatientKey,
    pub module: String,
    pub sex: Option<Sex>,
    pub birth_year: Option<i32>,
    pub baseline_date: Option<NaiveDate>,
    /// Serum creatinine at baseline, µmol/L.
    pub baseline_scr: Option<f64>,
    /// Urine protein-to-creatinine ratio at baseline, mg/g.
    pub baseline_upcr: Option<f64>,
    /// Present only when the source table carries all five Oxford columns.
    pub oxford: Option<OxfordScores>,
}

impl PatientRecord {
    pub fn new(key: PatientKey, module: impl Into<String>) -> Self {
        Self {
            key,
            module: module.into(),
            sex: None,
            birth_year: None,
            baseline_date: None,
            baseline_scr: None,
            baseline_upcr: None,
            oxford: None,
        }
    }
}

/// A row of `visits_long`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub key: PatientKey,
    pub module: String,
    pub visit_date: Option<NaiveDate>,
    pub sbp: Option<f64>,
    pub dbp: Option<f64>,
    /// Serum creatinine, µmol/L.
    pub scr_umol_l: Option<f64>,
    pub upcr: Option<f64>,
    pub egfr: Option<f64>,
}

impl VisitRecord {
    pub fn new(key: PatientKey, visit_date: Option<NaiveDate>) -> Self {
        Self {
            key,
            module: String::new(),
            visit_date,
            sbp: None,
            dbp: None,
            scr_umol_l: None,
            upcr: None,
            egfr: None,
        }
    }
}

/// A row of `labs_long`. Lab names are free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabRecord {
    pub key: PatientKey,
    pub lab_date: Option<NaiveDate>,
    pub lab_name: String,
    pub lab_value: Option<f64>,
    pub lab_unit: Option<String>,
}

/// A row of `meds_long`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationRecord {
    pub key: PatientKey,
    pub drug_name: Option<String>,
    pub drug_class: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A row of `variants_long`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub key: PatientKey,
    pub gene: Option<String>,
    pub variant: Option<String>,
}

/// A manually recorded clinical event (`events_long`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub key: PatientKey,
    pub event_type: String,
    pub event_date: Option<NaiveDate>,
}
