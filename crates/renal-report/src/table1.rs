//! Baseline characteristics (Table 1).
//!
//! Rows are `(variable, value, notes)` text triples in a fixed order:
//! demographics, Oxford MEST-C, medications, KFRE, IgAN remission and eGFR
//! decline. Optional sections are left out when their source is empty.

use std::collections::{BTreeMap, BTreeSet};

use renal_core::stats::{iqr, mean, median, percent, present, sample_sd};
use renal_core::{AnalysisResult, KfreRisk};
use renal_model::{PatientKey, RegistryDataset, Sex, is_igan_module};
use serde::Serialize;

const TOP_MEDICATIONS: usize = 10;
const KFRE_HIGH_RISK: f64 = 0.40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaselineRow {
    pub variable: String,
    pub value: String,
    pub notes: String,
}

impl BaselineRow {
    fn new(variable: impl Into<String>, value: String, notes: String) -> Self {
        Self {
            variable: variable.into(),
            value,
            notes,
        }
    }

    fn count(variable: impl Into<String>, n: usize) -> Self {
        Self::new(variable, n.to_string(), String::new())
    }

    fn count_pct(variable: impl Into<String>, n: usize, denominator: usize) -> Self {
        Self::new(variable, n.to_string(), pct_note(n, denominator))
    }

    fn section(title: &str, notes: &str) -> Self {
        Self::new(title, String::new(), notes.to_string())
    }
}

fn fmt_f(value: Option<f64>, decimals: usize) -> String {
    value
        .filter(|v| v.is_finite())
        .map(|v| format!("{v:.decimals$}"))
        .unwrap_or_default()
}

fn fmt_iqr(values: &[f64], decimals: usize, scale: f64) -> String {
    iqr(values)
        .map(|(q1, q3)| format!("{:.decimals$}–{:.decimals$}", q1 * scale, q3 * scale))
        .unwrap_or_default()
}

fn pct_note(n: usize, denominator: usize) -> String {
    percent(n, denominator)
        .map(|p| format!("{p:.1}%"))
        .unwrap_or_default()
}

/// Mean (SD) and median (IQR) row pair.
fn distribution_rows(
    mean_label: &str,
    median_label: &str,
    values: &[f64],
    decimals: usize,
) -> [BaselineRow; 2] {
    [
        BaselineRow::new(
            mean_label,
            fmt_f(mean(values), decimals),
            fmt_f(sample_sd(values), decimals),
        ),
        BaselineRow::new(
            median_label,
            fmt_f(median(values), decimals),
            fmt_iqr(values, decimals, 1.0),
        ),
    ]
}

fn demographic_rows(dataset: &RegistryDataset, result: &AnalysisResult) -> Vec<BaselineRow> {
    let n_patients = dataset.patients.len();
    let female = dataset
        .patients
        .iter()
        .filter(|p| p.sex == Some(Sex::Female))
        .count();
    let male = dataset
        .patients
        .iter()
        .filter(|p| p.sex == Some(Sex::Male))
        .count();
    let ages: Vec<f64> = result
        .anchors
        .iter()
        .filter_map(|a| a.age.map(f64::from))
        .collect();
    let egfr = present(
        &result
            .anchors
            .iter()
            .map(|a| a.baseline_egfr)
            .collect::<Vec<_>>(),
    );
    let upcr = present(
        &result
            .anchors
            .iter()
            .map(|a| a.baseline_upcr)
            .collect::<Vec<_>>(),
    );

    let mut rows = vec![
        BaselineRow::count("Patients, n", n_patients),
        BaselineRow::count("Centers, n", dataset.center_count()),
        BaselineRow::count_pct("Female, n (%)", female, n_patients),
        BaselineRow::count_pct("Male, n (%)", male, n_patients),
    ];
    rows.extend(distribution_rows(
        "Age at baseline, mean (SD)",
        "Age at baseline, median (IQR)",
        &ages,
        1,
    ));
    rows.extend(distribution_rows(
        "Baseline eGFR (mL/min/1.73m²), mean (SD)",
        "Baseline eGFR, median (IQR)",
        &egfr,
        1,
    ));
    rows.push(BaselineRow::new(
        "Baseline UPCR, median (IQR)",
        fmt_f(median(&upcr), 2),
        fmt_iqr(&upcr, 2, 1.0),
    ));
    rows
}

fn oxford_rows(dataset: &RegistryDataset) -> Vec<BaselineRow> {
    let n_patients = dataset.patients.len();
    let scored: Vec<_> = dataset
        .patients
        .iter()
        .filter_map(|p| p.oxford.as_ref())
        .collect();
    if scored.is_empty() {
        return Vec::new();
    }

    let mut rows = Vec::new();
    for slot in 0..5 {
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        let mut label = "";
        for scores in &scored {
            let (name, value) = scores.labelled()[slot];
            label = name;
            if let Some(value) = value {
                *counts.entry(value).or_default() += 1;
            }
        }
        for (value, n) in counts {
            rows.push(BaselineRow::count_pct(
                format!("Oxford {label}={value}, n (%)"),
                n,
                n_patients,
            ));
        }
    }
    rows
}

/// Distinct patients per name, most frequent first, ties by name.
fn ranked_by_patients<'a>(
    entries: impl Iterator<Item = (&'a str, &'a PatientKey)>,
) -> Vec<(&'a str, usize)> {
    let mut patients: BTreeMap<&str, BTreeSet<&PatientKey>> = BTreeMap::new();
    for (name, key) in entries {
        patients.entry(name).or_default().insert(key);
    }
    let mut ranked: Vec<(&str, usize)> = patients
        .into_iter()
        .map(|(name, keys)| (name, keys.len()))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(TOP_MEDICATIONS);
    ranked
}

fn medication_rows(dataset: &RegistryDataset) -> Vec<BaselineRow> {
    let meds = &dataset.medications;
    if meds.is_empty() {
        return Vec::new();
    }
    let n_patients = dataset.patients.len();
    let any = meds.iter().map(|m| &m.key).collect::<BTreeSet<_>>().len();

    let mut rows = vec![
        BaselineRow::section("--- Medications (meds_long) ---", ""),
        BaselineRow::count_pct("Patients with any medication recorded, n (%)", any, n_patients),
    ];
    let classes = meds
        .iter()
        .filter_map(|m| Some((m.drug_class.as_deref()?, &m.key)));
    for (class, n) in ranked_by_patients(classes) {
        rows.push(BaselineRow::count_pct(format!("  {class}, n (%)"), n, n_patients));
    }

    let missing_class = meds.iter().filter(|m| m.drug_class.is_none()).count();
    if missing_class * 2 > meds.len() {
        let names = meds
            .iter()
            .filter_map(|m| Some((m.drug_name.as_deref()?, &m.key)));
        for (name, n) in ranked_by_patients(names) {
            rows.push(BaselineRow::count_pct(
                format!("  {name} (drug), n (%)"),
                n,
                n_patients,
            ));
        }
    }
    rows
}

fn risk_median_rows(label: &str, values: &[f64]) -> BaselineRow {
    BaselineRow::new(
        label,
        fmt_f(median(values).map(|m| m * 100.0), 1),
        fmt_iqr(values, 1, 100.0),
    )
}

fn kfre_rows(result: &AnalysisResult) -> Vec<BaselineRow> {
    let kfre4: Vec<KfreRisk> = result.kfre.iter().filter_map(|r| r.kfre4).collect();
    if kfre4.is_empty() {
        return Vec::new();
    }
    let risk_2yr: Vec<f64> = kfre4.iter().map(|r| r.risk_2yr).collect();
    let risk_5yr: Vec<f64> = kfre4.iter().map(|r| r.risk_5yr).collect();
    let high_risk = risk_5yr.iter().filter(|r| **r >= KFRE_HIGH_RISK).count();

    let mut rows = vec![
        BaselineRow::section(
            "--- KFRE (4-variable, Tangri 2011) ---",
            "UPCR used as proxy for uACR",
        ),
        BaselineRow::new(
            "Patients with evaluable KFRE-4, n",
            kfre4.len().to_string(),
            "age+sex+eGFR+UPCR required".to_string(),
        ),
        risk_median_rows("KFRE-4 2-year risk, median (IQR) %", &risk_2yr),
        risk_median_rows("KFRE-4 5-year risk, median (IQR) %", &risk_5yr),
        BaselineRow::new(
            "KFRE-4 5-year risk ≥40%, n (%)",
            format!("{high_risk} ({})", pct_note(high_risk, risk_5yr.len())),
            "high-risk threshold".to_string(),
        ),
    ];

    let kfre8_5yr: Vec<f64> = result
        .kfre
        .iter()
        .filter_map(|r| r.kfre8.map(|k| k.risk_5yr))
        .collect();
    if !kfre8_5yr.is_empty() {
        rows.push(BaselineRow::section(
            "--- KFRE (8-variable, Tangri 2011) ---",
            "Requires albumin/phosphate/HCO3/Ca",
        ));
        rows.push(BaselineRow::count(
            "Patients with evaluable KFRE-8, n",
            kfre8_5yr.len(),
        ));
        rows.push(risk_median_rows(
            "KFRE-8 5-year risk, median (IQR) %",
            &kfre8_5yr,
        ));
    }
    rows
}

fn remission_rows(dataset: &RegistryDataset, result: &AnalysisResult) -> Vec<BaselineRow> {
    if result.remission.is_empty() {
        return Vec::new();
    }
    let n_igan = dataset
        .patients
        .iter()
        .filter(|p| is_igan_module(&p.module))
        .count();
    let complete = result.remission.iter().filter(|r| r.complete.is_some()).count();
    let partial = result.remission.iter().filter(|r| r.partial.is_some()).count();
    let denominator = n_igan.max(1);
    vec![
        BaselineRow::section("--- IgAN Remission Endpoints ---", ""),
        BaselineRow::count("IgAN patients analyzed, n", n_igan),
        BaselineRow::count_pct("Complete remission (CR, UPCR<300), n (%)", complete, denominator),
        BaselineRow::count_pct(
            "Partial remission (PR, ≥50% reduction+<1000), n (%)",
            partial,
            denominator,
        ),
    ]
}

fn decline_rows(result: &AnalysisResult) -> Vec<BaselineRow> {
    let evaluable = result.decline.len();
    if evaluable == 0 {
        return Vec::new();
    }
    let reached_40 = result.decline.iter().filter(|d| d.decline_40pct.is_some()).count();
    let reached_57 = result.decline.iter().filter(|d| d.decline_57pct.is_some()).count();
    vec![
        BaselineRow::section("--- eGFR Decline Endpoints (composite) ---", ""),
        BaselineRow::count("Patients with evaluable eGFR (≥1 visit), n", evaluable),
        BaselineRow::count_pct("eGFR decline ≥40%, n (%)", reached_40, evaluable),
        BaselineRow::count_pct("eGFR decline ≥57%, n (%)", reached_57, evaluable),
    ]
}

/// Builds Table 1 from the loaded dataset and its analysis.
pub fn baseline_characteristics(
    dataset: &RegistryDataset,
    result: &AnalysisResult,
) -> Vec<BaselineRow> {
    let mut rows = demographic_rows(dataset, result);
    rows.extend(oxford_rows(dataset));
    rows.extend(medication_rows(dataset));
    rows.extend(kfre_rows(result));
    rows.extend(remission_rows(dataset, result));
    rows.extend(decline_rows(result));
    tracing::debug!(rows = rows.len(), "baseline table built");
    rows
}
