//! DataFrame to typed record conversion.
//!
//! Each converter walks the frame in row order. Rows without a patient code
//! cannot be keyed and are dropped with a warning; every other malformed
//! cell simply becomes `None`.

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use renal_model::{
    EventRecord, LabRecord, MedicationRecord, OxfordScores, PatientKey, PatientRecord, Sex,
    VariantRecord, VisitRecord,
};

use crate::csv_table::has_column;
use crate::parse::{parse_date, parse_number, parse_year};
use crate::polars_utils::column_strings;
use crate::tables::TableKind;

const OXFORD_COLUMNS: [&str; 5] = ["oxford_m", "oxford_e", "oxford_s", "oxford_t", "oxford_c"];

fn numbers(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    column_strings(df, name)
        .into_iter()
        .map(|value| value.as_deref().and_then(parse_number))
        .collect()
}

fn dates(df: &DataFrame, name: &str) -> Vec<Option<NaiveDate>> {
    column_strings(df, name)
        .into_iter()
        .map(|value| value.as_deref().and_then(parse_date))
        .collect()
}

fn whole_numbers(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
    numbers(df, name)
        .into_iter()
        .map(|value| value.map(|v| v.trunc() as i64))
        .collect()
}

/// Patient keys per row; `None` where the patient code is blank.
fn row_keys(df: &DataFrame, table: TableKind) -> Vec<Option<PatientKey>> {
    let centers = column_strings(df, "center_code");
    let patients = column_strings(df, "patient_code");
    let keys: Vec<Option<PatientKey>> = centers
        .into_iter()
        .zip(patients)
        .map(|(center, patient)| {
            PatientKey::new(center.unwrap_or_default(), patient.unwrap_or_default()).ok()
        })
        .collect();
    let skipped = keys.iter().filter(|key| key.is_none()).count();
    if skipped > 0 {
        tracing::warn!(
            table = %table,
            rows = skipped,
            "rows with blank patient_code skipped"
        );
    }
    keys
}

pub fn patient_records(df: &DataFrame) -> Vec<PatientRecord> {
    let keys = row_keys(df, TableKind::Patients);
    let modules = column_strings(df, "module");
    let sexes = column_strings(df, "sex");
    let birth_years = column_strings(df, "birth_year");
    let baseline_dates = dates(df, "baseline_date");
    let baseline_scr = numbers(df, "baseline_scr");
    let baseline_upcr = numbers(df, "baseline_upcr");

    let oxford = if OXFORD_COLUMNS.iter().all(|c| has_column(df, c)) {
        let [m, e, s, t, c] = OXFORD_COLUMNS.map(|name| whole_numbers(df, name));
        Some((m, e, s, t, c))
    } else {
        None
    };

    let mut invalid_sex = 0usize;
    let mut records = Vec::with_capacity(df.height());
    for (idx, key) in keys.into_iter().enumerate() {
        let Some(key) = key else { continue };
        let sex = sexes[idx].as_deref().and_then(|raw| match raw.parse::<Sex>() {
            Ok(sex) => Some(sex),
            Err(_) => {
                invalid_sex += 1;
                None
            }
        });
        let mut record = PatientRecord::new(key, modules[idx].clone().unwrap_or_default());
        record.sex = sex;
        record.birth_year = birth_years[idx].as_deref().and_then(parse_year);
        record.baseline_date = baseline_dates[idx];
        record.baseline_scr = baseline_scr[idx];
        record.baseline_upcr = baseline_upcr[idx];
        record.oxford = oxford.as_ref().map(|(m, e, s, t, c)| OxfordScores {
            m: m[idx],
            e: e[idx],
            s: s[idx],
            t: t[idx],
            c: c[idx],
        });
        records.push(record);
    }
    if invalid_sex > 0 {
        tracing::warn!(rows = invalid_sex, "sex values other than M/F treated as missing");
    }
    records
}

pub fn visit_records(df: &DataFrame) -> Vec<VisitRecord> {
    let keys = row_keys(df, TableKind::Visits);
    let modules = column_strings(df, "module");
    let visit_dates = dates(df, "visit_date");
    let sbp = numbers(df, "sbp");
    let dbp = numbers(df, "dbp");
    let scr = numbers(df, "scr_umol_l");
    let upcr = numbers(df, "upcr");
    let egfr = numbers(df, "egfr");

    keys.into_iter()
        .enumerate()
        .filter_map(|(idx, key)| {
            let mut visit = VisitRecord::new(key?, visit_dates[idx]);
            visit.module = modules[idx].clone().unwrap_or_default();
            visit.sbp = sbp[idx];
            visit.dbp = dbp[idx];
            visit.scr_umol_l = scr[idx];
            visit.upcr = upcr[idx];
            visit.egfr = egfr[idx];
            Some(visit)
        })
        .collect()
}

pub fn lab_records(df: &DataFrame) -> Vec<LabRecord> {
    let keys = row_keys(df, TableKind::Labs);
    let lab_dates = dates(df, "lab_date");
    let names = column_strings(df, "lab_name");
    let values = numbers(df, "lab_value");
    let units = column_strings(df, "lab_unit");

    keys.into_iter()
        .enumerate()
        .filter_map(|(idx, key)| {
            Some(LabRecord {
                key: key?,
                lab_date: lab_dates[idx],
                lab_name: names[idx].clone().unwrap_or_default(),
                lab_value: values[idx],
                lab_unit: units[idx].clone(),
            })
        })
        .collect()
}

pub fn medication_records(df: &DataFrame) -> Vec<MedicationRecord> {
    let keys = row_keys(df, TableKind::Medications);
    let names = column_strings(df, "drug_name");
    let classes = column_strings(df, "drug_class");
    let starts = dates(df, "start_date");
    let ends = dates(df, "end_date");

    keys.into_iter()
        .enumerate()
        .filter_map(|(idx, key)| {
            Some(MedicationRecord {
                key: key?,
                drug_name: names[idx].clone(),
                drug_class: classes[idx].clone(),
                start_date: starts[idx],
                end_date: ends[idx],
            })
        })
        .collect()
}

pub fn variant_records(df: &DataFrame) -> Vec<VariantRecord> {
    let keys = row_keys(df, TableKind::Variants);
    let genes = column_strings(df, "gene");
    let variants = column_strings(df, "variant");

    keys.into_iter()
        .enumerate()
        .filter_map(|(idx, key)| {
            Some(VariantRecord {
                key: key?,
                gene: genes[idx].clone(),
                variant: variants[idx].clone(),
            })
        })
        .collect()
}

/// Events without an event type cannot become a `manual_<type>` column and
/// are dropped.
pub fn event_records(df: &DataFrame) -> Vec<EventRecord> {
    let keys = row_keys(df, TableKind::Events);
    let types = column_strings(df, "event_type");
    let event_dates = dates(df, "event_date");

    keys.into_iter()
        .enumerate()
        .filter_map(|(idx, key)| {
            Some(EventRecord {
                key: key?,
                event_type: types[idx].clone()?,
                event_date: event_dates[idx],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{Column, NamedFrom};

    fn test_df(columns: &[(&str, &[&str])]) -> DataFrame {
        let cols = columns
            .iter()
            .map(|(name, values)| {
                let values: Vec<Option<&str>> = values
                    .iter()
                    .map(|v| if v.is_empty() { None } else { Some(*v) })
                    .collect();
                Column::new((*name).into(), values)
            })
            .collect();
        DataFrame::new(cols).unwrap()
    }

    #[test]
    fn test_patient_records_parse_types() {
        let df = test_df(&[
            ("center_code", &["C1", "C1", "C2"]),
            ("module", &["IGAN", "IGAN", "FSGS"]),
            ("patient_code", &["P1", "", "P3"]),
            ("sex", &["f", "M", "unknown"]),
            ("birth_year", &["1970", "1980", "x"]),
            ("baseline_date", &["2020-01-15", "", "2021/06/01"]),
            ("baseline_scr", &["88.4", "", "120"]),
            ("baseline_upcr", &["", "500", "1200.5"]),
        ]);
        let records = patient_records(&df);

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.key.patient_code(), "P1");
        assert_eq!(first.sex, Some(Sex::Female));
        assert_eq!(first.birth_year, Some(1970));
        assert_eq!(first.baseline_date, NaiveDate::from_ymd_opt(2020, 1, 15));
        assert_eq!(first.baseline_scr, Some(88.4));
        assert_eq!(first.baseline_upcr, None);
        assert!(first.oxford.is_none());

        let second = &records[1];
        assert_eq!(second.key.center_code(), "C2");
        assert_eq!(second.sex, None);
        assert_eq!(second.birth_year, None);
        assert_eq!(second.baseline_upcr, Some(1200.5));
    }

    #[test]
    fn test_oxford_scores_need_all_columns() {
        let df = test_df(&[
            ("center_code", &["C1"]),
            ("module", &["IGAN"]),
            ("patient_code", &["P1"]),
            ("oxford_m", &["1"]),
            ("oxford_e", &["0"]),
            ("oxford_s", &["1"]),
            ("oxford_t", &["2"]),
            ("oxford_c", &[""]),
        ]);
        let records = patient_records(&df);
        let oxford = records[0].oxford.clone().unwrap();
        assert_eq!(oxford.t, Some(2));
        assert_eq!(oxford.c, None);
    }

    #[test]
    fn test_visit_records_keep_order_and_nulls() {
        let df = test_df(&[
            ("center_code", &["C1", "C1"]),
            ("module", &["IGAN", "IGAN"]),
            ("patient_code", &["P1", "P1"]),
            ("visit_date", &["2020-03-01", "bad"]),
            ("egfr", &["55.5", ""]),
        ]);
        let visits = visit_records(&df);

        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].egfr, Some(55.5));
        assert_eq!(visits[0].sbp, None);
        assert_eq!(visits[1].visit_date, None);
    }

    #[test]
    fn test_event_records_drop_untyped() {
        let df = test_df(&[
            ("center_code", &["C1", "C1"]),
            ("module", &["IGAN", "IGAN"]),
            ("patient_code", &["P1", "P1"]),
            ("event_type", &["dialysis", ""]),
            ("event_date", &["2022-01-01", "2022-02-01"]),
        ]);
        let events = event_records(&df);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "dialysis");
    }
}
