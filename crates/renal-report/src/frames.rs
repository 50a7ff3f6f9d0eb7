//! Conversion of derived tables into Polars DataFrames.
//!
//! Column names are the public output contract. Dates are rendered as
//! `YYYY-MM-DD` text and counts as unsigned integers; missing values stay
//! null and are written as empty CSV cells.

use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame, NamedFrom};

use renal_core::{
    DeclineEndpoint, EndpointHit, KfreRisk, KfreRow, LabCovariate, PatientSlope, PopulationSlope,
    RemissionEndpoint, SlopeEstimate, TrendPoint, TwelveMonthOutcome,
};
use renal_core::stats::round_to;
use renal_ingest::MergeReport;
use renal_model::PatientKey;

use crate::error::Result;
use crate::quality::{CenterQuality, MissingField, QualityReport, VisitDuplicate, VisitOutlier};
use crate::table1::BaselineRow;

pub const SLOPE_NOTE: &str = "eGFR slope in mL/min/1.73m²/year";

fn date_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn count(n: usize) -> u64 {
    n as u64
}

fn pct_text(value: Option<f64>) -> String {
    value.map(|p| format!("{p:.1}%")).unwrap_or_default()
}

fn key_columns<'a>(keys: impl Iterator<Item = &'a PatientKey>) -> [Column; 2] {
    let (centers, patients): (Vec<&str>, Vec<&str>) =
        keys.map(|k| (k.center_code(), k.patient_code())).unzip();
    [
        Column::new("center_code".into(), centers),
        Column::new("patient_code".into(), patients),
    ]
}

/// `reached_*`, `first_date_*` and `days_to_*` columns of one endpoint.
fn hit_columns(label: &str, hits: &[Option<EndpointHit>]) -> [Column; 3] {
    [
        Column::new(
            format!("reached_{label}").into(),
            hits.iter().map(Option::is_some).collect::<Vec<_>>(),
        ),
        Column::new(
            format!("first_date_{label}").into(),
            hits.iter().map(|h| date_text(h.map(|h| h.date))).collect::<Vec<_>>(),
        ),
        Column::new(
            format!("days_to_{label}").into(),
            hits.iter().map(|h| h.map(|h| h.days)).collect::<Vec<_>>(),
        ),
    ]
}

pub fn baseline_frame(rows: &[BaselineRow]) -> Result<DataFrame> {
    let column = |name: &str, get: fn(&BaselineRow) -> &str| {
        Column::new(name.into(), rows.iter().map(get).collect::<Vec<_>>())
    };
    Ok(DataFrame::new(vec![
        column("Variable", |r| &r.variable),
        column("Value", |r| &r.value),
        column("Notes", |r| &r.notes),
    ])?)
}

pub fn missingness_frame(fields: &[MissingField]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(
            "Field".into(),
            fields.iter().map(|f| f.field).collect::<Vec<_>>(),
        ),
        Column::new(
            "Missing_n".into(),
            fields.iter().map(|f| count(f.missing_n)).collect::<Vec<_>>(),
        ),
        Column::new(
            "Missing_%".into(),
            fields.iter().map(|f| pct_text(f.missing_pct)).collect::<Vec<_>>(),
        ),
    ])?)
}

pub fn visit_duplicates_frame(duplicates: &[VisitDuplicate]) -> Result<DataFrame> {
    let mut columns = Vec::from(key_columns(duplicates.iter().map(|d| &d.key)));
    columns.push(Column::new(
        "visit_date".into(),
        duplicates
            .iter()
            .map(|d| date_text(Some(d.visit_date)))
            .collect::<Vec<_>>(),
    ));
    columns.push(Column::new(
        "n".into(),
        duplicates.iter().map(|d| count(d.n)).collect::<Vec<_>>(),
    ));
    Ok(DataFrame::new(columns)?)
}

pub fn outliers_frame(outliers: &[VisitOutlier]) -> Result<DataFrame> {
    let value = |name: &str, get: fn(&VisitOutlier) -> Option<f64>| {
        Column::new(name.into(), outliers.iter().map(get).collect::<Vec<_>>())
    };
    let mut columns = Vec::from(key_columns(outliers.iter().map(|o| &o.key)));
    columns.extend([
        Column::new(
            "visit_date".into(),
            outliers.iter().map(|o| date_text(o.visit_date)).collect::<Vec<_>>(),
        ),
        value("sbp", |o| o.sbp),
        value("dbp", |o| o.dbp),
        value("scr_umol_l", |o| o.scr_umol_l),
        value("upcr", |o| o.upcr),
        Column::new(
            "reasons".into(),
            outliers.iter().map(|o| o.reasons.as_str()).collect::<Vec<_>>(),
        ),
    ]);
    Ok(DataFrame::new(columns)?)
}

pub fn center_quality_frame(centers: &[CenterQuality]) -> Result<DataFrame> {
    let counts = |name: &str, get: fn(&CenterQuality) -> usize| {
        Column::new(
            name.into(),
            centers.iter().map(|c| count(get(c))).collect::<Vec<_>>(),
        )
    };
    let pcts = |name: &str, get: fn(&CenterQuality) -> Option<f64>| {
        Column::new(name.into(), centers.iter().map(get).collect::<Vec<_>>())
    };
    Ok(DataFrame::new(vec![
        Column::new(
            "center_code".into(),
            centers.iter().map(|c| c.center_code.as_str()).collect::<Vec<_>>(),
        ),
        counts("visits_n", |c| c.visits_n),
        counts("patients_n", |c| c.patients_n),
        counts("miss_sbp", |c| c.miss_sbp),
        counts("miss_scr", |c| c.miss_scr),
        counts("miss_upcr", |c| c.miss_upcr),
        pcts("miss_sbp_%", CenterQuality::miss_sbp_pct),
        pcts("miss_scr_%", CenterQuality::miss_scr_pct),
        pcts("miss_upcr_%", CenterQuality::miss_upcr_pct),
    ])?)
}

/// The four QC sheets, by output file stem.
pub fn quality_frames(report: &QualityReport) -> Result<[(&'static str, DataFrame); 4]> {
    Ok([
        ("qc_missingness", missingness_frame(&report.missingness)?),
        ("qc_duplicates", visit_duplicates_frame(&report.duplicates)?),
        ("qc_outliers", outliers_frame(&report.outliers)?),
        ("qc_center_summary", center_quality_frame(&report.centers)?),
    ])
}

pub fn outcomes_frame(outcomes: &[TwelveMonthOutcome]) -> Result<DataFrame> {
    let value = |name: &str, get: fn(&TwelveMonthOutcome) -> Option<f64>| {
        Column::new(name.into(), outcomes.iter().map(get).collect::<Vec<_>>())
    };
    let mut columns = Vec::from(key_columns(outcomes.iter().map(|o| &o.key)));
    columns.extend([
        Column::new(
            "baseline_date".into(),
            outcomes
                .iter()
                .map(|o| date_text(Some(o.baseline_date)))
                .collect::<Vec<_>>(),
        ),
        value("egfr_baseline", |o| o.egfr_baseline),
        value("upcr_baseline", |o| o.upcr_baseline),
        Column::new(
            "visit_12m_date".into(),
            outcomes
                .iter()
                .map(|o| date_text(o.visit.as_ref().map(|v| v.date)))
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "days_from_baseline".into(),
            outcomes
                .iter()
                .map(|o| o.visit.as_ref().map(|v| v.days_from_baseline))
                .collect::<Vec<_>>(),
        ),
        value("egfr_12m", |o| o.visit.as_ref()?.egfr),
        value("upcr_12m", |o| o.visit.as_ref()?.upcr),
        value("scr_12m_umol_l", |o| o.visit.as_ref()?.scr_umol_l),
        value("egfr_delta", TwelveMonthOutcome::egfr_delta),
        value("upcr_delta", TwelveMonthOutcome::upcr_delta),
    ]);
    Ok(DataFrame::new(columns)?)
}

/// Decline endpoints plus one `manual_<type>` date column per event type.
pub fn decline_frame(endpoints: &[DeclineEndpoint], event_types: &[String]) -> Result<DataFrame> {
    let mut columns = Vec::from(key_columns(endpoints.iter().map(|e| &e.key)));
    let hits_40: Vec<_> = endpoints.iter().map(|e| e.decline_40pct).collect();
    let hits_57: Vec<_> = endpoints.iter().map(|e| e.decline_57pct).collect();
    columns.extend(hit_columns("40pct", &hits_40));
    columns.extend(hit_columns("57pct", &hits_57));
    for event_type in event_types {
        columns.push(Column::new(
            format!("manual_{event_type}").into(),
            endpoints
                .iter()
                .map(|e| date_text(e.manual_events.get(event_type).copied()))
                .collect::<Vec<_>>(),
        ));
    }
    Ok(DataFrame::new(columns)?)
}

pub fn remission_frame(endpoints: &[RemissionEndpoint]) -> Result<DataFrame> {
    let mut columns = Vec::from(key_columns(endpoints.iter().map(|e| &e.key)));
    let complete: Vec<_> = endpoints.iter().map(|e| e.complete).collect();
    let partial: Vec<_> = endpoints.iter().map(|e| e.partial).collect();
    columns.extend(hit_columns("cr", &complete));
    columns.extend(hit_columns("pr", &partial));
    Ok(DataFrame::new(columns)?)
}

fn risk_pct(risk: Option<KfreRisk>, five_year: bool) -> Option<f64> {
    risk.map(|r| {
        let proportion = if five_year { r.risk_5yr } else { r.risk_2yr };
        round_to(proportion * 100.0, 1)
    })
}

pub fn kfre_frame(rows: &[KfreRow]) -> Result<DataFrame> {
    let value = |name: &str, get: fn(&KfreRow) -> Option<f64>| {
        Column::new(name.into(), rows.iter().map(get).collect::<Vec<_>>())
    };
    let mut columns = Vec::from(key_columns(rows.iter().map(|r| &r.key)));
    columns.extend([
        Column::new(
            "age_baseline".into(),
            rows.iter().map(|r| r.age.map(i64::from)).collect::<Vec<_>>(),
        ),
        Column::new(
            "sex".into(),
            rows.iter().map(|r| r.sex.map(|s| s.code())).collect::<Vec<_>>(),
        ),
        value("baseline_egfr", |r| r.baseline_egfr),
        value("baseline_upcr", |r| r.baseline_upcr),
        value("kfre4_2yr_pct", |r| risk_pct(r.kfre4, false)),
        value("kfre4_5yr_pct", |r| risk_pct(r.kfre4, true)),
        value("lab_albumin", |r| r.labs.get(LabCovariate::Albumin)),
        value("lab_phosphate", |r| r.labs.get(LabCovariate::Phosphate)),
        value("lab_bicarbonate", |r| r.labs.get(LabCovariate::Bicarbonate)),
        value("lab_calcium", |r| r.labs.get(LabCovariate::Calcium)),
        value("kfre8_2yr_pct", |r| risk_pct(r.kfre8, false)),
        value("kfre8_5yr_pct", |r| risk_pct(r.kfre8, true)),
    ]);
    Ok(DataFrame::new(columns)?)
}

pub fn trend_frame(points: &[TrendPoint]) -> Result<DataFrame> {
    let value = |name: &str, get: fn(&TrendPoint) -> Option<f64>| {
        Column::new(name.into(), points.iter().map(get).collect::<Vec<_>>())
    };
    Ok(DataFrame::new(vec![
        Column::new(
            "month".into(),
            points.iter().map(|p| p.month).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean".into(),
            points.iter().map(|p| p.mean).collect::<Vec<_>>(),
        ),
        Column::new(
            "count".into(),
            points.iter().map(|p| count(p.count)).collect::<Vec<_>>(),
        ),
        value("sd", |p| p.sd),
        value("se", |p| p.se),
        value("ci_low", |p| p.ci_low),
        value("ci_high", |p| p.ci_high),
    ])?)
}

/// Single-row population slope table; estimate cells are blank unless the
/// mixed model produced them.
pub fn population_slope_frame(slope: &PopulationSlope) -> Result<DataFrame> {
    let estimate = slope.estimate.as_ref();
    let text = |f: fn(f64) -> String, get: fn(&SlopeEstimate) -> f64| {
        vec![estimate.map(|e| f(get(e))).unwrap_or_default()]
    };
    let two: fn(f64) -> String = |v| format!("{v:.2}");
    let four: fn(f64) -> String = |v| format!("{v:.4}");
    Ok(DataFrame::new(vec![
        Column::new("method".into(), vec![slope.method.label()]),
        Column::new("eGFR_slope_mL_yr".into(), text(two, |e| e.slope)),
        Column::new("95CI_lower".into(), text(two, |e| e.ci_lower)),
        Column::new("95CI_upper".into(), text(two, |e| e.ci_upper)),
        Column::new("p_value".into(), text(four, |e| e.p_value)),
        Column::new("n_patients".into(), vec![count(slope.n_patients)]),
        Column::new("n_observations".into(), vec![count(slope.n_observations)]),
        Column::new(
            "note".into(),
            vec![estimate.map(|_| SLOPE_NOTE).unwrap_or_default()],
        ),
    ])?)
}

pub fn patient_slopes_frame(slopes: &[PatientSlope]) -> Result<DataFrame> {
    let value = |name: &str, get: fn(&PatientSlope) -> f64| {
        Column::new(name.into(), slopes.iter().map(get).collect::<Vec<_>>())
    };
    let mut columns = Vec::from(key_columns(slopes.iter().map(|s| &s.key)));
    columns.extend([
        value("slope_mL_yr", |s| s.slope),
        value("intercept_egfr", |s| s.intercept),
        Column::new(
            "n_visits_used".into(),
            slopes.iter().map(|s| count(s.n_visits)).collect::<Vec<_>>(),
        ),
        value("follow_up_yr", |s| s.follow_up_yr),
    ]);
    Ok(DataFrame::new(columns)?)
}

fn status_frame(message: &str) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![Column::new(
        "status".into(),
        vec![message],
    )])?)
}

/// Merge QC sheets, by output file stem. Empty findings become a status row.
pub fn merge_qc_frames(report: &MergeReport) -> Result<Vec<(&'static str, DataFrame)>> {
    let centers = DataFrame::new(vec![
        Column::new(
            "directory".into(),
            report
                .centers
                .iter()
                .map(|c| c.directory.display().to_string())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "center_code".into(),
            report
                .centers
                .iter()
                .map(|c| c.center_code.as_str())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "patients_n".into(),
            report.centers.iter().map(|c| count(c.patients_n)).collect::<Vec<_>>(),
        ),
        Column::new(
            "visits_n".into(),
            report.centers.iter().map(|c| count(c.visits_n)).collect::<Vec<_>>(),
        ),
    ])?;

    let warnings = if report.warnings.is_empty() {
        status_frame("No warnings")?
    } else {
        DataFrame::new(vec![Column::new(
            "message".into(),
            report.warnings.clone(),
        )])?
    };

    let duplicates = if report.duplicates.is_empty() {
        status_frame("No duplicates found")?
    } else {
        DataFrame::new(vec![
            Column::new(
                "table".into(),
                report
                    .duplicates
                    .iter()
                    .map(|d| d.table.name())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "key".into(),
                report
                    .duplicates
                    .iter()
                    .map(|d| {
                        d.key
                            .iter()
                            .map(|(column, value)| format!("{column}={value}"))
                            .collect::<Vec<_>>()
                            .join("; ")
                    })
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "duplicate_rows".into(),
                report
                    .duplicates
                    .iter()
                    .map(|d| count(d.duplicate_rows))
                    .collect::<Vec<_>>(),
            ),
        ])?
    };

    let collisions = if report.collisions.is_empty() {
        status_frame("No cross-center patient_code collisions found")?
    } else {
        DataFrame::new(vec![
            Column::new(
                "patient_code".into(),
                report
                    .collisions
                    .iter()
                    .map(|c| c.patient_code.as_str())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "n_centers".into(),
                report
                    .collisions
                    .iter()
                    .map(|c| count(c.n_centers()))
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "center_codes".into(),
                report
                    .collisions
                    .iter()
                    .map(|c| c.center_codes.join(", "))
                    .collect::<Vec<_>>(),
            ),
        ])?
    };

    let row_counts = DataFrame::new(vec![
        Column::new(
            "table".into(),
            report
                .row_counts
                .iter()
                .map(|(table, _)| table.name())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "rows_merged".into(),
            report
                .row_counts
                .iter()
                .map(|(_, n)| count(*n))
                .collect::<Vec<_>>(),
        ),
    ])?;

    Ok(vec![
        ("merge_center_summary", centers),
        ("merge_warnings", warnings),
        ("merge_duplicates", duplicates),
        ("merge_patient_collisions", collisions),
        ("merge_row_counts", row_counts),
    ])
}
