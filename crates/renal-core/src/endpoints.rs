//! First-crossing endpoint detection over per-patient timelines.
//!
//! A single qualifying visit is enough to reach an endpoint; no confirmation
//! at a later visit is required. Each threshold is scanned independently.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use renal_model::{AnalysisOptions, PatientKey, is_igan_module};
use serde::Serialize;

use crate::timeline::{TimelineRow, rows_by_patient};

/// Date and elapsed days of the first qualifying visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndpointHit {
    pub date: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclineEndpoint {
    pub key: PatientKey,
    pub decline_40pct: Option<EndpointHit>,
    pub decline_57pct: Option<EndpointHit>,
    /// Earliest date per manually recorded event type.
    pub manual_events: BTreeMap<String, NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemissionEndpoint {
    pub key: PatientKey,
    pub complete: Option<EndpointHit>,
    pub partial: Option<EndpointHit>,
}

fn first_crossing(
    rows: &[&TimelineRow],
    qualifies: impl Fn(&TimelineRow) -> bool,
) -> Option<EndpointHit> {
    rows.iter().copied().find(|&row| qualifies(row)).map(|row| EndpointHit {
        date: row.visit_date,
        days: row.days_from_baseline,
    })
}

/// eGFR decline endpoints for every patient with at least one visit eGFR and
/// a positive baseline eGFR, ordered by patient key.
pub fn detect_egfr_decline(
    timeline: &[TimelineRow],
    options: &AnalysisOptions,
) -> Vec<DeclineEndpoint> {
    let evaluable = timeline.iter().filter(|row| row.pct_of_baseline().is_some());
    let endpoints: Vec<DeclineEndpoint> = rows_by_patient(evaluable)
        .into_iter()
        .map(|(key, rows)| {
            let below = |threshold: f64| {
                move |row: &TimelineRow| row.pct_of_baseline().is_some_and(|r| r < threshold)
            };
            DeclineEndpoint {
                key: key.clone(),
                decline_40pct: first_crossing(&rows, below(options.decline_40_ratio)),
                decline_57pct: first_crossing(&rows, below(options.decline_57_ratio)),
                manual_events: BTreeMap::new(),
            }
        })
        .collect();

    tracing::info!(
        patients = endpoints.len(),
        reached_40pct = endpoints.iter().filter(|e| e.decline_40pct.is_some()).count(),
        reached_57pct = endpoints.iter().filter(|e| e.decline_57pct.is_some()).count(),
        "eGFR decline endpoints"
    );
    endpoints
}

/// Complete and partial remission for IgA nephropathy patients with at least
/// one visit UPCR, ordered by patient key.
pub fn detect_igan_remission(
    timeline: &[TimelineRow],
    options: &AnalysisOptions,
) -> Vec<RemissionEndpoint> {
    let evaluable = timeline
        .iter()
        .filter(|row| is_igan_module(&row.module) && row.upcr.is_some());
    let endpoints: Vec<RemissionEndpoint> = rows_by_patient(evaluable)
        .into_iter()
        .map(|(key, rows)| {
            let complete = first_crossing(&rows, |row| {
                row.upcr.is_some_and(|u| u < options.complete_remission_upcr)
            });
            let partial = rows[0]
                .baseline_upcr
                .filter(|b| *b > 0.0)
                .and_then(|baseline| {
                    let target = baseline * options.partial_remission_fraction;
                    first_crossing(&rows, |row| {
                        row.upcr.is_some_and(|u| {
                            u <= target && u < options.partial_remission_ceiling
                        })
                    })
                });
            RemissionEndpoint {
                key: key.clone(),
                complete,
                partial,
            }
        })
        .collect();

    tracing::info!(
        patients = endpoints.len(),
        complete = endpoints.iter().filter(|e| e.complete.is_some()).count(),
        partial = endpoints.iter().filter(|e| e.partial.is_some()).count(),
        "IgAN remission endpoints"
    );
    endpoints
}

/// Copies each patient's earliest manual event dates onto their decline row.
pub fn attach_manual_events(
    endpoints: &mut [DeclineEndpoint],
    events: &BTreeMap<PatientKey, BTreeMap<String, NaiveDate>>,
) {
    for endpoint in endpoints {
        if let Some(found) = events.get(&endpoint.key) {
            endpoint.manual_events = found.clone();
        }
    }
}
