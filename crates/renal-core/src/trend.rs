//! Monthly cohort trajectories of eGFR and UPCR.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::stats::{mean, sample_sd};
use crate::timeline::TimelineRow;

const DAYS_PER_MONTH: f64 = 30.4;
const Z_95: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendMetric {
    Egfr,
    Upcr,
}

impl TrendMetric {
    pub const ALL: [TrendMetric; 2] = [TrendMetric::Egfr, TrendMetric::Upcr];

    pub fn name(self) -> &'static str {
        match self {
            TrendMetric::Egfr => "egfr",
            TrendMetric::Upcr => "upcr",
        }
    }

    fn value(self, row: &TimelineRow) -> Option<f64> {
        match self {
            TrendMetric::Egfr => row.egfr,
            TrendMetric::Upcr => row.upcr,
        }
    }
}

impl fmt::Display for TrendMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Summary of one month bucket. Spread fields need two or more values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: i64,
    pub mean: f64,
    pub count: usize,
    pub sd: Option<f64>,
    pub se: Option<f64>,
    pub ci_low: Option<f64>,
    pub ci_high: Option<f64>,
}

/// Month bucket of an elapsed-day count, rounding half to even.
pub fn month_of(days_from_baseline: i64) -> i64 {
    (days_from_baseline as f64 / DAYS_PER_MONTH).round_ties_even() as i64
}

/// Per-month mean with a normal 95% band, ordered by month.
pub fn trend_summary(timeline: &[TimelineRow], metric: TrendMetric) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for row in timeline {
        if let Some(value) = metric.value(row).filter(|v| v.is_finite()) {
            buckets
                .entry(month_of(row.days_from_baseline))
                .or_default()
                .push(value);
        }
    }

    buckets
        .into_iter()
        .filter_map(|(month, values)| {
            let mean = mean(&values)?;
            let sd = sample_sd(&values);
            let se = sd.map(|sd| sd / (values.len().max(1) as f64).sqrt());
            Some(TrendPoint {
                month,
                mean,
                count: values.len(),
                sd,
                se,
                ci_low: se.map(|se| mean - Z_95 * se),
                ci_high: se.map(|se| mean + Z_95 * se),
            })
        })
        .collect()
}
