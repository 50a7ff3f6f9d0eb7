//! eGFR slope estimation.
//!
//! The population slope comes from a linear mixed model
//! `egfr ~ time_yr + (1 | patient)` fitted by restricted maximum likelihood.
//! With a single random intercept the residual variance profiles out in
//! closed form, leaving a one-dimensional search over the variance ratio
//! `gamma = sigma2_patient / sigma2_residual`. Each group's covariance
//! `sigma2 * (I + gamma * J)` has the explicit inverse
//! `(I - w * J) / sigma2` with `w = gamma / (1 + n * gamma)`, so no matrix
//! factorisation is needed.
//!
//! Every patient with two or more distinct time points also gets an
//! ordinary least-squares line of their own.

use std::collections::BTreeMap;

use renal_model::{AnalysisOptions, MixedModelMode, PatientKey};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{Result, SlopeError};
use crate::stats::round_to;
use crate::timeline::TimelineRow;

/// Golden-section search bounds on `psi = gamma / (1 + gamma)`.
const PSI_UPPER: f64 = 1.0 - 1e-9;
const SEARCH_TOLERANCE: f64 = 1e-12;
const MAX_SEARCH_ITERATIONS: usize = 200;
/// Fixed effects: intercept and time.
const FIXED_EFFECTS: usize = 2;

/// (time in years, eGFR) pairs.
pub type SeriesPoint = (f64, f64);

/// Observations that enter slope estimation: visits with an eGFR at or after
/// the anchor, grouped by patient.
pub fn slope_observations(timeline: &[TimelineRow]) -> BTreeMap<&PatientKey, Vec<SeriesPoint>> {
    let mut groups: BTreeMap<&PatientKey, Vec<SeriesPoint>> = BTreeMap::new();
    for row in timeline {
        let Some(egfr) = row.egfr else { continue };
        if row.time_yr < 0.0 {
            continue;
        }
        groups.entry(&row.key).or_default().push((row.time_yr, egfr));
    }
    groups
}

/// Random-intercept model estimates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixedModelFit {
    pub intercept: f64,
    pub slope: f64,
    pub slope_se: f64,
    pub residual_variance: f64,
    pub patient_variance: f64,
    pub restricted_log_likelihood: f64,
    pub n_patients: usize,
    pub n_observations: usize,
}

impl MixedModelFit {
    /// Wald confidence interval and two-sided p-value for the slope.
    pub fn slope_inference(&self, level: f64) -> Result<SlopeEstimate> {
        let normal =
            Normal::new(0.0, 1.0).map_err(|e| SlopeError::Distribution(e.to_string()))?;
        let critical = normal.inverse_cdf(0.5 + level / 2.0);
        let z = self.slope / self.slope_se;
        Ok(SlopeEstimate {
            slope: self.slope,
            ci_lower: self.slope - critical * self.slope_se,
            ci_upper: self.slope + critical * self.slope_se,
            p_value: 2.0 * normal.sf(z.abs()),
        })
    }
}

/// Profiled restricted likelihood at one variance ratio.
struct Profile {
    log_likelihood: f64,
    intercept: f64,
    slope: f64,
    residual_variance: f64,
    /// Intercept diagonal of X'V^-1 X (scaled by the residual variance).
    a11: f64,
    det: f64,
}

fn profile(groups: &[Vec<SeriesPoint>], gamma: f64) -> Result<Profile> {
    let n_total: usize = groups.iter().map(Vec::len).sum();
    let dof = (n_total - FIXED_EFFECTS) as f64;

    let (mut a11, mut a12, mut a22, mut b1, mut b2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for group in groups {
        let n = group.len() as f64;
        let w = gamma / (1.0 + n * gamma);
        let st: f64 = group.iter().map(|(t, _)| t).sum();
        let sy: f64 = group.iter().map(|(_, y)| y).sum();
        let stt: f64 = group.iter().map(|(t, _)| t * t).sum();
        let sty: f64 = group.iter().map(|(t, y)| t * y).sum();
        a11 += n - w * n * n;
        a12 += st - w * n * st;
        a22 += stt - w * st * st;
        b1 += sy - w * n * sy;
        b2 += sty - w * st * sy;
    }
    let det = a11 * a22 - a12 * a12;
    if !det.is_finite() || det <= 1e-12 * a11 * a22 || det <= 0.0 {
        return Err(SlopeError::SingularDesign);
    }
    let intercept = (a22 * b1 - a12 * b2) / det;
    let slope = (a11 * b2 - a12 * b1) / det;

    let mut quadratic = 0.0;
    let mut log_det_v = 0.0;
    for group in groups {
        let n = group.len() as f64;
        let w = gamma / (1.0 + n * gamma);
        let residuals = group.iter().map(|(t, y)| y - intercept - slope * t);
        let (sum, sum_sq) = residuals.fold((0.0, 0.0), |(s, ss), r| (s + r, ss + r * r));
        quadratic += sum_sq - w * sum * sum;
        log_det_v += (n * gamma).ln_1p();
    }
    let residual_variance = quadratic / dof;
    if !residual_variance.is_finite() || residual_variance <= 0.0 {
        return Err(SlopeError::DegenerateResidualVariance);
    }

    let log_likelihood =
        -0.5 * (dof * (residual_variance.ln() + 1.0) + log_det_v + det.ln());
    if !log_likelihood.is_finite() {
        return Err(SlopeError::NonFiniteLikelihood);
    }
    Ok(Profile {
        log_likelihood,
        intercept,
        slope,
        residual_variance,
        a11,
        det,
    })
}

fn gamma_of(psi: f64) -> f64 {
    psi / (1.0 - psi)
}

/// Maximises the profiled likelihood over `psi` in `[0, PSI_UPPER]`.
fn search_variance_ratio(groups: &[Vec<SeriesPoint>]) -> f64 {
    let objective = |psi: f64| {
        profile(groups, gamma_of(psi)).map_or(f64::NEG_INFINITY, |p| p.log_likelihood)
    };
    let ratio = (5f64.sqrt() - 1.0) / 2.0;
    let (mut lo, mut hi) = (0.0, PSI_UPPER);
    let mut c = hi - ratio * (hi - lo);
    let mut d = lo + ratio * (hi - lo);
    let (mut fc, mut fd) = (objective(c), objective(d));
    for _ in 0..MAX_SEARCH_ITERATIONS {
        if fc > fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - ratio * (hi - lo);
            fc = objective(c);
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + ratio * (hi - lo);
            fd = objective(d);
        }
        if hi - lo < SEARCH_TOLERANCE {
            break;
        }
    }
    let interior = (lo + hi) / 2.0;
    // The boundary is not covered by the bracketing points.
    if objective(0.0) > objective(interior) {
        0.0
    } else {
        interior
    }
}

/// Fits `egfr ~ time + (1 | patient)` by REML; one inner vector per patient.
pub fn fit_random_intercept(groups: &[Vec<SeriesPoint>]) -> Result<MixedModelFit> {
    let n_observations: usize = groups.iter().map(Vec::len).sum();
    let n_patients = groups.iter().filter(|g| !g.is_empty()).count();
    if n_observations <= FIXED_EFFECTS || n_patients == 0 {
        return Err(SlopeError::TooFewObservations {
            observations: n_observations,
            patients: n_patients,
        });
    }

    // Rejects designs that are singular even without a random effect.
    profile(groups, 0.0)?;

    let gamma = gamma_of(search_variance_ratio(groups));
    let best = profile(groups, gamma)?;
    let slope_se = (best.residual_variance * best.a11 / best.det).sqrt();
    if !slope_se.is_finite() {
        return Err(SlopeError::NonFiniteLikelihood);
    }

    tracing::debug!(
        gamma,
        residual_variance = best.residual_variance,
        log_likelihood = best.log_likelihood,
        "random-intercept model converged"
    );
    Ok(MixedModelFit {
        intercept: best.intercept,
        slope: best.slope,
        slope_se,
        residual_variance: best.residual_variance,
        patient_variance: gamma * best.residual_variance,
        restricted_log_likelihood: best.log_likelihood,
        n_patients,
        n_observations,
    })
}

/// Which estimator produced the population slope row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SlopeMethod {
    MixedModel,
    SkippedTooFewObservations { minimum: usize },
    SkippedTooFewPatients { minimum: usize },
    SkippedDisabled,
    Failed(String),
}

impl SlopeMethod {
    pub fn label(&self) -> String {
        match self {
            SlopeMethod::MixedModel => "LME (random intercept per patient)".to_string(),
            SlopeMethod::SkippedTooFewObservations { minimum } => {
                format!("LME skipped (< {minimum} observations)")
            }
            SlopeMethod::SkippedTooFewPatients { minimum } => {
                format!("LME skipped (< {minimum} patients)")
            }
            SlopeMethod::SkippedDisabled => "LME skipped (disabled)".to_string(),
            SlopeMethod::Failed(reason) => format!("LME error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlopeEstimate {
    /// mL/min/1.73m² per year.
    pub slope: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationSlope {
    pub method: SlopeMethod,
    pub estimate: Option<SlopeEstimate>,
    pub n_patients: usize,
    pub n_observations: usize,
}

impl PopulationSlope {
    pub fn used_mixed_model(&self) -> bool {
        self.method == SlopeMethod::MixedModel
    }
}

/// Population eGFR slope, or a labelled reason why there is none.
pub fn estimate_population_slope(
    timeline: &[TimelineRow],
    options: &AnalysisOptions,
) -> PopulationSlope {
    let groups: Vec<Vec<SeriesPoint>> = slope_observations(timeline).into_values().collect();
    let n_observations: usize = groups.iter().map(Vec::len).sum();
    let n_patients = groups.len();
    let skipped = |method: SlopeMethod| PopulationSlope {
        method,
        estimate: None,
        n_patients,
        n_observations,
    };

    if options.mixed_model == MixedModelMode::Skip {
        return skipped(SlopeMethod::SkippedDisabled);
    }
    if n_observations < options.mixed_model_min_observations {
        return skipped(SlopeMethod::SkippedTooFewObservations {
            minimum: options.mixed_model_min_observations,
        });
    }
    if n_patients < options.mixed_model_min_patients {
        return skipped(SlopeMethod::SkippedTooFewPatients {
            minimum: options.mixed_model_min_patients,
        });
    }

    match fit_random_intercept(&groups).and_then(|fit| fit.slope_inference(0.95)) {
        Ok(estimate) => {
            tracing::info!(
                slope = estimate.slope,
                ci_lower = estimate.ci_lower,
                ci_upper = estimate.ci_upper,
                p_value = estimate.p_value,
                "population eGFR slope"
            );
            PopulationSlope {
                method: SlopeMethod::MixedModel,
                estimate: Some(estimate),
                n_patients,
                n_observations,
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "mixed model failed; per-patient slopes only");
            skipped(SlopeMethod::Failed(err.to_string()))
        }
    }
}

/// Least-squares line through `points`; `None` when fewer than two points
/// or all share one time.
pub fn ols_line(points: &[SeriesPoint]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_t = points.iter().map(|(t, _)| t).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), (t, y)| {
        let dt = t - mean_t;
        (sxx + dt * dt, sxy + dt * (y - mean_y))
    });
    if sxx <= 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_t))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSlope {
    pub key: PatientKey,
    /// Rounded to 3 decimals.
    pub slope: f64,
    /// Rounded to 3 decimals.
    pub intercept: f64,
    pub n_visits: usize,
    /// Latest minus earliest time, in years, rounded to 2 decimals.
    pub follow_up_yr: f64,
}

/// Per-patient OLS slopes, ordered by patient key.
pub fn per_patient_slopes(timeline: &[TimelineRow]) -> Vec<PatientSlope> {
    slope_observations(timeline)
        .into_iter()
        .filter_map(|(key, points)| {
            let (slope, intercept) = ols_line(&points)?;
            let (min_t, max_t) = points
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (t, _)| {
                    (lo.min(*t), hi.max(*t))
                });
            Some(PatientSlope {
                key: key.clone(),
                slope: round_to(slope, 3),
                intercept: round_to(intercept, 3),
                n_visits: points.len(),
                follow_up_yr: round_to(max_t - min_t, 2),
            })
        })
        .collect()
}
