//! Mixed-model fitting failures.
//!
//! These never abort a run: the pipeline turns them into a labelled
//! `LME error: <reason>` slope row and keeps the per-patient fallback.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SlopeError {
    #[error("too few observations ({observations}) or patients ({patients}) to fit")]
    TooFewObservations { observations: usize, patients: usize },

    /// The time covariate carries no information once patient means are removed.
    #[error("singular design matrix (no within-patient time variation)")]
    SingularDesign,

    #[error("degenerate residual variance")]
    DegenerateResidualVariance,

    #[error("non-finite restricted likelihood")]
    NonFiniteLikelihood,

    #[error("reference distribution unavailable: {0}")]
    Distribution(String),
}

pub type Result<T> = std::result::Result<T, SlopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SlopeError::SingularDesign.to_string(),
            "singular design matrix (no within-patient time variation)"
        );
        let err = SlopeError::TooFewObservations {
            observations: 3,
            patients: 1,
        };
        assert_eq!(
            err.to_string(),
            "too few observations (3) or patients (1) to fit"
        );
    }
}
