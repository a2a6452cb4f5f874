//! Error types shared by the sampler, the objective adapter and the optimizer.

use ndarray_stats::errors::EmptyInput;
use thiserror::Error;

/// Error returned by a user objective that could not be evaluated.
pub type ObjectiveError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid setup detected before the first sampling iteration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("no target parameters")]
    NoTargetParameters,
    #[error("parameter name `{0}` is used more than once")]
    DuplicateName(String),
    #[error("initial parameters out of bounds: `{name}` = {value} is outside [{minimum}, {maximum}]")]
    InitialOutOfBounds {
        name: String,
        value: f64,
        minimum: f64,
        maximum: f64,
    },
    #[error("proposal covariance is {rows}x{cols}, expected {expected}x{expected}")]
    CovarianceShape {
        expected: usize,
        rows: usize,
        cols: usize,
    },
    #[error("a scalar proposal covariance needs exactly one target parameter, found {0}")]
    ScalarCovariance(usize),
    #[error("proposal covariance contains non-finite entries")]
    NonFiniteCovariance,
    #[error("proposal covariance is not symmetric")]
    AsymmetricCovariance,
    #[error("proposal covariance is not positive semi-definite")]
    NotPositiveSemiDefinite,
    #[error("parameter `{name}` has a non-finite initial value or a NaN bound")]
    NonFiniteParameter { name: String },
    #[error("nsimu must be positive")]
    EmptyChain,
    #[error("objective is not finite at the initial parameters ({0})")]
    NonFiniteInitialObjective(f64),
}

/// Any failure that aborts a sampling or optimization run.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("objective function failed at iteration {iteration}")]
    Objective {
        iteration: usize,
        #[source]
        source: ObjectiveError,
    },
    #[error("could not estimate the proposal covariance: {0}")]
    Statistics(#[from] EmptyInput),
    #[error("minimizer failed: {0}")]
    Minimizer(String),
}

impl SamplerError {
    /// Returns the configuration error, if this is one.
    pub fn as_configuration(&self) -> Option<&ConfigurationError> {
        match self {
            SamplerError::Configuration(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_messages() {
        assert_eq!(
            ConfigurationError::NoTargetParameters.to_string(),
            "no target parameters"
        );
        let err = ConfigurationError::CovarianceShape {
            expected: 2,
            rows: 3,
            cols: 3,
        };
        assert_eq!(
            err.to_string(),
            "proposal covariance is 3x3, expected 2x2"
        );
    }

    #[test]
    fn objective_error_keeps_source() {
        use std::error::Error as _;

        let err = SamplerError::Objective {
            iteration: 7,
            source: "model diverged".into(),
        };
        assert_eq!(err.to_string(), "objective function failed at iteration 7");
        assert_eq!(err.source().unwrap().to_string(), "model diverged");
        assert!(err.as_configuration().is_none());
    }
}
