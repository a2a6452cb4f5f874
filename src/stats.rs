//! Chain statistics: the empirical covariance used for proposal adaptation
//! and simple per-parameter moments for summarising a chain.

use ndarray::prelude::*;
use ndarray_stats::errors::EmptyInput;
use ndarray_stats::CorrelationExt;

/// Scaling applied to the empirical covariance when the proposal adapts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdaptationScaling {
    /// Multiply by `2.4² / p`, the usual optimal-scaling constant for a
    /// Gaussian random walk in `p` dimensions.
    #[default]
    Scaled,
    /// Use the empirical covariance as is.
    Unscaled,
}

impl AdaptationScaling {
    pub fn factor(self, dim: usize) -> f64 {
        match self {
            AdaptationScaling::Scaled => 2.4_f64.powi(2) / dim as f64,
            AdaptationScaling::Unscaled => 1.0,
        }
    }
}

/// Sample covariance (denominator `n - 1`) of `rows`, one observation per
/// row. Always `p × p`, also when `p == 1`. Needs at least two rows.
pub fn empirical_covariance(rows: ArrayView2<f64>) -> Result<Array2<f64>, EmptyInput> {
    // `cov` panics when ddof is not below the number of observations
    if rows.nrows() < 2 {
        return Err(EmptyInput);
    }
    rows.t().cov(1.0)
}

/// Proposal covariance after an adaptation step over `rows`.
pub fn adapted_covariance(
    rows: ArrayView2<f64>,
    scaling: AdaptationScaling,
) -> Result<Array2<f64>, EmptyInput> {
    let cov = empirical_covariance(rows)?;
    Ok(cov * scaling.factor(rows.ncols()))
}

/// Per-parameter moments of a chain segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStats {
    pub n: usize,
    pub mean: Array1<f64>,
    /// Sample variance (denominator `n - 1`); zero for a single row.
    pub variance: Array1<f64>,
}

impl ChainStats {
    /// Moments of `rows`, one draw per row. Returns `None` for an empty segment.
    pub fn from_rows(rows: ArrayView2<f64>) -> Option<Self> {
        let n = rows.nrows();
        let mean = rows.mean_axis(Axis(0))?;
        let variance = if n > 1 {
            rows.var_axis(Axis(0), 1.0)
        } else {
            Array1::zeros(rows.ncols())
        };
        Some(Self { n, mean, variance })
    }

    pub fn std(&self) -> Array1<f64> {
        self.variance.mapv(f64::sqrt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn covariance_matches_hand_computation() {
        let rows = arr2(&[[1.0, 2.0], [3.0, 6.0], [5.0, 7.0]]);
        let cov = empirical_covariance(rows.view()).unwrap();
        // var(x) = 4, var(y) = 7, cov(x, y) = 5
        assert_abs_diff_eq!(cov, arr2(&[[4.0, 5.0], [5.0, 7.0]]), epsilon = 1e-12);
    }

    #[test]
    fn single_parameter_covariance_is_1x1() {
        let rows = arr2(&[[1.0], [2.0], [3.0], [4.0]]);
        let cov = adapted_covariance(rows.view(), AdaptationScaling::Unscaled).unwrap();
        assert_eq!(cov.dim(), (1, 1));
        assert_abs_diff_eq!(cov[(0, 0)], 5.0 / 3.0, epsilon = 1e-12);

        let scaled = adapted_covariance(rows.view(), AdaptationScaling::Scaled).unwrap();
        assert_eq!(scaled.dim(), (1, 1));
        assert_abs_diff_eq!(scaled[(0, 0)], 5.76 * 5.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn scaling_factor_depends_on_dimension() {
        assert_abs_diff_eq!(AdaptationScaling::Scaled.factor(2), 2.88, epsilon = 1e-12);
        assert_eq!(AdaptationScaling::Unscaled.factor(5), 1.0);
        assert_eq!(AdaptationScaling::default(), AdaptationScaling::Scaled);
    }

    #[test]
    fn constant_chain_has_zero_covariance() {
        let rows = Array2::from_elem((10, 3), 0.7);
        let cov = empirical_covariance(rows.view()).unwrap();
        assert_abs_diff_eq!(cov, Array2::zeros((3, 3)), epsilon = 1e-15);
    }

    #[test]
    fn empty_rows_are_an_error() {
        let rows = Array2::<f64>::zeros((0, 2));
        assert!(empirical_covariance(rows.view()).is_err());
        assert!(ChainStats::from_rows(rows.view()).is_none());

        let single = arr2(&[[1.0, 2.0]]);
        assert!(empirical_covariance(single.view()).is_err());
        let stats = ChainStats::from_rows(single.view()).unwrap();
        assert_eq!(stats.variance, arr1(&[0.0, 0.0]));
    }

    #[test]
    fn chain_stats_moments() {
        let rows = arr2(&[[1.0, 10.0], [2.0, 10.0], [3.0, 10.0]]);
        let stats = ChainStats::from_rows(rows.view()).unwrap();
        assert_eq!(stats.n, 3);
        assert_abs_diff_eq!(stats.mean, arr1(&[2.0, 10.0]), epsilon = 1e-12);
        assert_abs_diff_eq!(stats.variance, arr1(&[1.0, 0.0]), epsilon = 1e-12);
        assert_abs_diff_eq!(stats.std(), arr1(&[1.0, 0.0]), epsilon = 1e-12);
    }
}
