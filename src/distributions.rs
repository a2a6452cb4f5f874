/*!
Proposal distributions for the Metropolis step.

The adaptive sampler proposes from a multivariate Gaussian centred on the
current state. Its covariance is replaced every adaptation interval, so the
square-root factor is recomputed on each [`MultivariateGaussian::set_covariance`]
call and cached between draws.

Empirical covariances of a chain that has not moved yet are singular, so
the factor falls back from nalgebra's Cholesky decomposition to a symmetric
eigendecomposition with negative round-off eigenvalues clamped to zero.
Degenerate directions then receive no noise.

```rust
use thetafit::distributions::{MultivariateGaussian, Proposal};
use ndarray::arr2;
use rand::SeedableRng;
use rand::rngs::SmallRng;

let mut rng = SmallRng::seed_from_u64(42);
let proposal = MultivariateGaussian::new(arr2(&[[1.0, 0.5], [0.5, 2.0]]));
let candidate = proposal.sample(&[0.0, 1.0], &mut rng);
assert_eq!(candidate.len(), 2);
```
*/

use nalgebra as na;
use ndarray::{Array1, Array2, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// A trait for generating candidate states in Metropolis-type samplers.
///
/// Proposals here are symmetric, so no proposal density is needed in the
/// acceptance ratio.
pub trait Proposal {
    /// Samples a candidate from q(· | current).
    fn sample<R: Rng + ?Sized>(&self, current: &[f64], rng: &mut R) -> Vec<f64>;
}

/// Gaussian random-walk proposal with a full covariance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateGaussian {
    cov: Array2<f64>,
    factor: Array2<f64>,
}

impl MultivariateGaussian {
    /// Creates the proposal. `cov` must be square.
    pub fn new(cov: Array2<f64>) -> Self {
        let factor = sqrt_factor(cov.view());
        Self { cov, factor }
    }

    pub fn dim(&self) -> usize {
        self.cov.nrows()
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.cov
    }

    /// Square-root factor `A` with `A Aᵀ = cov`. Lower triangular whenever
    /// `cov` is positive definite.
    pub fn factor(&self) -> &Array2<f64> {
        &self.factor
    }

    pub fn set_covariance(&mut self, cov: Array2<f64>) {
        self.factor = sqrt_factor(cov.view());
        self.cov = cov;
    }

    pub fn into_covariance(self) -> Array2<f64> {
        self.cov
    }
}

impl Proposal for MultivariateGaussian {
    fn sample<R: Rng + ?Sized>(&self, current: &[f64], rng: &mut R) -> Vec<f64> {
        let z: Array1<f64> = (0..current.len())
            .map(|_| StandardNormal.sample(rng))
            .collect();
        let noise = self.factor.dot(&z);
        current.iter().zip(noise.iter()).map(|(x, e)| x + e).collect()
    }
}

fn to_dmatrix(matrix: ArrayView2<f64>) -> na::DMatrix<f64> {
    na::DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |i, j| matrix[(i, j)])
}

fn from_dmatrix(matrix: &na::DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn(matrix.shape(), |(i, j)| matrix[(i, j)])
}

/// Square-root factor `A` of a symmetric positive semi-definite matrix, with
/// `A Aᵀ = matrix`.
///
/// Positive definite input gives the lower Cholesky factor. Otherwise the
/// factor is `V diag(sqrt(max(λ, 0)))` from the eigendecomposition, so slightly
/// indefinite round-off is clamped rather than propagated.
pub fn sqrt_factor(matrix: ArrayView2<f64>) -> Array2<f64> {
    let m = to_dmatrix(matrix);
    if let Some(chol) = na::Cholesky::new(m.clone()) {
        let l = chol.l();
        if l.iter().all(|x| x.is_finite()) {
            return from_dmatrix(&l);
        }
    }
    let eig = na::SymmetricEigen::new(m);
    let roots = eig.eigenvalues.map(|lambda| lambda.max(0.0).sqrt());
    from_dmatrix(&(eig.eigenvectors * na::DMatrix::from_diagonal(&roots)))
}

/// Relative tolerance for the symmetry and definiteness checks, scaled by
/// the largest absolute entry.
const COVARIANCE_TOLERANCE: f64 = 1e-10;

/// Whether `matrix` is symmetric up to round-off.
pub fn is_symmetric(matrix: ArrayView2<f64>) -> bool {
    let tol = COVARIANCE_TOLERANCE * max_abs(matrix);
    matrix.is_square()
        && matrix
            .indexed_iter()
            .all(|((i, j), &x)| (x - matrix[(j, i)]).abs() <= tol)
}

/// Whether the symmetric `matrix` has no eigenvalue below round-off.
pub fn is_positive_semi_definite(matrix: ArrayView2<f64>) -> bool {
    if matrix.is_empty() {
        return true;
    }
    let tol = COVARIANCE_TOLERANCE * max_abs(matrix);
    let eig = na::SymmetricEigen::new(to_dmatrix(matrix));
    eig.eigenvalues.iter().all(|&lambda| lambda >= -tol)
}

fn max_abs(matrix: ArrayView2<f64>) -> f64 {
    matrix.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}
