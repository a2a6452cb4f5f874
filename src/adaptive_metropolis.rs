/*!
# Adaptive Metropolis Sampler

Samples the posterior of a model's free parameters given a sum-of-squares
objective `ss(θ)`, read as −2·log-likelihood. Candidates come from a
Gaussian random walk whose covariance is periodically re-estimated from the
chain itself.

## Overview

- **Objective**: any [`Objective`] over named parameters; fixed parameters are
  injected by the [`ObjectiveAdapter`].
- **Bounds**: a candidate outside any parameter's `[minimum, maximum]` is
  rejected without evaluating the objective and the chain stays put.
- **Acceptance**: `α = exp(-0.5 (ss_candidate - ss_current))`, accepted by [`accept`].
- **Adaptation**: every `adaptint` iterations the proposal covariance becomes
  the empirical covariance of all chain rows so far, scaled by `2.4²/p`
  unless [`AdaptationScaling::Unscaled`] is requested.
- **Reproducibility**: each run owns a `SmallRng`; `set_seed` makes it
  deterministic. [`sample_chains`] derives chain `k`'s seed as `seed + k`.

## Example Usage

```rust
use thetafit::adaptive_metropolis::{sample, SamplerOptions};
use thetafit::objective::ParameterValues;
use thetafit::parameters::{Parameter, ParameterSet};
use ndarray::arr2;

let params = ParameterSet::from(vec![
    Parameter::new("a", 0.0).with_bounds(-10.0, 10.0),
    Parameter::new("b", 5.0).fixed(),
]);
let ssfun = |p: &ParameterValues, _: &()| (p["a"] - 3.0).powi(2);
let options = SamplerOptions::new(arr2(&[[1.0]]))
    .nsimu(2_000)
    .adaptint(100)
    .set_seed(42);

let out = sample(&ssfun, &(), &params, &options).unwrap();
assert_eq!(out.chain.nrows(), 2_000);
assert_eq!(out.chain.column("b").unwrap()[1_999], 5.0);
assert!(out.summary.accepted > 0.0 && out.summary.accepted < 100.0);
```
*/

use indicatif::{MultiProgress, ProgressBar};
use log::{debug, info};
use ndarray::{aview1, s, Array1, Array2, ArrayView1, ArrayView2};
use rand::prelude::*;
use rayon::prelude::*;

use crate::bounds::{is_out_of_bounds, Bounds};
use crate::core::{
    chain_progress_bar, progress_style, run_chain, run_chain_with_progress, MarkovChain,
};
use crate::distributions::{
    is_positive_semi_definite, is_symmetric, MultivariateGaussian, Proposal,
};
use crate::errors::{ConfigurationError, SamplerError};
use crate::objective::{Objective, ObjectiveAdapter};
use crate::parameters::ParameterSet;
use crate::stats::{adapted_covariance, AdaptationScaling};
use crate::summary::{ChainTable, RunSummary, SampleOutput};

/// Initial proposal covariance.
///
/// A scalar is accepted only when exactly one parameter is sampled and is
/// turned into a 1×1 matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum ProposalCovariance {
    Scalar(f64),
    Matrix(Array2<f64>),
}

impl ProposalCovariance {
    /// The covariance as a `dim × dim` matrix. It must be finite, symmetric
    /// and positive semi-definite up to round-off.
    pub fn to_matrix(&self, dim: usize) -> Result<Array2<f64>, ConfigurationError> {
        let cov = match self {
            ProposalCovariance::Scalar(v) if dim == 1 => Array2::from_elem((1, 1), *v),
            ProposalCovariance::Scalar(_) => {
                return Err(ConfigurationError::ScalarCovariance(dim))
            }
            ProposalCovariance::Matrix(m) => {
                if m.dim() != (dim, dim) {
                    return Err(ConfigurationError::CovarianceShape {
                        expected: dim,
                        rows: m.nrows(),
                        cols: m.ncols(),
                    });
                }
                m.clone()
            }
        };
        if cov.iter().any(|x| !x.is_finite()) {
            return Err(ConfigurationError::NonFiniteCovariance);
        }
        if !is_symmetric(cov.view()) {
            return Err(ConfigurationError::AsymmetricCovariance);
        }
        if !is_positive_semi_definite(cov.view()) {
            return Err(ConfigurationError::NotPositiveSemiDefinite);
        }
        Ok(cov)
    }
}

impl From<f64> for ProposalCovariance {
    fn from(v: f64) -> Self {
        ProposalCovariance::Scalar(v)
    }
}

impl From<Array2<f64>> for ProposalCovariance {
    fn from(m: Array2<f64>) -> Self {
        ProposalCovariance::Matrix(m)
    }
}

/// Run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerOptions {
    /// Chain length, including the initial row.
    pub nsimu: usize,
    /// Adaptation interval; `0` keeps `qcov` for the whole run.
    pub adaptint: usize,
    /// Progress-logging interval; `None` uses `adaptint`, `Some(0)` disables logging.
    pub printint: Option<usize>,
    pub qcov: ProposalCovariance,
    pub scaling: AdaptationScaling,
    /// Seed for the run's RNG; a random seed is drawn when `None`.
    pub seed: Option<u64>,
    /// Show an indicatif progress bar.
    pub progress: bool,
}

impl SamplerOptions {
    /// Defaults: `nsimu = 10_000`, `adaptint = 100`, printing every `adaptint`
    /// iterations, scaled adaptation, random seed, no progress bar.
    pub fn new(qcov: impl Into<ProposalCovariance>) -> Self {
        Self {
            nsimu: 10_000,
            adaptint: 100,
            printint: None,
            qcov: qcov.into(),
            scaling: AdaptationScaling::default(),
            seed: None,
            progress: false,
        }
    }

    pub fn nsimu(mut self, nsimu: usize) -> Self {
        self.nsimu = nsimu;
        self
    }

    pub fn adaptint(mut self, adaptint: usize) -> Self {
        self.adaptint = adaptint;
        self
    }

    pub fn printint(mut self, printint: usize) -> Self {
        self.printint = Some(printint);
        self
    }

    pub fn scaling(mut self, scaling: AdaptationScaling) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Effective progress-logging interval.
    pub fn print_interval(&self) -> usize {
        self.printint.unwrap_or(self.adaptint)
    }
}

/// Metropolis acceptance decision for the ratio `alpha`.
///
/// `alpha <= 0` always rejects and `alpha >= 1` always accepts, without
/// touching `rng`. In between, one uniform `u` in `[0, 1)` is drawn and the
/// candidate is accepted iff `alpha > u`.
pub fn accept<R: Rng + ?Sized>(alpha: f64, rng: &mut R) -> bool {
    if alpha <= 0.0 {
        false
    } else if alpha >= 1.0 {
        true
    } else {
        alpha > rng.gen::<f64>()
    }
}

/// Mutable state threaded through the sampling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    theta: Vec<f64>,
    ss: f64,
    iteration: usize,
    rejected: usize,
    out_of_bounds: usize,
    non_finite: usize,
    proposal: MultivariateGaussian,
}

impl ChainState {
    /// Current (last accepted) free-parameter vector.
    pub fn theta(&self) -> &[f64] {
        &self.theta
    }

    /// Objective value at [`Self::theta`].
    pub fn ss(&self) -> f64 {
        self.ss
    }

    /// Index of the last written chain row.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn out_of_bounds(&self) -> usize {
        self.out_of_bounds
    }

    pub fn non_finite(&self) -> usize {
        self.non_finite
    }

    pub fn proposal_covariance(&self) -> &Array2<f64> {
        self.proposal.covariance()
    }
}

/// One Adaptive Metropolis run.
///
/// [`AdaptiveMetropolis::new`] validates the setup and writes chain row 0,
/// every [`MarkovChain::step`] writes the next row, and
/// [`AdaptiveMetropolis::run`] completes the chain and returns the results.
pub struct AdaptiveMetropolis<'a, O: ?Sized, D: ?Sized> {
    adapter: ObjectiveAdapter<'a, O, D>,
    bounds: Vec<Bounds>,
    nsimu: usize,
    adaptint: usize,
    printint: usize,
    scaling: AdaptationScaling,
    state: ChainState,
    chain: Array2<f64>,
    sschain: Array1<f64>,
    rng: SmallRng,
    seed: u64,
    progress: bool,
}

impl<'a, O, D> AdaptiveMetropolis<'a, O, D>
where
    O: Objective<D> + ?Sized,
    D: ?Sized,
{
    /// Validates the configuration, evaluates the objective at the initial
    /// values and writes chain row 0. Fails before any sampling iteration if
    /// the setup is invalid.
    pub fn new(
        objective: &'a O,
        data: &'a D,
        params: &ParameterSet,
        options: &SamplerOptions,
    ) -> Result<Self, SamplerError> {
        if options.nsimu == 0 {
            return Err(ConfigurationError::EmptyChain.into());
        }
        let adapter = ObjectiveAdapter::new(objective, data, params)?;
        let bounds = params.bounds();
        let theta = params.initial_vector();

        params.check_start()?;

        let dim = adapter.dim();
        let qcov = options.qcov.to_matrix(dim)?;

        let ss = adapter
            .evaluate(&theta)
            .map_err(|source| SamplerError::Objective {
                iteration: 0,
                source,
            })?;
        if !ss.is_finite() {
            return Err(ConfigurationError::NonFiniteInitialObjective(ss).into());
        }

        info!("Sampling these parameters:");
        info!("name\tstart\t[min,max]");
        for ((name, x), b) in adapter.free_names().iter().zip(&theta).zip(&bounds) {
            info!("{}\t{}\t[{},{}]", name, x, b.minimum, b.maximum);
        }

        let mut chain = Array2::<f64>::zeros((options.nsimu, dim));
        chain.row_mut(0).assign(&aview1(&theta));
        let mut sschain = Array1::<f64>::zeros(options.nsimu);
        sschain[0] = ss;

        let seed = options.seed.unwrap_or_else(|| thread_rng().gen::<u64>());

        Ok(Self {
            adapter,
            bounds,
            nsimu: options.nsimu,
            adaptint: options.adaptint,
            printint: options.print_interval(),
            scaling: options.scaling,
            state: ChainState {
                theta,
                ss,
                iteration: 0,
                rejected: 0,
                out_of_bounds: 0,
                non_finite: 0,
                proposal: MultivariateGaussian::new(qcov),
            },
            chain,
            sschain,
            rng: SmallRng::seed_from_u64(seed),
            seed,
            progress: options.progress,
        })
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Chain rows written so far.
    pub fn chain(&self) -> ArrayView2<'_, f64> {
        self.chain.slice(s![..=self.state.iteration, ..])
    }

    /// Objective values of the rows written so far.
    pub fn sschain(&self) -> ArrayView1<'_, f64> {
        self.sschain.slice(s![..=self.state.iteration])
    }

    /// Iterations left until the chain holds `nsimu` rows.
    pub fn remaining(&self) -> usize {
        self.nsimu - 1 - self.state.iteration
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    /// Runs the remaining iterations and assembles the results.
    pub fn run(mut self) -> Result<SampleOutput, SamplerError> {
        if self.progress {
            let pb = ProgressBar::new(self.remaining() as u64);
            pb.set_style(progress_style());
            return self.run_with_progress(&pb);
        }
        let n = self.remaining();
        run_chain(&mut self, n)?;
        Ok(self.finish())
    }

    fn run_with_progress(mut self, pb: &ProgressBar) -> Result<SampleOutput, SamplerError> {
        let n = self.remaining();
        run_chain_with_progress(&mut self, n, pb)?;
        Ok(self.finish())
    }

    fn advance(&mut self) -> Result<(), SamplerError> {
        let i = self.state.iteration + 1;
        let candidate = self.state.proposal.sample(&self.state.theta, &mut self.rng);

        if is_out_of_bounds(&candidate, &self.bounds) {
            self.state.rejected += 1;
            self.state.out_of_bounds += 1;
        } else {
            let ss = self
                .adapter
                .evaluate(&candidate)
                .map_err(|source| SamplerError::Objective {
                    iteration: i,
                    source,
                })?;
            if !ss.is_finite() {
                debug!("i: {i}, objective is {ss} at {candidate:?}, rejecting");
                self.state.rejected += 1;
                self.state.non_finite += 1;
            } else if accept((-0.5 * (ss - self.state.ss)).exp(), &mut self.rng) {
                self.state.theta = candidate;
                self.state.ss = ss;
            } else {
                self.state.rejected += 1;
            }
        }

        self.chain.row_mut(i).assign(&aview1(&self.state.theta));
        self.sschain[i] = self.state.ss;
        self.state.iteration = i;

        if self.adaptint > 0 && i % self.adaptint == 0 {
            let cov = adapted_covariance(self.chain.slice(s![..=i, ..]), self.scaling)?;
            debug!("i: {i}, adapted proposal covariance {cov:?}");
            self.state.proposal.set_covariance(cov);
        }

        if self.printint > 0 && i % self.printint == 0 {
            info!(
                "i: {}, rejected: {:.1}%, out of bounds: {:.1}%",
                i,
                self.state.rejected as f64 / i as f64 * 100.0,
                self.state.out_of_bounds as f64 / i as f64 * 100.0
            );
        }
        Ok(())
    }

    fn finish(self) -> SampleOutput {
        let names: Vec<String> = self.adapter.names().to_vec();
        let mut table = Array2::<f64>::zeros((self.nsimu, names.len()));
        for (j, &value) in self.adapter.template().iter().enumerate() {
            table.column_mut(j).fill(value);
        }
        for (k, &slot) in self.adapter.free_slots().iter().enumerate() {
            table.column_mut(slot).assign(&self.chain.column(k));
        }

        let summary = RunSummary::from_counts(
            self.nsimu,
            self.state.rejected,
            self.state.out_of_bounds,
            self.state.non_finite,
            self.state.proposal.into_covariance(),
            self.chain.row(self.nsimu - 1).to_owned(),
            self.adapter.free_names().iter().map(|s| s.to_string()).collect(),
        );

        SampleOutput {
            summary,
            chain: ChainTable::new(names, table),
            sschain: self.sschain,
        }
    }
}

impl<O, D> MarkovChain for AdaptiveMetropolis<'_, O, D>
where
    O: Objective<D> + ?Sized,
    D: ?Sized,
{
    /// Writes the next chain row. A finished chain is left unchanged.
    fn step(&mut self) -> Result<&[f64], SamplerError> {
        if !self.is_done() {
            self.advance()?;
        }
        Ok(&self.state.theta)
    }

    fn current_state(&self) -> &[f64] {
        &self.state.theta
    }

    fn acceptance_rate(&self) -> f64 {
        let i = self.state.iteration;
        if i == 0 {
            return 1.0;
        }
        (i - self.state.rejected) as f64 / i as f64
    }
}

/// Runs one Adaptive Metropolis chain.
pub fn sample<O, D>(
    objective: &O,
    data: &D,
    params: &ParameterSet,
    options: &SamplerOptions,
) -> Result<SampleOutput, SamplerError>
where
    O: Objective<D> + ?Sized,
    D: ?Sized,
{
    AdaptiveMetropolis::new(objective, data, params, options)?.run()
}

/// Runs `n_chains` independent chains in parallel.
///
/// Chain `k` is seeded with `seed + k`, where `seed` is `options.seed` or a
/// fresh random value. Results are returned in chain order; the first
/// failing chain's error is returned if any chain fails.
pub fn sample_chains<O, D>(
    objective: &O,
    data: &D,
    params: &ParameterSet,
    options: &SamplerOptions,
    n_chains: usize,
) -> Result<Vec<SampleOutput>, SamplerError>
where
    O: Objective<D> + Sync + ?Sized,
    D: Sync + ?Sized,
{
    let seed = options.seed.unwrap_or_else(|| thread_rng().gen::<u64>());
    let multi = options.progress.then(MultiProgress::new);

    (0..n_chains)
        .into_par_iter()
        .map(|k| {
            let chain_options = options
                .clone()
                .set_seed(seed.wrapping_add(k as u64))
                .progress(false);
            let sampler = AdaptiveMetropolis::new(objective, data, params, &chain_options)?;
            match &multi {
                Some(multi) => {
                    let pb = chain_progress_bar(multi, k, sampler.remaining());
                    sampler.run_with_progress(&pb)
                }
                None => sampler.run(),
            }
        })
        .collect()
}
