/*!
Point estimate of the free parameters, typically used as the starting point
of a sampling run.

Minimisation is delegated to argmin's Nelder–Mead. Bounds are enforced by
giving every candidate outside them an infinite cost; non-finite objective
values are treated the same way. The simplex-spread stopping rule alone can
end a run with vertices straddling the minimum, so the search is restarted
from the best point with a halved simplex until a restart no longer improves
the cost.

```rust
use thetafit::objective::ParameterValues;
use thetafit::optimization::{optimize, OptimizeOptions};
use thetafit::parameters::{Parameter, ParameterSet};

let params = ParameterSet::from(vec![
    Parameter::new("a", 0.0).with_bounds(-10.0, 10.0),
    Parameter::new("b", 5.0).fixed(),
]);
let ssfun = |p: &ParameterValues, _: &()| (p["a"] - 3.0).powi(2);
let (best, result) = optimize(&ssfun, &(), &params, &OptimizeOptions::default()).unwrap();
assert!((best["a"] - 3.0).abs() < 1e-4);
assert_eq!(best["b"], 5.0);
assert!(result.cost < 1e-8);
```
*/

use std::cell::{Cell, RefCell};

use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::neldermead::NelderMead;
use log::{debug, info};

use crate::bounds::{is_out_of_bounds, Bounds};
use crate::errors::{ObjectiveError, SamplerError};
use crate::objective::{Objective, ObjectiveAdapter, ParameterValues};
use crate::parameters::ParameterSet;

/// Nelder–Mead settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeOptions {
    /// Iteration limit of each Nelder–Mead run.
    pub max_iters: u64,
    /// Stop a run once the standard deviation of the simplex costs drops
    /// below this. Also the smallest cost decrease that triggers a restart.
    pub sd_tolerance: f64,
    /// Relative size of the initial simplex: vertex `j` moves coordinate `j`
    /// by `initial_step * max(|x_j|, 1)`.
    pub initial_step: f64,
    /// Restarts from the best point after the first run.
    pub max_restarts: usize,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            max_iters: 1_000,
            sd_tolerance: 1e-12,
            initial_step: 0.1,
            max_restarts: 20,
        }
    }
}

impl OptimizeOptions {
    pub fn max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn sd_tolerance(mut self, sd_tolerance: f64) -> Self {
        self.sd_tolerance = sd_tolerance;
        self
    }

    pub fn initial_step(mut self, initial_step: f64) -> Self {
        self.initial_step = initial_step;
        self
    }

    pub fn max_restarts(mut self, max_restarts: usize) -> Self {
        self.max_restarts = max_restarts;
        self
    }
}

/// Outcome of the minimisation, over the free parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeResult {
    pub x: Vec<f64>,
    pub cost: f64,
    /// Nelder–Mead iterations summed over all runs.
    pub iterations: u64,
    /// Number of restarts after the first run.
    pub restarts: usize,
    /// Termination status of the last run.
    pub termination: String,
}

struct BoundedCost<'s, 'a, O: ?Sized, D: ?Sized> {
    adapter: &'s ObjectiveAdapter<'a, O, D>,
    bounds: &'s [Bounds],
    evaluations: &'s Cell<usize>,
    /// First objective error and the evaluation it happened at.
    failure: &'s RefCell<Option<(usize, ObjectiveError)>>,
}

impl<O, D> CostFunction for BoundedCost<'_, '_, O, D>
where
    O: Objective<D> + ?Sized,
    D: ?Sized,
{
    type Param = Vec<f64>;
    type Output = f64;

    // Must not return `Err`: Nelder-Mead unwraps the costs of its initial simplex.
    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        if self.failure.borrow().is_some() || is_out_of_bounds(x, self.bounds) {
            return Ok(f64::INFINITY);
        }
        let n = self.evaluations.get();
        self.evaluations.set(n + 1);
        match self.adapter.evaluate(x) {
            Ok(ss) if ss.is_finite() => Ok(ss),
            Ok(_) => Ok(f64::INFINITY),
            Err(source) => {
                *self.failure.borrow_mut() = Some((n, source));
                Ok(f64::INFINITY)
            }
        }
    }
}

/// Minimises the objective over the free parameters, starting from their
/// initial values.
///
/// Returns the best full parameter mapping (fixed values included) and the
/// minimiser's result. An objective error aborts the search with
/// [`SamplerError::Objective`], whose `iteration` is the index of the failing
/// objective evaluation.
pub fn optimize<O, D>(
    objective: &O,
    data: &D,
    params: &ParameterSet,
    options: &OptimizeOptions,
) -> Result<(ParameterValues, OptimizeResult), SamplerError>
where
    O: Objective<D> + ?Sized,
    D: ?Sized,
{
    let adapter = ObjectiveAdapter::new(objective, data, params)?;
    params.check_start()?;
    let bounds = params.bounds();

    let evaluations = Cell::new(0);
    let failure = RefCell::new(None);
    let mut result = OptimizeResult {
        x: params.initial_vector(),
        cost: f64::INFINITY,
        iterations: 0,
        restarts: 0,
        termination: String::new(),
    };

    for restart in 0..=options.max_restarts {
        let step = options.initial_step * 0.5_f64.powi(restart as i32);
        let solver = NelderMead::new(initial_simplex(&result.x, &bounds, step))
            .with_sd_tolerance(options.sd_tolerance)
            .map_err(|e| SamplerError::Minimizer(e.to_string()))?;
        let cost = BoundedCost {
            adapter: &adapter,
            bounds: &bounds,
            evaluations: &evaluations,
            failure: &failure,
        };

        let res = Executor::new(cost, solver)
            .configure(|state| state.max_iters(options.max_iters))
            .run()
            .map_err(|e| SamplerError::Minimizer(e.to_string()))?;
        if let Some((iteration, source)) = failure.borrow_mut().take() {
            return Err(SamplerError::Objective { iteration, source });
        }

        let state = res.state();
        let run_cost = state.get_best_cost();
        let gain = result.cost - run_cost;
        if run_cost < result.cost {
            if let Some(x) = state.get_best_param() {
                result.x = x.clone();
                result.cost = run_cost;
            }
        }
        result.iterations += state.get_iter();
        result.restarts = restart;
        result.termination = format!("{:?}", state.get_termination_status());
        debug!(
            "Nelder-Mead run {restart}: cost {run_cost} after {} iterations",
            state.get_iter()
        );

        let improved = gain > options.sd_tolerance;
        if restart > 0 && !improved {
            break;
        }
    }
    info!(
        "Nelder-Mead stopped after {} iterations and {} restarts with cost {} ({})",
        result.iterations, result.restarts, result.cost, result.termination
    );

    Ok((adapter.expand(&result.x), result))
}

/// `x0` plus one vertex per coordinate, each kept inside the bounds.
fn initial_simplex(x0: &[f64], bounds: &[Bounds], step: f64) -> Vec<Vec<f64>> {
    let mut simplex = vec![x0.to_vec()];
    for (j, b) in bounds.iter().enumerate() {
        let h = step * x0[j].abs().max(1.0);
        let mut vertex = x0.to_vec();
        vertex[j] = if !b.excludes(x0[j] + h) {
            x0[j] + h
        } else if !b.excludes(x0[j] - h) {
            x0[j] - h
        } else {
            // interval narrower than the step: halfway to the farther bound
            let up = b.maximum - x0[j];
            let down = x0[j] - b.minimum;
            if up >= down {
                x0[j] + up / 2.0
            } else {
                x0[j] - down / 2.0
            }
        };
        simplex.push(vertex);
    }
    simplex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConfigurationError;
    use crate::objective::TryObjective;
    use crate::parameters::Parameter;
    use approx::assert_abs_diff_eq;

    #[test]
    fn simplex_stays_inside_bounds() {
        let bounds = [
            Bounds::new(-10.0, 10.0),
            Bounds::new(0.0, 1.0),
            Bounds::new(4.9, 5.05),
        ];
        let simplex = initial_simplex(&[2.0, 1.0, 5.0], &bounds, 0.1);
        assert_eq!(simplex.len(), 4);
        assert_eq!(simplex[1], vec![2.2, 1.0, 5.0]);
        assert_eq!(simplex[2], vec![2.0, 0.9, 5.0]);
        assert_abs_diff_eq!(simplex[3][2], 4.95, epsilon = 1e-12);
        for v in &simplex {
            assert!(!is_out_of_bounds(v, &bounds));
        }
    }

    #[test]
    fn finds_interior_minimum() {
        let params = ParameterSet::from(vec![
            Parameter::new("x", 0.0),
            Parameter::new("scale", 2.0).fixed(),
            Parameter::new("y", 0.0),
        ]);
        let ssfun = |p: &ParameterValues, _: &()| {
            p["scale"] * ((p["x"] - 1.0).powi(2) + 10.0 * (p["y"] + 2.0).powi(2))
        };
        let (best, result) = optimize(&ssfun, &(), &params, &OptimizeOptions::default()).unwrap();
        assert_abs_diff_eq!(best["x"], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(best["y"], -2.0, epsilon = 1e-4);
        assert_eq!(best["scale"], 2.0);
        assert_eq!(result.x.len(), 2);
        assert!(result.iterations > 0);
    }

    #[test]
    fn respects_bounds() {
        let params = ParameterSet::from(vec![Parameter::new("c", 2.0).with_bounds(0.5, 5.0)]);
        let ssfun = |p: &ParameterValues, _: &()| p["c"].powi(2);
        let (best, result) = optimize(&ssfun, &(), &params, &OptimizeOptions::default()).unwrap();
        assert!(best["c"] >= 0.5);
        assert_abs_diff_eq!(best["c"], 0.5, epsilon = 1e-3);
        assert!(result.cost.is_finite());
    }

    #[test]
    fn non_finite_regions_are_avoided() {
        let params = ParameterSet::from(vec![Parameter::new("k", 3.0)]);
        let ssfun = |p: &ParameterValues, _: &()| {
            if p["k"] <= 0.0 {
                f64::NAN
            } else {
                (p["k"].ln() - 1.0).powi(2)
            }
        };
        let (best, _) = optimize(&ssfun, &(), &params, &OptimizeOptions::default()).unwrap();
        assert_abs_diff_eq!(best["k"], std::f64::consts::E, epsilon = 1e-3);
    }

    #[test]
    fn initial_values_must_be_in_bounds() {
        let params = ParameterSet::from(vec![Parameter::new("c", 7.0).with_bounds(0.0, 5.0)]);
        let ssfun = |_: &ParameterValues, _: &()| 0.0;
        let err = optimize(&ssfun, &(), &params, &OptimizeOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            SamplerError::Configuration(ConfigurationError::InitialOutOfBounds { .. })
        ));
    }

    #[test]
    fn objective_errors_are_returned_not_raised() {
        let params = ParameterSet::from(vec![Parameter::new("c", 1.0)]);
        let ssfun = TryObjective(|_: &ParameterValues, _: &()| -> Result<f64, ObjectiveError> {
            Err("no convergence".into())
        });
        let err = optimize(&ssfun, &(), &params, &OptimizeOptions::default()).unwrap_err();
        match err {
            SamplerError::Objective { iteration, source } => {
                assert_eq!(iteration, 0);
                assert_eq!(source.to_string(), "no convergence");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn objective_error_after_a_few_evaluations() {
        let calls = Cell::new(0);
        let params = ParameterSet::from(vec![Parameter::new("c", 1.0), Parameter::new("d", 1.0)]);
        let ssfun = TryObjective(|p: &ParameterValues, _: &()| -> Result<f64, ObjectiveError> {
            calls.set(calls.get() + 1);
            if calls.get() > 5 {
                return Err("solver diverged".into());
            }
            Ok(p["c"].powi(2) + p["d"].powi(2))
        });
        let err = optimize(&ssfun, &(), &params, &OptimizeOptions::default()).unwrap_err();
        assert!(matches!(err, SamplerError::Objective { iteration: 5, .. }), "{err}");
    }

    #[test]
    fn one_free_parameter_reaches_the_minimum() {
        let params = ParameterSet::from(vec![
            Parameter::new("a", 0.0).with_bounds(-10.0, 10.0),
            Parameter::new("b", 5.0).fixed(),
        ]);
        let ssfun = |p: &ParameterValues, _: &()| (p["a"] - 3.0).powi(2);
        for init in [0.0, 1.0] {
            let start: ParameterSet = params
                .iter()
                .map(|p| match p.name.as_str() {
                    "a" => Parameter { init, ..p.clone() },
                    _ => p.clone(),
                })
                .collect();
            let (best, result) =
                optimize(&ssfun, &(), &start, &OptimizeOptions::default()).unwrap();
            assert_abs_diff_eq!(best["a"], 3.0, epsilon = 1e-4);
            assert!(result.cost < 1e-8, "{result:?}");
            assert!(result.restarts > 0);
        }
    }

    #[test]
    fn nan_start_is_rejected() {
        let params = ParameterSet::from(vec![Parameter::new("c", f64::NAN)]);
        let ssfun = |_: &ParameterValues, _: &()| 0.0;
        let err = optimize(&ssfun, &(), &params, &OptimizeOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            SamplerError::Configuration(ConfigurationError::NonFiniteParameter { .. })
        ));
    }
}
