/*!
User objectives and the adapter that turns them into functions of the free
parameter vector.

An objective returns a sum of squares (or any −2·log-likelihood) for a full
set of named parameter values and the observed data. The sampler and the
optimizer only ever see the free parameters, so [`ObjectiveAdapter`]
resolves once which slot each free coordinate fills and keeps the fixed
values in place for every evaluation.

```rust
use thetafit::objective::{ObjectiveAdapter, ParameterValues};
use thetafit::parameters::{Parameter, ParameterSet};

let params = ParameterSet::from(vec![
    Parameter::new("a", 0.0),
    Parameter::new("b", 5.0).fixed(),
]);
let ssfun = |p: &ParameterValues, data: &Vec<f64>| {
    data.iter().map(|y| (y - p["a"] - p["b"]).powi(2)).sum::<f64>()
};
let data = vec![6.0, 6.0];
let adapter = ObjectiveAdapter::new(&ssfun, &data, &params).unwrap();
assert_eq!(adapter.evaluate(&[1.0]).unwrap(), 0.0);
```
*/

use std::collections::HashSet;
use std::ops::Index;
use std::sync::Arc;

use crate::errors::{ConfigurationError, ObjectiveError};
use crate::parameters::ParameterSet;

/// A sum-of-squares function of named parameters and data.
///
/// Any `Fn(&ParameterValues, &D) -> f64` is an objective. Objectives that can
/// fail for reasons other than numerics implement the trait directly or go
/// through [`TryObjective`].
pub trait Objective<D: ?Sized> {
    fn sum_of_squares(&self, params: &ParameterValues, data: &D) -> Result<f64, ObjectiveError>;
}

impl<D: ?Sized, F> Objective<D> for F
where
    F: Fn(&ParameterValues, &D) -> f64,
{
    fn sum_of_squares(&self, params: &ParameterValues, data: &D) -> Result<f64, ObjectiveError> {
        Ok(self(params, data))
    }
}

/// Wraps a fallible closure as an [`Objective`].
#[derive(Debug, Clone, Copy)]
pub struct TryObjective<F>(pub F);

impl<D: ?Sized, F> Objective<D> for TryObjective<F>
where
    F: Fn(&ParameterValues, &D) -> Result<f64, ObjectiveError>,
{
    fn sum_of_squares(&self, params: &ParameterValues, data: &D) -> Result<f64, ObjectiveError> {
        (self.0)(params, data)
    }
}

/// Full set of parameter values, addressable by name, in parameter-set order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValues {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl ParameterValues {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.position(name).map(|i| self.values[i])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl Index<&str> for ParameterValues {
    type Output = f64;

    /// Panics if no parameter is called `name`.
    fn index(&self, name: &str) -> &f64 {
        match self.position(name) {
            Some(i) => &self.values[i],
            None => panic!("no parameter named `{name}`"),
        }
    }
}

/// Projects an [`Objective`] onto the free-parameter vector.
pub struct ObjectiveAdapter<'a, O: ?Sized, D: ?Sized> {
    objective: &'a O,
    data: &'a D,
    names: Arc<[String]>,
    // free-vector position -> slot in `template`
    free_slots: Vec<usize>,
    template: Vec<f64>,
}

impl<'a, O, D> ObjectiveAdapter<'a, O, D>
where
    O: Objective<D> + ?Sized,
    D: ?Sized,
{
    /// Resolves the parameter schema. Fails if no parameter is a target or if
    /// a name is used twice.
    pub fn new(
        objective: &'a O,
        data: &'a D,
        params: &ParameterSet,
    ) -> Result<Self, ConfigurationError> {
        let mut seen = HashSet::new();
        for p in params {
            if !seen.insert(p.name.as_str()) {
                return Err(ConfigurationError::DuplicateName(p.name.clone()));
            }
        }

        let free_slots: Vec<usize> = params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.target)
            .map(|(i, _)| i)
            .collect();
        if free_slots.is_empty() {
            return Err(ConfigurationError::NoTargetParameters);
        }

        Ok(Self {
            objective,
            data,
            names: params.iter().map(|p| p.name.clone()).collect(),
            free_slots,
            template: params.iter().map(|p| p.init).collect(),
        })
    }

    /// Number of free parameters.
    pub fn dim(&self) -> usize {
        self.free_slots.len()
    }

    /// Names of the free parameters in free-vector order.
    pub fn free_names(&self) -> Vec<&str> {
        self.free_slots
            .iter()
            .map(|&slot| self.names[slot].as_str())
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub(crate) fn free_slots(&self) -> &[usize] {
        &self.free_slots
    }

    /// All parameters' initial values; fixed slots keep these in every evaluation.
    pub(crate) fn template(&self) -> &[f64] {
        &self.template
    }

    /// Merges `free` with the fixed values.
    pub fn expand(&self, free: &[f64]) -> ParameterValues {
        debug_assert_eq!(free.len(), self.free_slots.len());
        let mut values = self.template.clone();
        for (&slot, &x) in self.free_slots.iter().zip(free) {
            values[slot] = x;
        }
        ParameterValues {
            names: Arc::clone(&self.names),
            values,
        }
    }

    /// Evaluates the objective at the free vector `free`.
    pub fn evaluate(&self, free: &[f64]) -> Result<f64, ObjectiveError> {
        let params = self.expand(free);
        self.objective.sum_of_squares(&params, self.data)
    }
}
