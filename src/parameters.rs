/*!
Model parameters: names, starting values, bounds and whether each one is
sampled ("target") or held fixed.

```rust
use thetafit::parameters::{Parameter, ParameterSet};

let params = ParameterSet::from(vec![
    Parameter::new("k", 0.5).with_bounds(0.0, 10.0),
    Parameter::new("offset", 1.2).fixed(),
]);
assert_eq!(params.target_names(), vec!["k"]);
assert_eq!(params.initial_vector(), vec![0.5]);
```
*/

use crate::bounds::Bounds;
use crate::errors::ConfigurationError;

/// A single named model parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    /// Starting value for sampling, or the constant value if the parameter is fixed.
    pub init: f64,
    pub minimum: f64,
    pub maximum: f64,
    /// `true` if the parameter is sampled, `false` if it is held at `init`.
    pub target: bool,
}

impl Parameter {
    /// An unbounded target parameter.
    pub fn new(name: impl Into<String>, init: f64) -> Self {
        Self {
            name: name.into(),
            init,
            minimum: f64::NEG_INFINITY,
            maximum: f64::INFINITY,
            target: true,
        }
    }

    pub fn with_bounds(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum = minimum;
        self
    }

    pub fn with_maximum(mut self, maximum: f64) -> Self {
        self.maximum = maximum;
        self
    }

    /// Holds the parameter at its initial value.
    pub fn fixed(mut self) -> Self {
        self.target = false;
        self
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.minimum, self.maximum)
    }
}

/// Ordered collection of parameters. The order defines the column order of
/// the chain table and the order of the free-parameter vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, parameter: Parameter) {
        self.params.push(parameter);
    }

    pub fn with(mut self, parameter: Parameter) -> Self {
        self.push(parameter);
        self
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.params.iter()
    }

    /// Parameters that are sampled, in set order.
    pub fn targets(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.target)
    }

    /// Parameters held at their initial value, in set order.
    pub fn fixed(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.target)
    }

    pub fn n_targets(&self) -> usize {
        self.targets().count()
    }

    pub fn names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets().map(|p| p.name.as_str()).collect()
    }

    /// Initial values of the target parameters.
    pub fn initial_vector(&self) -> Vec<f64> {
        self.targets().map(|p| p.init).collect()
    }

    /// Bounds of the target parameters.
    pub fn bounds(&self) -> Vec<Bounds> {
        self.targets().map(Parameter::bounds).collect()
    }

    /// Checks that every target parameter starts at a finite value inside
    /// its bounds. Reports the first offending parameter.
    pub fn check_start(&self) -> Result<(), ConfigurationError> {
        for p in self.targets() {
            if !p.init.is_finite() || p.minimum.is_nan() || p.maximum.is_nan() {
                return Err(ConfigurationError::NonFiniteParameter {
                    name: p.name.clone(),
                });
            }
            if p.bounds().excludes(p.init) {
                return Err(ConfigurationError::InitialOutOfBounds {
                    name: p.name.clone(),
                    value: p.init,
                    minimum: p.minimum,
                    maximum: p.maximum,
                });
            }
        }
        Ok(())
    }
}

impl From<Vec<Parameter>> for ParameterSet {
    fn from(params: Vec<Parameter>) -> Self {
        Self { params }
    }
}

impl FromIterator<Parameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_set() -> ParameterSet {
        ParameterSet::new()
            .with(Parameter::new("a", 1.0).with_bounds(-10.0, 10.0))
            .with(Parameter::new("b", 5.0).fixed())
            .with(Parameter::new("c", 2.0).with_minimum(0.0))
    }

    #[test]
    fn defaults_are_unbounded_targets() {
        let p = Parameter::new("x", 0.3);
        assert!(p.target);
        assert_eq!(p.minimum, f64::NEG_INFINITY);
        assert_eq!(p.maximum, f64::INFINITY);
    }

    #[test]
    fn targets_keep_set_order() {
        let set = mixed_set();
        assert_eq!(set.names(), vec!["a", "b", "c"]);
        assert_eq!(set.target_names(), vec!["a", "c"]);
        assert_eq!(set.initial_vector(), vec![1.0, 2.0]);
        assert_eq!(
            set.bounds(),
            vec![Bounds::new(-10.0, 10.0), Bounds::new(0.0, f64::INFINITY)]
        );
        assert_eq!(set.fixed().map(|p| p.init).collect::<Vec<_>>(), vec![5.0]);
        assert_eq!(set.n_targets(), 2);
    }

    #[test]
    fn start_must_be_finite_and_inside_bounds() {
        assert_eq!(mixed_set().check_start(), Ok(()));

        let set = mixed_set().with(Parameter::new("d", 20.0).with_bounds(0.0, 1.0));
        assert!(matches!(
            set.check_start(),
            Err(ConfigurationError::InitialOutOfBounds { name, .. }) if name == "d"
        ));

        for bad in [
            Parameter::new("e", f64::NAN),
            Parameter::new("e", f64::INFINITY),
            Parameter::new("e", 0.5).with_minimum(f64::NAN),
            Parameter::new("e", 0.5).with_maximum(f64::NAN),
        ] {
            assert_eq!(
                mixed_set().with(bad).check_start(),
                Err(ConfigurationError::NonFiniteParameter { name: "e".into() })
            );
        }

        // Fixed parameters are passed through untouched.
        let set = mixed_set().with(Parameter::new("f", f64::NAN).fixed());
        assert_eq!(set.check_start(), Ok(()));
    }
}
