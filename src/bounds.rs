//! Closed-interval bounds of the free parameters.

/// Closed interval `[minimum, maximum]` for a single free parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub minimum: f64,
    pub maximum: f64,
}

impl Bounds {
    pub fn new(minimum: f64, maximum: f64) -> Self {
        Self { minimum, maximum }
    }

    /// The whole real line.
    pub fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Whether `x` lies strictly outside the interval. Values equal to either
    /// bound are inside.
    #[inline]
    pub fn excludes(&self, x: f64) -> bool {
        x < self.minimum || x > self.maximum
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Returns `true` if any coordinate of `theta` lies outside its bounds.
///
/// `theta` and `bounds` are in free-vector order; extra entries on either
/// side are ignored.
pub fn is_out_of_bounds(theta: &[f64], bounds: &[Bounds]) -> bool {
    theta.iter().zip(bounds).any(|(&x, b)| b.excludes(x))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_values_are_inside() {
        let bounds = [Bounds::new(-1.0, 2.0), Bounds::new(0.0, 0.0)];
        assert!(!is_out_of_bounds(&[-1.0, 0.0], &bounds));
        assert!(!is_out_of_bounds(&[2.0, 0.0], &bounds));
        assert!(!is_out_of_bounds(&[0.5, 0.0], &bounds));
    }

    #[test]
    fn any_dimension_outside_flags() {
        let bounds = [Bounds::new(-1.0, 2.0), Bounds::new(0.0, 10.0)];
        for eps in [1e-12, 1e-6, 0.5, 100.0] {
            assert!(is_out_of_bounds(&[-1.0 - eps, 5.0], &bounds));
            assert!(is_out_of_bounds(&[2.0 + eps, 5.0], &bounds));
            assert!(is_out_of_bounds(&[0.0, 10.0 + eps], &bounds));
            assert!(is_out_of_bounds(&[0.0, -eps], &bounds));
        }
    }

    #[test]
    fn unbounded_accepts_everything_finite() {
        let bounds = [Bounds::default(); 3];
        assert!(!is_out_of_bounds(&[-1e300, 0.0, 1e300], &bounds));
        assert!(!is_out_of_bounds(
            &[f64::NEG_INFINITY, 0.0, f64::INFINITY],
            &bounds
        ));
    }
}
