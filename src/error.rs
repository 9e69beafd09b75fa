/// Error returned from [crate::StarryProcess] construction and its operations
///
/// Only configuration problems are reported as errors. Numerical degeneracy (non-positive-definite
/// covariance, divergent normalization series) never is: it propagates as NaN or infinite values
/// and ends up as `-inf` log-likelihood.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StarryProcessError {
    #[error("must provide either `a` and `b` *or* `mu` and `sigma`")]
    AmbiguousLatitude,

    #[error("parameter `{name}` = {value} is out of bounds [{lower}, {upper}]")]
    OutOfBounds {
        name: &'static str,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error(
        "latitude distribution with mode {mu} deg and width {sigma} deg cannot be represented by the Beta distribution"
    )]
    UnrepresentableLatitude { mu: f64, sigma: f64 },

    #[error("spherical harmonic degree {actual} is smaller than the minimum supported degree {minimum}")]
    DegreeTooLow { actual: usize, minimum: usize },

    #[error("limb darkening has {actual} coefficients, but its degree is {udeg}")]
    TooManyLimbDarkeningCoefficients { actual: usize, udeg: usize },

    #[error("cannot add processes: mismatch in `{0}`")]
    Incompatible(&'static str),

    #[error("cannot sum an empty collection of processes")]
    EmptySum,

    #[error("not yet implemented: {0}")]
    Unimplemented(&'static str),

    #[error("{what} has shape {actual:?}, but {expected:?} is expected")]
    ShapeMismatch {
        what: &'static str,
        actual: Vec<usize>,
        expected: Vec<usize>,
    },
}

impl StarryProcessError {
    /// Check that `value` lies within closed interval `[lower, upper]`
    pub(crate) fn check_bounds(
        name: &'static str,
        value: f64,
        lower: f64,
        upper: f64,
    ) -> Result<f64, Self> {
        // NaN fails both comparisons, so it is out of bounds too
        if value >= lower && value <= upper {
            Ok(value)
        } else {
            Err(Self::OutOfBounds {
                name,
                value,
                lower,
                upper,
            })
        }
    }

    pub(crate) fn check_shape(
        what: &'static str,
        actual: &[usize],
        expected: &[usize],
    ) -> Result<(), Self> {
        if actual == expected {
            Ok(())
        } else {
            Err(Self::ShapeMismatch {
                what,
                actual: actual.to_vec(),
                expected: expected.to_vec(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert_eq!(
            StarryProcessError::check_bounds("c", 1.0, 0.0, 1.0),
            Ok(1.0)
        );
        assert_eq!(
            StarryProcessError::check_bounds("c", 0.0, 0.0, 1.0),
            Ok(0.0)
        );
    }

    #[test]
    fn nan_is_out_of_bounds() {
        assert!(StarryProcessError::check_bounds("r", f64::NAN, 0.0, 90.0).is_err());
    }

    #[test]
    fn error_message_names_parameter() {
        let err = StarryProcessError::check_bounds("n", -1.0, 0.0, f64::INFINITY).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter `n` = -1 is out of bounds [0, inf]"
        );
    }
}
