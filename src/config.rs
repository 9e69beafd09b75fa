use crate::error::StarryProcessError;
use crate::integrals::LatitudeSettings;

use macro_const::macro_const;
use ndarray::{Array1, Array2};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Smallest supported spherical harmonic degree
pub const MIN_YDEG: usize = 5;

const DEFAULT_A: f64 = 0.40;
const DEFAULT_B: f64 = 0.27;

macro_const! {
    const DOC: &str = r##"
Hyperparameters of the spot population and settings of the process

Spot radius is uniform in `[r - d, r + d]` degrees. Spot latitude is given either by the
normalized log-shapes `a` and `b` of its Beta distribution in cosine, or by its mode `mu` and width
`sigma` in degrees; the two forms are mutually exclusive. Each of `n` spots has contrast `c`.

- `u`: limb-darkening coefficients, at most `udeg` of them
- `ydeg`: spherical harmonic degree, at least 5
- `normalized`: light curves are divided by their own mean
- `marginalize_over_inclination`: inclination is isotropic instead of given per call
- `covpts`: number of phase lags tabulating the inclination-marginalized kernel
- `normalization_order`, `normalization_zmax`: series order and largest expansion parameter
  of the normalized covariance
- `seed`: seed of the random generator used for sampling

Missing fields take their default values:

```
use starry_process::Hyperparameters;

let json = r#"{"r": 15.0, "mu": 30.0, "sigma": 5.0}"#;
let hyper: Hyperparameters = serde_json::from_str(json).unwrap();
assert_eq!(hyper.r, 15.0);
assert_eq!(hyper.ydeg, 15);
assert_eq!(hyper.a, None);
```
"##;
}

#[doc = DOC!()]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Hyperparameters {
    pub r: f64,
    pub d: f64,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub mu: Option<f64>,
    pub sigma: Option<f64>,
    pub c: f64,
    pub n: f64,
    pub u: Vec<f64>,
    pub udeg: usize,
    pub ydeg: usize,
    pub normalized: bool,
    pub marginalize_over_inclination: bool,
    pub covpts: usize,
    pub normalization_order: usize,
    pub normalization_zmax: f64,
    #[serde(flatten)]
    pub latitude: LatitudeSettings,
    pub seed: u64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            r: 20.0,
            d: 5.0,
            a: None,
            b: None,
            mu: None,
            sigma: None,
            c: 0.1,
            n: 10.0,
            u: vec![0.0, 0.0],
            udeg: 2,
            ydeg: 15,
            normalized: true,
            marginalize_over_inclination: false,
            covpts: 300,
            normalization_order: 20,
            normalization_zmax: 0.023,
            latitude: LatitudeSettings::default(),
            seed: 0,
        }
    }
}

/// Resolved parametrization of the latitude distribution
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LatitudeShape {
    Beta { a: f64, b: f64 },
    ModeAndWidth { mu: f64, sigma: f64 },
}

impl Hyperparameters {
    pub const fn doc() -> &'static str {
        DOC
    }

    /// Pick the latitude parametrization
    ///
    /// Without `mu` and `sigma` the given `a` and `b` are used, missing ones are defaulted. Both
    /// `mu` and `sigma` without any of `a` and `b` give the mode-and-width form. Anything else is
    /// ambiguous.
    pub fn latitude_shape(&self) -> Result<LatitudeShape, StarryProcessError> {
        match (self.a, self.b, self.mu, self.sigma) {
            (a, b, None, None) => Ok(LatitudeShape::Beta {
                a: a.unwrap_or(DEFAULT_A),
                b: b.unwrap_or(DEFAULT_B),
            }),
            (None, None, Some(mu), Some(sigma)) => Ok(LatitudeShape::ModeAndWidth { mu, sigma }),
            _ => Err(StarryProcessError::AmbiguousLatitude),
        }
    }

    pub(crate) fn check_ydeg(&self) -> Result<(), StarryProcessError> {
        if self.ydeg < MIN_YDEG {
            return Err(StarryProcessError::DegreeTooLow {
                actual: self.ydeg,
                minimum: MIN_YDEG,
            });
        }
        Ok(())
    }
}

/// Viewing geometry of the star
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Geometry {
    /// Inclination of the rotation axis to the line of sight, degrees
    pub i: f64,
    /// Rotation period, in the units of time
    pub p: f64,
}

impl Geometry {
    pub fn new(i: f64, p: f64) -> Self {
        Self { i, p }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self { i: 60.0, p: 1.0 }
    }
}

/// Gaussian prior on the unknown flux baseline shared by a whole light curve
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Baseline {
    pub mean: f64,
    pub var: f64,
}

impl Baseline {
    pub fn new(mean: f64, var: f64) -> Self {
        Self { mean, var }
    }
}

/// Covariance of the photometric errors
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Covariance {
    /// Same variance for every observation
    Scalar(f64),
    /// Independent variance per observation
    Diagonal(Array1<f64>),
    Full(Array2<f64>),
}

impl Covariance {
    /// Dense `k` by `k` matrix
    pub fn to_matrix(&self, k: usize) -> Result<Array2<f64>, StarryProcessError> {
        match self {
            Self::Scalar(var) => Ok(Array2::<f64>::eye(k) * *var),
            Self::Diagonal(var) => {
                StarryProcessError::check_shape("data_cov", var.shape(), &[k])?;
                Ok(Array2::from_diag(var))
            }
            Self::Full(cov) => {
                StarryProcessError::check_shape("data_cov", cov.shape(), &[k, k])?;
                Ok(cov.clone())
            }
        }
    }
}

impl From<f64> for Covariance {
    fn from(var: f64) -> Self {
        Self::Scalar(var)
    }
}

impl From<Array1<f64>> for Covariance {
    fn from(var: Array1<f64>) -> Self {
        Self::Diagonal(var)
    }
}

impl From<Array2<f64>> for Covariance {
    fn from(cov: Array2<f64>) -> Self {
        Self::Full(cov)
    }
}
