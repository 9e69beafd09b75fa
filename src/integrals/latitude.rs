use crate::error::StarryProcessError;
use crate::harmonics::{LatitudeTilt, degrees_orders, index, n_coeffs, rotate_rows, zonal_rotation};
use crate::integrals::MomentIntegral;
use crate::quadrature::Quadrature;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use num_traits::Float;
use rand::Rng;
use rand_distr::{Beta, Distribution};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Harmonic degrees above this one get extra diagonal stabilization
const STABILIZATION_DEGREE: usize = 15;

/// Bracket of the mode search, radians
const MODE_SEARCH_MARGIN: f64 = 1e-10;
const MODE_SEARCH_ITERATIONS: usize = 200;

/// Fixed settings of the latitude distribution
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LatitudeSettings {
    /// $\ln\alpha$ corresponding to $a = 1$
    pub log_alpha_max: f64,
    /// $\ln\beta$ corresponding to $b = 1$
    pub log_beta_max: f64,
    /// Largest width (degrees) for which [LatitudeIntegral::log_jac] is finite
    pub sigma_max: f64,
    /// Added to every diagonal entry of the second moment
    pub epsy: f64,
    /// Additionally added to diagonal entries of degree above 15
    pub epsy15: f64,
}

impl Default for LatitudeSettings {
    fn default() -> Self {
        Self {
            log_alpha_max: 10.0,
            log_beta_max: 10.0,
            sigma_max: 45.0,
            epsy: 1e-12,
            epsy15: 1e-9,
        }
    }
}

impl LatitudeSettings {
    fn validate(&self) -> Result<(), StarryProcessError> {
        // exp(700) is still finite
        StarryProcessError::check_bounds(
            "log_alpha_max",
            self.log_alpha_max,
            f64::MIN_POSITIVE,
            700.0,
        )?;
        StarryProcessError::check_bounds(
            "log_beta_max",
            self.log_beta_max,
            f64::MIN_POSITIVE,
            700.0,
        )?;
        StarryProcessError::check_bounds("sigma_max", self.sigma_max, 0.0, f64::INFINITY)?;
        StarryProcessError::check_bounds("epsy", self.epsy, 0.0, f64::INFINITY)?;
        StarryProcessError::check_bounds("epsy15", self.epsy15, 0.0, f64::INFINITY)?;
        Ok(())
    }
}

/// Moments of the child spot moved to a random latitude
///
/// The cosine of the spot latitude $\lambda$ is Beta($\alpha$, $\beta$) distributed, with
/// $\alpha = \exp(a \ln\alpha_\mathrm{max})$ and $\beta = \exp(b \ln\beta_\mathrm{max})$, and the
/// sign of the latitude is equally likely to be positive or negative.
///
/// For each node $x_k$ of the Gauss-Jacobi rule of the Beta distribution an axisymmetric child
/// is carried to latitude $\arccos x_k$ by the Wigner-D column $D^l_{m0}$, so the first moment is
/// $\sum_k w_k\, e_l D^l_{m0}(x_k)$ and the second is
/// $\sum_k w_k\, E_{l l'} D^l_{m0}(x_k) D^{l'}_{m'0}(x_k)$. Both are polynomials of degree
/// $\le 2\,\mathrm{ydeg}$ in $x$, so `ydeg + 2` nodes make the integral exact. The north-south
/// symmetry zeroes terms of odd total $l + m$.
///
/// A child with non-zonal moments is rotated by the full block-diagonal matrix of
/// [LatitudeTilt](crate::harmonics::LatitudeTilt) at both $\pm\lambda_k$, the parts odd in
/// $\sin\lambda$ cancel and the same rule stays exact.
#[derive(Clone, Debug)]
pub struct LatitudeIntegral<C> {
    child: C,
    a: f64,
    b: f64,
    alpha: f64,
    beta: f64,
    settings: LatitudeSettings,
    distribution: Beta<f64>,
    first: Array1<f64>,
    second: Array2<f64>,
}

impl<C> LatitudeIntegral<C>
where
    C: MomentIntegral,
{
    pub fn new(
        child: C,
        a: f64,
        b: f64,
        settings: LatitudeSettings,
    ) -> Result<Self, StarryProcessError> {
        settings.validate()?;
        StarryProcessError::check_bounds("a", a, 0.0, 1.0)?;
        StarryProcessError::check_bounds("b", b, 0.0, 1.0)?;
        let alpha = f64::exp(a * settings.log_alpha_max);
        let beta = f64::exp(b * settings.log_beta_max);
        let distribution = Beta::new(alpha, beta).map_err(|_| {
            let (mu, sigma) = beta2gauss(a, b, settings.log_alpha_max, settings.log_beta_max);
            StarryProcessError::UnrepresentableLatitude { mu, sigma }
        })?;

        let (first, second) = Self::moments(&child, alpha, beta, &settings);
        log::debug!(
            "latitude integral: a = {a}, b = {b}, alpha = {alpha}, beta = {beta}, {} nodes",
            child.ydeg() + 2
        );

        Ok(Self {
            child,
            a,
            b,
            alpha,
            beta,
            settings,
            distribution,
            first,
            second,
        })
    }

    /// Construct from the mode `mu` and width `sigma` of the latitude distribution, degrees
    ///
    /// See [gauss2beta].
    pub fn with_mode_and_width(
        child: C,
        mu: f64,
        sigma: f64,
        settings: LatitudeSettings,
    ) -> Result<Self, StarryProcessError> {
        StarryProcessError::check_bounds("mu", mu, 0.0, 90.0)?;
        StarryProcessError::check_bounds("sigma", sigma, f64::MIN_POSITIVE, f64::INFINITY)?;
        let (a, b) = gauss2beta(mu, sigma, settings.log_alpha_max, settings.log_beta_max);
        let representable = (0.0..=1.0).contains(&a) && (0.0..=1.0).contains(&b);
        if !representable {
            return Err(StarryProcessError::UnrepresentableLatitude { mu, sigma });
        }
        Self::new(child, a, b, settings)
    }

    fn moments(
        child: &C,
        alpha: f64,
        beta: f64,
        settings: &LatitudeSettings,
    ) -> (Array1<f64>, Array2<f64>) {
        let ydeg = child.ydeg();
        let child_first = child.first_moment();
        let child_second = child.second_moment();

        let quadrature = Quadrature::gauss_beta(ydeg + 2, alpha, beta);
        let (first, mut second) = if is_zonal(ydeg, child_first, child_second) {
            zonal_moments(ydeg, child_first, child_second, &quadrature)
        } else {
            tilted_moments(ydeg, child_first, child_second, &quadrature)
        };
        for (i, (l, _m)) in degrees_orders(ydeg).enumerate() {
            second[[i, i]] += settings.epsy;
            if l > STABILIZATION_DEGREE {
                second[[i, i]] += settings.epsy15;
            }
        }
        (first, second)
    }
}

/// Whether all moments with $m \ne 0$ vanish
fn is_zonal(ydeg: usize, first: ArrayView1<f64>, second: ArrayView2<f64>) -> bool {
    degrees_orders(ydeg)
        .enumerate()
        .filter(|(_, (_, m))| *m != 0)
        .all(|(i, _)| {
            first[i] == 0.0
                && second.row(i).iter().all(|&x| x == 0.0)
                && second.column(i).iter().all(|&x| x == 0.0)
        })
}

/// Moments of an axisymmetric child, carried to each latitude by [zonal_rotation]
fn zonal_moments(
    ydeg: usize,
    child_first: ArrayView1<f64>,
    child_second: ArrayView2<f64>,
    quadrature: &Quadrature,
) -> (Array1<f64>, Array2<f64>) {
    let n = n_coeffs(ydeg);
    let mut mean_rotation = Array1::<f64>::zeros(n);
    let mut weighted_rotations = Array2::<f64>::zeros((quadrature.len(), n));
    for ((x, w), mut row) in quadrature.iter().zip(weighted_rotations.rows_mut()) {
        let d = zonal_rotation(ydeg, f64::sqrt(f64::max(1.0 - x * x, 0.0)), x);
        mean_rotation.scaled_add(w, &d);
        row.assign(&(d * w.sqrt()));
    }
    let gram = weighted_rotations.t().dot(&weighted_rotations);

    let lm: Vec<_> = degrees_orders(ydeg).collect();
    let odd = |i: usize| (lm[i].0 as isize + lm[i].1).rem_euclid(2) == 1;

    let first = Array1::from_shape_fn(n, |i| {
        if odd(i) {
            0.0
        } else {
            child_first[index(lm[i].0, 0)] * mean_rotation[i]
        }
    });
    let second = Array2::from_shape_fn((n, n), |(i, j)| {
        if odd(i) != odd(j) {
            0.0
        } else {
            child_second[[index(lm[i].0, 0), index(lm[j].0, 0)]] * gram[[i, j]]
        }
    });
    (first, second)
}

/// Moments of an arbitrary child, rotated by [LatitudeTilt] at both signs of every latitude
fn tilted_moments(
    ydeg: usize,
    child_first: ArrayView1<f64>,
    child_second: ArrayView2<f64>,
    quadrature: &Quadrature,
) -> (Array1<f64>, Array2<f64>) {
    let n = n_coeffs(ydeg);
    let tilt = LatitudeTilt::new(ydeg);
    let mut first = Array1::<f64>::zeros(n);
    let mut second = Array2::<f64>::zeros((n, n));
    for (x, w) in quadrature.iter() {
        let sin_lat = f64::sqrt(f64::max(1.0 - x * x, 0.0));
        for sin_lat in [sin_lat, -sin_lat] {
            let blocks = tilt.blocks(sin_lat, x);
            let rotated_first = rotate_rows(&blocks, child_first.insert_axis(Axis(1)));
            first.scaled_add(0.5 * w, &rotated_first.column(0));
            let half_rotated = rotate_rows(&blocks, child_second);
            let rotated_second = rotate_rows(&blocks, half_rotated.t());
            second.scaled_add(0.5 * w, &rotated_second.t());
        }
    }
    (first, second)
}

impl<C> LatitudeIntegral<C> {
    pub fn child(&self) -> &C {
        &self.child
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    /// First shape parameter of the Beta distribution of $\cos\lambda$
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Second shape parameter of the Beta distribution of $\cos\lambda$
    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn settings(&self) -> &LatitudeSettings {
        &self.settings
    }

    /// Mode and Laplace width of the latitude distribution, degrees
    ///
    /// Both are NaN if the distribution has no mode inside $(0, 90)$ degrees.
    pub fn mode_and_width(&self) -> (f64, f64) {
        beta2gauss(
            self.a,
            self.b,
            self.settings.log_alpha_max,
            self.settings.log_beta_max,
        )
    }

    /// Probability density of latitude `lat` (degrees), per degree
    pub fn pdf(&self, lat: f64) -> f64 {
        if !(-90.0..=90.0).contains(&lat) {
            return 0.0;
        }
        let lat_rad = lat.to_radians();
        let x = lat_rad.cos();
        let ln_beta = libm::lgamma(self.alpha) + libm::lgamma(self.beta)
            - libm::lgamma(self.alpha + self.beta);
        let ln_pdf = x_ln_y(self.alpha - 1.0, x) + x_ln_y(self.beta - 1.0, 1.0 - x) - ln_beta;
        0.5 * lat_rad.sin().abs() * ln_pdf.exp() * 1.0_f64.to_radians()
    }

    /// Draw `n` latitudes, degrees
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Array1<f64> {
        Array1::from_shape_simple_fn(n, || {
            let lat = self.distribution.sample(rng).acos().to_degrees();
            if rng.random_bool(0.5) { lat } else { -lat }
        })
    }

    /// $\ln |\partial(\mu, \sigma) / \partial(a, b)|$ at the current $(a, b)$
    ///
    /// Add it to a log-likelihood sampled in $(a, b)$ to get a uniform prior on the mode $\mu$ and
    /// the width $\sigma$ of the latitude distribution. It is $-\infty$ if the distribution has no
    /// interior mode or if $\sigma$ exceeds `sigma_max`.
    pub fn log_jac(&self) -> f64 {
        let (mu, sigma) = self.mode_and_width();
        if mu.is_nan() || sigma.is_nan() || sigma > self.settings.sigma_max {
            return f64::NEG_INFINITY;
        }
        let k = 1.0_f64.to_radians();
        let (sin_mu, c) = mu.to_radians().sin_cos();
        let sigma = sigma.to_radians();
        let (la, lb) = (self.settings.log_alpha_max, self.settings.log_beta_max);

        let big_a = c * c / (1.0 + c) * (sigma.powi(-2) - 1.0 / (1.0 + c));
        let big_b = (1.0 - c) * big_a / c - c / (1.0 + c);

        let da_dc =
            c * (c + 2.0) / ((1.0 + c).powi(2) * sigma * sigma) - 2.0 * c / (1.0 + c).powi(3);
        let da_dsigma = -2.0 * c * c / ((1.0 + c) * sigma.powi(3));
        let db_dc = -big_a / (c * c) + (1.0 - c) / c * da_dc - (1.0 + c).powi(-2);
        let db_dsigma = (1.0 - c) / c * da_dsigma;
        let da_dmu = -sin_mu * da_dc;
        let db_dmu = -sin_mu * db_dc;

        let det = k * k / ((1.0 + big_a) * (1.0 + big_b) * la * lb)
            * (da_dmu * db_dsigma - da_dsigma * db_dmu);
        -det.abs().ln()
    }
}

impl<C> MomentIntegral for LatitudeIntegral<C>
where
    C: MomentIntegral,
{
    fn ydeg(&self) -> usize {
        self.child.ydeg()
    }

    fn first_moment(&self) -> ArrayView1<'_, f64> {
        self.first.view()
    }

    fn second_moment(&self) -> ArrayView2<'_, f64> {
        self.second.view()
    }
}

/// $x \ln y$ which is zero for $x = 0$
fn x_ln_y(x: f64, y: f64) -> f64 {
    if x == 0.0 { 0.0 } else { x * y.ln() }
}

fn cast<T: Float>(x: f64) -> T {
    T::from(x).unwrap_or_else(T::nan)
}

/// Map the mode `mu` and the width `sigma` (degrees) of the latitude distribution to $(a, b)$
///
/// The latitude density $\propto \sin\lambda \cos^{\alpha-1}\lambda (1 - \cos\lambda)^{\beta-1}$
/// is matched to a Gaussian at its mode: zero first derivative of the log-density at $\mu$ and
/// the second derivative equal to $-1/\sigma^2$. With $c = \cos\mu$,
/// $A = \alpha - 1 = \frac{c^2}{1+c}\left(\frac{1}{\sigma^2} - \frac{1}{1+c}\right)$ and
/// $B = \beta - 1 = \frac{1-c}{c} A - \frac{c}{1+c}$.
///
/// Values outside of $[0, 1]$ (or NaN) mean that such a distribution is not representable.
pub fn gauss2beta<T: Float>(mu: T, sigma: T, log_alpha_max: T, log_beta_max: T) -> (T, T) {
    let deg = cast::<T>(1.0_f64.to_radians());
    let one = T::one();
    let c = (mu * deg).cos();
    let sigma = sigma * deg;
    let big_a = c * c / (one + c) * (one / (sigma * sigma) - one / (one + c));
    let big_b = (one - c) * big_a / c - c / (one + c);
    (
        big_a.ln_1p() / log_alpha_max,
        big_b.ln_1p() / log_beta_max,
    )
}

/// Inverse of [gauss2beta]: mode and Laplace width (degrees) of the latitude distribution
///
/// The mode is found by bisection of the log-density derivative
/// $\cot\lambda - A\tan\lambda + B\cot(\lambda/2)$. Returns NaNs if it has no root inside
/// $(0, 90)$ degrees.
pub fn beta2gauss(a: f64, b: f64, log_alpha_max: f64, log_beta_max: f64) -> (f64, f64) {
    let big_a = f64::exp_m1(a * log_alpha_max);
    let big_b = f64::exp_m1(b * log_beta_max);
    let derivative =
        |lat: f64| 1.0 / lat.tan() - big_a * lat.tan() + big_b / (0.5 * lat).tan();

    let mut lo = MODE_SEARCH_MARGIN;
    let mut hi = FRAC_PI_2 - MODE_SEARCH_MARGIN;
    if !(derivative(lo) > 0.0 && derivative(hi) < 0.0) {
        return (f64::NAN, f64::NAN);
    }
    for _ in 0..MODE_SEARCH_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if derivative(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let mode = 0.5 * (lo + hi);
    let (s, c) = mode.sin_cos();
    let curvature = 1.0 / (s * s) + big_a / (c * c) + big_b / (1.0 - c);
    (mode.to_degrees(), curvature.sqrt().recip().to_degrees())
}
