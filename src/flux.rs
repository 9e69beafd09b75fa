//! Projection of the spherical harmonic moments to light-curve moments

use crate::error::StarryProcessError;
use crate::harmonics::{legendre_polynomials, n_coeffs, tensordot_rz, ylm};
use crate::quadrature::Quadrature;
use crate::spline::CubicSpline;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use std::f64::consts::{PI, TAU};

/// Kernel of the light curve marginalized over an isotropic inclination
///
/// The spherical harmonic covariance is invariant to rotations about the stellar axis, so the
/// flux covariance depends only on the phase lag $\Delta$:
/// $K(\Delta) = E_i[r_0^T \Sigma R_z(\Delta) r_0]$. It is even and $2\pi$-periodic, tabulated on
/// `covpts` uniform lags over $[0, \pi]$ and interpolated by a clamped spline with zero end slopes.
#[derive(Clone, Debug)]
struct InclinationMarginal {
    kernel: CubicSpline,
    mean: f64,
    mean_var: f64,
}

impl InclinationMarginal {
    fn new(
        ydeg: usize,
        g: ArrayView1<f64>,
        mean_ylm: ArrayView1<f64>,
        cov_ylm: ArrayView2<f64>,
        covpts: usize,
    ) -> Self {
        // integrands are polynomials of degree <= 2 ydeg in cos(i)
        let quadrature = Quadrature::gauss_legendre_on(ydeg + 2, 0.0, 1.0);
        let mut rows = Array2::<f64>::zeros((quadrature.len(), n_coeffs(ydeg)));
        for (cos_i, mut row) in quadrature.nodes.iter().zip(rows.rows_mut()) {
            let sin_i = f64::sqrt(f64::max(1.0 - cos_i * cos_i, 0.0));
            row.assign(&observer_row(ydeg, g, *cos_i, sin_i));
        }
        let cov_rows = rows.dot(&cov_ylm);

        let node_means = rows.dot(&mean_ylm);
        let mean = quadrature.weights.dot(&node_means);
        let mean_var = quadrature.weights.dot(&node_means.mapv(|x| x * x)) - mean * mean;

        let lags: Vec<f64> = (0..covpts)
            .map(|k| PI * (k as f64) / ((covpts - 1) as f64))
            .collect();
        let values: Vec<f64> = lags
            .iter()
            .map(|&lag| {
                let angles = Array1::from_elem(quadrature.len(), lag);
                let rotated = tensordot_rz(ydeg, rows.view(), angles.view());
                let per_node = (&rotated * &cov_rows).sum_axis(Axis(1));
                quadrature.weights.dot(&per_node)
            })
            .collect();
        log::debug!(
            "inclination-marginalized kernel tabulated on {covpts} lags with {} inclination nodes",
            quadrature.len()
        );

        Self {
            kernel: CubicSpline::clamped(lags, &values, 0.0, 0.0),
            mean,
            mean_var,
        }
    }

    fn kernel(&self, lag: f64) -> f64 {
        let x = lag.rem_euclid(TAU);
        let x = if x > PI { TAU - x } else { x };
        self.kernel.evaluate(x)
    }
}

/// Row $g_l Y_{lm}(i, 0)$ mapping coefficients to the flux seen from inclination $i$
fn observer_row(ydeg: usize, g: ArrayView1<f64>, cos_i: f64, sin_i: f64) -> Array1<f64> {
    let mut row = ylm(ydeg, cos_i, sin_i, 0.0);
    for l in 0..=ydeg {
        row.slice_mut(s![l * l..(l + 1) * (l + 1)])
            .mapv_inplace(|x| x * g[l]);
    }
    row
}

/// Disk-integration weights $g_l$ of the Legendre components of a map
///
/// $g_l = \int_0^1 P_l(\mu) \mu I(\mu) d\mu / \int_0^1 \mu I(\mu) d\mu$ with the polynomial
/// limb-darkening law $I(\mu) = 1 - \sum_k u_k (1 - \mu)^k$, so $g_0 = 1$.
pub fn limb_darkening_weights(ydeg: usize, u: &[f64]) -> Array1<f64> {
    let quadrature = Quadrature::gauss_legendre_on((ydeg + u.len()) / 2 + 2, 0.0, 1.0);
    let mut g = Array1::<f64>::zeros(ydeg + 1);
    for (mu, w) in quadrature.iter() {
        let darkening: f64 = u
            .iter()
            .zip(1..)
            .map(|(&u_k, k)| u_k * (1.0 - mu).powi(k))
            .sum();
        let weight = w * mu * (1.0 - darkening);
        for (g_l, p_l) in g.iter_mut().zip(legendre_polynomials(ydeg, mu)) {
            *g_l += weight * p_l;
        }
    }
    let norm = g[0];
    g / norm
}

/// Rotational phase $\varphi(t) = -2\pi t / p$
fn phases(t: ArrayView1<f64>, p: f64) -> Array1<f64> {
    t.mapv(|t| -TAU * t / p)
}

/// Linear map from the spherical harmonic moments to the light curve moments
///
/// The flux is relative to the unspotted star: the map $y_{00} = 1$ gives unit flux for any
/// geometry and limb darkening.
#[derive(Clone, Debug)]
pub struct FluxIntegral {
    ydeg: usize,
    u: Vec<f64>,
    g: Array1<f64>,
    covpts: usize,
    mean_ylm: Array1<f64>,
    cov_ylm: Array2<f64>,
    marginal: Option<InclinationMarginal>,
}

impl FluxIntegral {
    /// `u` holds up to `udeg` limb-darkening coefficients, missing ones are zero
    pub fn new(
        ydeg: usize,
        mean_ylm: Array1<f64>,
        cov_ylm: Array2<f64>,
        u: &[f64],
        udeg: usize,
        marginalize_over_inclination: bool,
        covpts: usize,
    ) -> Result<Self, StarryProcessError> {
        let n = n_coeffs(ydeg);
        StarryProcessError::check_shape("mean_ylm", mean_ylm.shape(), &[n])?;
        StarryProcessError::check_shape("cov_ylm", cov_ylm.shape(), &[n, n])?;
        if u.len() > udeg {
            return Err(StarryProcessError::TooManyLimbDarkeningCoefficients {
                actual: u.len(),
                udeg,
            });
        }
        if covpts < 2 {
            return Err(StarryProcessError::OutOfBounds {
                name: "covpts",
                value: covpts as f64,
                lower: 2.0,
                upper: f64::INFINITY,
            });
        }

        let mut u = u.to_vec();
        u.resize(udeg, 0.0);
        let g = limb_darkening_weights(ydeg, &u);
        let marginal = marginalize_over_inclination.then(|| {
            InclinationMarginal::new(ydeg, g.view(), mean_ylm.view(), cov_ylm.view(), covpts)
        });

        Ok(Self {
            ydeg,
            u,
            g,
            covpts,
            mean_ylm,
            cov_ylm,
            marginal,
        })
    }

    pub fn ydeg(&self) -> usize {
        self.ydeg
    }

    /// Limb-darkening coefficients, padded with zeros to `udeg`
    pub fn u(&self) -> &[f64] {
        &self.u
    }

    pub fn covpts(&self) -> usize {
        self.covpts
    }

    pub fn mean_ylm(&self) -> ArrayView1<'_, f64> {
        self.mean_ylm.view()
    }

    pub fn cov_ylm(&self) -> ArrayView2<'_, f64> {
        self.cov_ylm.view()
    }

    pub fn marginalize_over_inclination(&self) -> bool {
        self.marginal.is_some()
    }

    /// Disk-integration weights, see [limb_darkening_weights]
    pub fn limb_darkening_weights(&self) -> ArrayView1<'_, f64> {
        self.g.view()
    }

    fn check_geometry(i: f64, p: f64) -> Result<(), StarryProcessError> {
        StarryProcessError::check_bounds("i", i, 0.0, 180.0)?;
        StarryProcessError::check_bounds("p", p, f64::MIN_POSITIVE, f64::INFINITY)?;
        Ok(())
    }

    /// Flux of the map $y$ at times `t` is `A y` for this matrix $A$
    ///
    /// `i` is the inclination in degrees, `p` is the rotation period in the units of `t`.
    pub fn design_matrix(
        &self,
        t: ArrayView1<f64>,
        i: f64,
        p: f64,
    ) -> Result<Array2<f64>, StarryProcessError> {
        Self::check_geometry(i, p)?;
        let (sin_i, cos_i) = i.to_radians().sin_cos();
        let row = observer_row(self.ydeg, self.g.view(), cos_i, sin_i);
        let rows = Array2::from_shape_fn((t.len(), row.len()), |(_, j)| row[j]);
        Ok(tensordot_rz(self.ydeg, rows.view(), phases(t, p).view()))
    }

    /// Flux mean at times `t`; `i` is ignored when marginalizing over inclination
    pub fn mean(
        &self,
        t: ArrayView1<f64>,
        i: f64,
        p: f64,
    ) -> Result<Array1<f64>, StarryProcessError> {
        match &self.marginal {
            Some(marginal) => {
                Self::check_geometry(90.0, p)?;
                Ok(Array1::from_elem(t.len(), marginal.mean))
            }
            None => Ok(self.design_matrix(t, i, p)?.dot(&self.mean_ylm)),
        }
    }

    /// Flux covariance at times `t`; `i` is ignored when marginalizing over inclination
    pub fn cov(
        &self,
        t: ArrayView1<f64>,
        i: f64,
        p: f64,
    ) -> Result<Array2<f64>, StarryProcessError> {
        log::trace!("flux covariance for {} times", t.len());
        match &self.marginal {
            Some(marginal) => {
                Self::check_geometry(90.0, p)?;
                let phi = phases(t, p);
                Ok(Array2::from_shape_fn((t.len(), t.len()), |(a, b)| {
                    marginal.kernel(phi[b] - phi[a]) + marginal.mean_var
                }))
            }
            None => {
                let a = self.design_matrix(t, i, p)?;
                Ok(a.dot(&self.cov_ylm).dot(&a.t()))
            }
        }
    }
}
