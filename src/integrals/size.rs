use crate::error::StarryProcessError;
use crate::harmonics::{index, legendre_polynomials, n_coeffs};
use crate::integrals::MomentIntegral;
use crate::quadrature::Quadrature;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Nodes of the radius quadrature per harmonic degree
const RADIUS_NODES_PER_DEGREE: usize = 4;

/// Moments of a single dark circular spot centred at the pole
///
/// The spot has unit depth inside angular radius $\rho$ and zero outside; $\rho$ is uniformly
/// distributed in $[r - d, r + d]$ (degrees). Only zonal ($m = 0$) coefficients are non-zero.
#[derive(Clone, Debug)]
pub struct SizeIntegral {
    ydeg: usize,
    r: f64,
    d: f64,
    first: Array1<f64>,
    second: Array2<f64>,
}

impl SizeIntegral {
    pub fn new(ydeg: usize, r: f64, d: f64) -> Result<Self, StarryProcessError> {
        StarryProcessError::check_bounds("r", r, f64::MIN_POSITIVE, 90.0)?;
        StarryProcessError::check_bounds("d", d, 0.0, f64::min(r, 90.0 - r))?;

        let (zonal_first, zonal_second) = if d == 0.0 {
            let b = Self::profile(ydeg, r.to_radians());
            let second = crate::linalg::outer(b.view(), b.view());
            (b, second)
        } else {
            let quadrature = Quadrature::gauss_legendre_on(
                RADIUS_NODES_PER_DEGREE * (ydeg + 1),
                (r - d).to_radians(),
                (r + d).to_radians(),
            );
            let norm = (2.0 * d).to_radians().recip();
            let mut first = Array1::<f64>::zeros(ydeg + 1);
            let mut second = Array2::<f64>::zeros((ydeg + 1, ydeg + 1));
            for (rho, w) in quadrature.iter() {
                let b = Self::profile(ydeg, rho);
                first.scaled_add(w * norm, &b);
                second.scaled_add(w * norm, &crate::linalg::outer(b.view(), b.view()));
            }
            (first, second)
        };

        let n = n_coeffs(ydeg);
        let mut first = Array1::<f64>::zeros(n);
        let mut second = Array2::<f64>::zeros((n, n));
        for l in 0..=ydeg {
            first[index(l, 0)] = zonal_first[l];
            for k in 0..=ydeg {
                second[[index(l, 0), index(k, 0)]] = zonal_second[[l, k]];
            }
        }
        log::trace!("size integral for r = {r}, d = {d}, ydeg = {ydeg}");

        Ok(Self {
            ydeg,
            r,
            d,
            first,
            second,
        })
    }

    /// Zonal coefficients of the spot of angular radius `rho` (radians)
    ///
    /// $b_0 = -(1 - \cos\rho) / 2$, $b_l = -(P_{l-1}(\cos\rho) - P_{l+1}(\cos\rho)) / (2\sqrt{2l+1})$.
    pub fn profile(ydeg: usize, rho: f64) -> Array1<f64> {
        let p = legendre_polynomials(ydeg + 1, rho.cos());
        (0..=ydeg)
            .map(|l| {
                if l == 0 {
                    -0.5 * (1.0 - p[1])
                } else {
                    -(p[l - 1] - p[l + 1]) / (2.0 * f64::sqrt((2 * l + 1) as f64))
                }
            })
            .collect()
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn d(&self) -> f64 {
        self.d
    }
}

impl MomentIntegral for SizeIntegral {
    fn ydeg(&self) -> usize {
        self.ydeg
    }

    fn first_moment(&self) -> ArrayView1<'_, f64> {
        self.first.view()
    }

    fn second_moment(&self) -> ArrayView2<'_, f64> {
        self.second.view()
    }
}
