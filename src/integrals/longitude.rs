use crate::harmonics::{degrees_orders, index};
use crate::integrals::MomentIntegral;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;

/// Moments of the child spot rotated to a uniformly distributed longitude
///
/// The average over rotations about $z$ is exact. In the complex exponential basis it only keeps
/// the diagonal $m = m'$ blocks; for the real harmonics this means the zonal block is unchanged,
/// couplings with $|m| \ne |m'|$ vanish and each $(\cos, \sin)$ pair block of order $m > 0$ is
/// replaced by its rotation-invariant part $\frac{1}{2}\begin{pmatrix} S_{cc} + S_{ss} & S_{cs} -
/// S_{sc} \\ S_{sc} - S_{cs} & S_{cc} + S_{ss} \end{pmatrix}$.
#[derive(Clone, Debug)]
pub struct LongitudeIntegral<C> {
    child: C,
    first: Array1<f64>,
    second: Array2<f64>,
}

impl<C> LongitudeIntegral<C>
where
    C: MomentIntegral,
{
    pub fn new(child: C) -> Self {
        let ydeg = child.ydeg();
        let lm: Vec<_> = degrees_orders(ydeg).collect();

        let child_first = child.first_moment();
        let first = Array1::from_shape_fn(lm.len(), |i| {
            if lm[i].1 == 0 { child_first[i] } else { 0.0 }
        });

        let s = child.second_moment();
        let second = Array2::from_shape_fn((lm.len(), lm.len()), |(i, j)| {
            let (l1, m1) = lm[i];
            let (l2, m2) = lm[j];
            if m1.abs() != m2.abs() {
                return 0.0;
            }
            if m1 == 0 {
                return s[[i, j]];
            }
            let m = m1.abs();
            let (c1, s1) = (index(l1, m), index(l1, -m));
            let (c2, s2) = (index(l2, m), index(l2, -m));
            match (m1 > 0, m2 > 0) {
                (true, true) | (false, false) => 0.5 * (s[[c1, c2]] + s[[s1, s2]]),
                (true, false) => 0.5 * (s[[c1, s2]] - s[[s1, c2]]),
                (false, true) => 0.5 * (s[[s1, c2]] - s[[c1, s2]]),
            }
        });
        log::trace!("longitude integral for ydeg = {ydeg}");

        Self {
            child,
            first,
            second,
        }
    }
}

impl<C> LongitudeIntegral<C> {
    pub fn child(&self) -> &C {
        &self.child
    }

    /// Probability density of longitude `lon` (degrees), per degree
    pub fn pdf(&self, lon: f64) -> f64 {
        if (-180.0..=180.0).contains(&lon) {
            1.0 / 360.0
        } else {
            0.0
        }
    }

    /// Draw `n` longitudes uniformly from $[-180, 180)$ degrees
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Array1<f64> {
        Array1::from_shape_simple_fn(n, || rng.random_range(-180.0..180.0))
    }
}

impl<C> MomentIntegral for LongitudeIntegral<C>
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
