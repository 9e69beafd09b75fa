use crate::error::StarryProcessError;
use crate::integrals::MomentIntegral;
use crate::linalg::outer;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Moments of the sum of $n$ independent spots of contrast $c$
///
/// With single-spot moments $e = E[y]$ and $E = E[y y^T]$ of a unit-depth spot:
///
/// $$
/// \mu = n c e, \qquad
/// \Sigma = n c^2 (E - e e^T) + n \max(n - 1, 0)\, c^2 e e^T.
/// $$
///
/// The spot count $n$ is a continuous rate: the covariance is linear in $n$ up to one spot and
/// grows quadratically above it.
#[derive(Clone, Debug)]
pub struct ContrastIntegral<C> {
    child: C,
    c: f64,
    n: f64,
    mean: Array1<f64>,
    cov: Array2<f64>,
    second: Array2<f64>,
}

impl<C> ContrastIntegral<C>
where
    C: MomentIntegral,
{
    pub fn new(child: C, c: f64, n: f64) -> Result<Self, StarryProcessError> {
        StarryProcessError::check_bounds("c", c, f64::MIN_POSITIVE, 1.0)?;
        StarryProcessError::check_bounds("n", n, f64::MIN_POSITIVE, f64::INFINITY)?;

        let e = child.first_moment();
        let ee = outer(e, e);
        let mean = &e * (n * c);
        let mut cov = (&child.second_moment() - &ee) * (n * c * c);
        cov.scaled_add(n * f64::max(n - 1.0, 0.0) * c * c, &ee);
        let second = &cov + &outer(mean.view(), mean.view());
        log::trace!("contrast integral for c = {c}, n = {n}");

        Ok(Self {
            child,
            c,
            n,
            mean,
            cov,
            second,
        })
    }
}

impl<C> ContrastIntegral<C> {
    pub fn child(&self) -> &C {
        &self.child
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn n(&self) -> f64 {
        self.n
    }
}

impl<C> MomentIntegral for ContrastIntegral<C>
where
    C: MomentIntegral,
{
    fn ydeg(&self) -> usize {
        self.child.ydeg()
    }

    fn first_moment(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    fn second_moment(&self) -> ArrayView2<'_, f64> {
        self.second.view()
    }

    fn mean(&self) -> Array1<f64> {
        self.mean.clone()
    }

    fn cov(&self) -> Array2<f64> {
        self.cov.clone()
    }
}
