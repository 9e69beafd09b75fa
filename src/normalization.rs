use crate::linalg::outer;

use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Covariance of a light curve divided by its own mean
///
/// For the flux $f = \mu (1 + \epsilon)$ with small Gaussian relative deviations, the covariance of
/// $f / \langle f \rangle$ is expanded in the powers of $z = \langle \Sigma \rangle / \mu^2$, where
/// $\langle \Sigma \rangle$ is the mean of all the covariance entries. The expansion is asymptotic:
/// it diverges for large $z$, so for $z$ above `zmax` the covariance is reported as infinite.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalization {
    zmax: f64,
    /// $(2n + 1)!!$ for $n = 0..=N$
    alpha_coeffs: Array1<f64>,
    /// Coefficients of $z^{n - 1}$ of $(\alpha - G^2) / z$ for $n = 1..=N$
    quotient_coeffs: Array1<f64>,
}

impl Normalization {
    /// `order` is the number of terms $N$ of the series
    pub fn new(order: usize, zmax: f64) -> Self {
        let odd_double_factorial =
            |n: usize| (1..=n).step_by(2).map(|k| k as f64).product::<f64>();
        // G(z) = sum (2n - 1)!! z^n, with (-1)!! = 1
        let g: Vec<f64> = (0..=order)
            .map(|n| if n == 0 { 1.0 } else { odd_double_factorial(2 * n - 1) })
            .collect();
        let alpha_coeffs: Array1<f64> = (0..=order)
            .map(|n| odd_double_factorial(2 * n + 1))
            .collect();
        let quotient_coeffs = (1..=order)
            .map(|n| {
                let g_squared: f64 = (0..=n).map(|k| g[k] * g[n - k]).sum();
                alpha_coeffs[n] - g_squared
            })
            .collect();
        Self {
            zmax,
            alpha_coeffs,
            quotient_coeffs,
        }
    }

    pub fn order(&self) -> usize {
        self.quotient_coeffs.len()
    }

    pub fn zmax(&self) -> f64 {
        self.zmax
    }

    /// Series coefficients $(\alpha(z), \beta(z))$
    ///
    /// $\alpha = E[(1 + \epsilon)^{-2}]$ and $\beta = (\alpha - G^2) / z - \alpha$ with
    /// $G = E[(1 + \epsilon)^{-1}]$ for $\epsilon \sim \mathcal{N}(0, z)$, both truncated at the
    /// order of the expansion.
    pub fn alpha_beta(&self, z: f64) -> (f64, f64) {
        let horner =
            |coeffs: &Array1<f64>| coeffs.iter().rev().fold(0.0, |acc, &c| acc * z + c);
        let alpha = horner(&self.alpha_coeffs);
        let beta = horner(&self.quotient_coeffs) - alpha;
        (alpha, beta)
    }

    /// Normalized covariance for the un-normalized covariance `sig` and mean flux `mu`
    ///
    /// With $q = \Sigma j / (K \langle \Sigma \rangle)$ and $p = j - q$, where $j$ is the vector of
    /// ones:
    ///
    /// $$
    /// \tilde\Sigma = \frac{\alpha}{\mu^2} \Sigma + z \left[(\alpha + \beta) p p^T - \alpha q q^T\right].
    /// $$
    pub fn normalize(&self, mu: f64, sig: ArrayView2<f64>) -> Array2<f64> {
        let k = sig.nrows();
        if k == 0 {
            return Array2::<f64>::zeros((0, 0));
        }
        let mean = sig.sum() / (k * k) as f64;
        let z = mean / (mu * mu);
        if z.is_nan() || z > self.zmax {
            log::debug!("normalization series diverges for z = {z}, zmax = {}", self.zmax);
            return Array2::from_elem(sig.raw_dim(), f64::INFINITY);
        }

        let q = sig.sum_axis(Axis(1)) / (k as f64 * mean);
        let p = 1.0 - &q;
        let (alpha, beta) = self.alpha_beta(z);
        let mut normalized = &sig * (alpha / (mu * mu));
        normalized.scaled_add(z * (alpha + beta), &outer(p.view(), p.view()));
        normalized.scaled_add(-z * alpha, &outer(q.view(), q.view()));
        normalized
    }
}
