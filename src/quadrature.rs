//! Gaussian quadrature rules
//!
//! Nodes and weights are found with the Golub-Welsch algorithm: the nodes are eigenvalues of the
//! symmetric tridiagonal Jacobi matrix of the orthogonal polynomial family and the weights are
//! squared first components of the normalized eigenvectors.

use itertools::Itertools;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array1;

/// Nodes and weights of a quadrature rule, nodes are sorted
#[derive(Clone, Debug)]
pub struct Quadrature {
    pub nodes: Array1<f64>,
    pub weights: Array1<f64>,
}

impl Quadrature {
    /// Gauss-Legendre rule with `n` nodes on $[-1, 1]$
    ///
    /// It is exact for polynomials up to degree $2n - 1$.
    pub fn gauss_legendre(n: usize) -> Self {
        let diag = vec![0.0; n];
        let offdiag = (1..n)
            .map(|k| {
                let k = k as f64;
                k / f64::sqrt(4.0 * k * k - 1.0)
            })
            .collect();
        Self::golub_welsch(diag, offdiag, 2.0)
    }

    /// Gauss-Legendre rule with `n` nodes on $[a, b]$
    pub fn gauss_legendre_on(n: usize, a: f64, b: f64) -> Self {
        let Self { nodes, weights } = Self::gauss_legendre(n);
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        Self {
            nodes: nodes.mapv(|x| mid + half * x),
            weights: weights * half,
        }
    }

    /// Gauss-Jacobi rule with `n` nodes for the Beta($\alpha$, $\beta$) density on $[0, 1]$
    ///
    /// Weights sum to unity, so [Quadrature::integrate] gives the expectation value. The rule is
    /// exact for polynomials up to degree $2n - 1$.
    pub fn gauss_beta(n: usize, alpha: f64, beta: f64) -> Self {
        // Jacobi weight (1 - y)^a (1 + y)^b on [-1, 1]
        let a = beta - 1.0;
        let b = alpha - 1.0;
        let diag = (0..n)
            .map(|k| {
                if k == 0 {
                    (b - a) / (a + b + 2.0)
                } else {
                    let s = 2.0 * (k as f64) + a + b;
                    (b * b - a * a) / (s * (s + 2.0))
                }
            })
            .collect();
        let offdiag = (1..n)
            .map(|k| {
                let beta_k = if k == 1 {
                    4.0 * (1.0 + a) * (1.0 + b) / ((2.0 + a + b).powi(2) * (3.0 + a + b))
                } else {
                    let k = k as f64;
                    let s = 2.0 * k + a + b;
                    4.0 * k * (k + a) * (k + b) * (k + a + b) / (s * s * (s + 1.0) * (s - 1.0))
                };
                beta_k.sqrt()
            })
            .collect();
        let Self { nodes, weights } = Self::golub_welsch(diag, offdiag, 1.0);
        Self {
            nodes: nodes.mapv(|y| 0.5 * (1.0 + y)),
            weights,
        }
    }

    fn golub_welsch(diag: Vec<f64>, offdiag: Vec<f64>, mu0: f64) -> Self {
        let n = diag.len();
        let jacobi = DMatrix::from_fn(n, n, |i, j| match i.abs_diff(j) {
            0 => diag[i],
            1 => offdiag[i.min(j)],
            _ => 0.0,
        });
        let eigen = SymmetricEigen::new(jacobi);
        let (nodes, weights): (Vec<_>, Vec<_>) = eigen
            .eigenvalues
            .iter()
            .zip(eigen.eigenvectors.row(0).iter())
            .map(|(&x, &v)| (x, mu0 * v * v))
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .unzip();
        Self {
            nodes: nodes.into(),
            weights: weights.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterator over (node, weight) pairs
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.nodes.iter().copied().zip(self.weights.iter().copied())
    }

    pub fn integrate(&self, f: impl Fn(f64) -> f64) -> f64 {
        self.iter().map(|(x, w)| w * f(x)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn beta_moment(j: i32, alpha: f64, beta: f64) -> f64 {
        (0..j)
            .map(|i| (alpha + i as f64) / (alpha + beta + i as f64))
            .product()
    }

    #[test]
    fn legendre_known_rule() {
        let q = Quadrature::gauss_legendre(2);
        let x = 1.0 / f64::sqrt(3.0);
        assert_abs_diff_eq!(q.nodes.as_slice().unwrap(), &[-x, x][..], epsilon = 1e-15);
        assert_abs_diff_eq!(q.weights.as_slice().unwrap(), &[1.0, 1.0][..], epsilon = 1e-15);
    }

    #[test]
    fn legendre_is_exact_for_polynomials() {
        let q = Quadrature::gauss_legendre(5);
        assert_relative_eq!(q.weights.sum(), 2.0, max_relative = 1e-14);
        assert_relative_eq!(q.integrate(|x| x.powi(8)), 2.0 / 9.0, max_relative = 1e-13);
        assert_abs_diff_eq!(q.integrate(|x| x.powi(9)), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn legendre_nodes_are_sorted_and_symmetric() {
        let q = Quadrature::gauss_legendre(11);
        assert!(q.nodes.iter().tuple_windows().all(|(a, b)| a < b));
        for (a, b) in q.nodes.iter().zip(q.nodes.iter().rev()) {
            assert_abs_diff_eq!(*a, -*b, epsilon = 1e-14);
        }
        assert_abs_diff_eq!(q.nodes[5], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn legendre_on_interval() {
        let q = Quadrature::gauss_legendre_on(4, 1.0, 3.0);
        assert!(q.nodes.iter().all(|&x| x > 1.0 && x < 3.0));
        // int_1^3 x^5 dx = (3^6 - 1) / 6
        assert_relative_eq!(
            q.integrate(|x| x.powi(5)),
            (729.0 - 1.0) / 6.0,
            max_relative = 1e-13
        );
    }

    #[test]
    fn beta_moments() {
        let (alpha, beta) = (2.0, 5.0);
        let q = Quadrature::gauss_beta(6, alpha, beta);
        assert_relative_eq!(q.weights.sum(), 1.0, max_relative = 1e-14);
        for j in 0..12 {
            assert_relative_eq!(
                q.integrate(|x| x.powi(j)),
                beta_moment(j, alpha, beta),
                max_relative = 1e-12,
            );
        }
    }

    #[test]
    fn uniform_beta_is_legendre() {
        let beta = Quadrature::gauss_beta(4, 1.0, 1.0);
        let legendre = Quadrature::gauss_legendre_on(4, 0.0, 1.0);
        assert_abs_diff_eq!(beta.nodes, legendre.nodes, epsilon = 1e-14);
        assert_abs_diff_eq!(beta.weights, legendre.weights, epsilon = 1e-14);
    }

    #[test]
    fn sharp_beta_concentrates_nodes() {
        let a = f64::exp(10.0);
        let q = Quadrature::gauss_beta(8, a, a);
        assert_relative_eq!(q.weights.sum(), 1.0, max_relative = 1e-12);
        assert_relative_eq!(q.integrate(|x| x), 0.5, max_relative = 1e-12);
        for j in 2..10 {
            assert_relative_eq!(
                q.integrate(|x| x.powi(j)),
                beta_moment(j, a, a),
                max_relative = 1e-10,
            );
        }
    }

    #[test]
    fn single_node() {
        let q = Quadrature::gauss_beta(1, 3.0, 1.0);
        assert_eq!(q.len(), 1);
        assert_relative_eq!(q.nodes[0], 0.75, max_relative = 1e-15);
        assert_relative_eq!(q.weights[0], 1.0, max_relative = 1e-15);
    }
}
