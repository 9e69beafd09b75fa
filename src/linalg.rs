//! Cholesky-based Gaussian linear algebra
//!
//! Factorizations and triangular solves are done by `nalgebra` on copies of the `ndarray`
//! inputs. Nothing here returns an error for a matrix which is not positive definite: the factor
//! is filled with NaN instead, and it propagates to every downstream result. Callers which need a
//! sentinel check the final value, see
//! [SpotProcess::log_likelihood](crate::SpotProcess::log_likelihood).

use nalgebra::{Cholesky, DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand_distr::StandardNormal;

fn to_dmatrix(a: ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn to_dvector(a: ArrayView1<f64>) -> DVector<f64> {
    DVector::from_iterator(a.len(), a.iter().copied())
}

fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn(m.shape(), |(i, j)| m[(i, j)])
}

fn from_dvector(v: &DVector<f64>) -> Array1<f64> {
    v.iter().copied().collect()
}

/// Lower Cholesky factor $L$ of a symmetric matrix $M = L L^T$
///
/// Only the lower triangle of `m` is read. A matrix which is not positive definite gives a factor
/// of NaN rather than a panic or an error.
pub fn cho_factor(m: ArrayView2<f64>) -> Array2<f64> {
    let n = m.nrows();
    debug_assert_eq!(n, m.ncols(), "matrix must be square");

    match Cholesky::new(to_dmatrix(m)) {
        Some(cholesky) => from_dmatrix(&cholesky.l()),
        None => {
            log::debug!("Cholesky factorization of a {n}x{n} matrix met a non-positive pivot");
            Array2::from_elem((n, n), f64::NAN)
        }
    }
}

/// Solve $L X = B$ for lower-triangular $L$
pub fn solve_lower(l: ArrayView2<f64>, b: ArrayView2<f64>) -> Array2<f64> {
    match to_dmatrix(l).solve_lower_triangular(&to_dmatrix(b)) {
        Some(x) => from_dmatrix(&x),
        None => Array2::from_elem(b.raw_dim(), f64::NAN),
    }
}

/// Solve $L x = b$ for lower-triangular $L$
pub fn solve_lower_vec(l: ArrayView2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    match to_dmatrix(l).solve_lower_triangular(&to_dvector(b)) {
        Some(x) => from_dvector(&x),
        None => Array1::from_elem(b.len(), f64::NAN),
    }
}

/// Solve $M X = B$ given the lower Cholesky factor $L$ of $M$
pub fn cho_solve(l: ArrayView2<f64>, b: ArrayView2<f64>) -> Array2<f64> {
    let l = to_dmatrix(l);
    match l
        .solve_lower_triangular(&to_dmatrix(b))
        .and_then(|y| l.tr_solve_lower_triangular(&y))
    {
        Some(x) => from_dmatrix(&x),
        None => Array2::from_elem(b.raw_dim(), f64::NAN),
    }
}

/// Solve $M x = b$ given the lower Cholesky factor $L$ of $M$
pub fn cho_solve_vec(l: ArrayView2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let l = to_dmatrix(l);
    match l
        .solve_lower_triangular(&to_dvector(b))
        .and_then(|y| l.tr_solve_lower_triangular(&y))
    {
        Some(x) => from_dvector(&x),
        None => Array1::from_elem(b.len(), f64::NAN),
    }
}

/// Inverse of $M$ given its lower Cholesky factor
pub fn cho_inverse(l: ArrayView2<f64>) -> Array2<f64> {
    cho_solve(l, Array2::<f64>::eye(l.nrows()).view())
}

/// $\ln\det M$ given the lower Cholesky factor of $M$
pub fn cho_ln_det(l: ArrayView2<f64>) -> f64 {
    2.0 * l.diag().iter().map(|x| x.ln()).sum::<f64>()
}

/// Gaussian log-density of a residual vector $r$ for covariance $M = L L^T$
///
/// $$
/// \ln p = -\frac12 r^T M^{-1} r - \frac12 \ln\det M - \frac{K}{2}\ln 2\pi.
/// $$
pub fn gaussian_ln_density(l: ArrayView2<f64>, residual: ArrayView1<f64>) -> f64 {
    let k = residual.len() as f64;
    let whitened = solve_lower_vec(l, residual);
    -0.5 * whitened.dot(&whitened) - 0.5 * cho_ln_det(l) - 0.5 * k * std::f64::consts::TAU.ln()
}

/// Outer product $a b^T$
pub fn outer(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Array2<f64> {
    let a = a.insert_axis(Axis(1));
    let b = b.insert_axis(Axis(0));
    a.dot(&b)
}

/// Draw `n_samples` vectors $\mu + L z$, $z \sim \mathcal{N}(0, I)$; one sample per row
pub fn sample_gaussian<R: Rng + ?Sized>(
    mean: ArrayView1<f64>,
    l: ArrayView2<f64>,
    n_samples: usize,
    rng: &mut R,
) -> Array2<f64> {
    let dim = mean.len();
    let z = Array2::from_shape_simple_fn((dim, n_samples), || rng.sample(StandardNormal));
    let mut samples = l.dot(&z).reversed_axes();
    samples += &mean;
    samples
}

#[cfg(test)]
#[allow(clippy::unreadable_literal)]
mod tests {
    use super::*;

    use crate::tests::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn spd_matrix() -> Array2<f64> {
        array![[4.0, 2.0, 0.4], [2.0, 5.0, 1.0], [0.4, 1.0, 3.0]]
    }

    #[test]
    fn factor_reproduces_matrix() {
        let m = spd_matrix();
        let l = cho_factor(m.view());
        assert_abs_diff_eq!(l.dot(&l.t()), m, epsilon = 1e-14);
        assert_eq!(l[[0, 1]], 0.0);
        assert_eq!(l[[0, 2]], 0.0);
        assert_eq!(l[[1, 2]], 0.0);
    }

    #[test]
    fn solve_gives_inverse() {
        let m = spd_matrix();
        let l = cho_factor(m.view());
        let inv = cho_inverse(l.view());
        assert_abs_diff_eq!(m.dot(&inv), Array2::<f64>::eye(3), epsilon = 1e-14);
    }

    #[test]
    fn vector_and_matrix_solves_agree() {
        let m = spd_matrix();
        let l = cho_factor(m.view());
        let b = array![1.0, -2.0, 0.5];
        let x = cho_solve_vec(l.view(), b.view());
        let x2 = cho_solve(l.view(), b.view().insert_axis(Axis(1)));
        assert_abs_diff_eq!(m.dot(&x), b, epsilon = 1e-14);
        assert_abs_diff_eq!(x, x2.column(0), epsilon = 1e-15);
    }

    #[test]
    fn lower_solve() {
        let l = array![[2.0, 0.0], [1.0, 4.0]];
        let b = array![[2.0, 4.0], [9.0, 6.0]];
        let x = solve_lower(l.view(), b.view());
        assert_abs_diff_eq!(l.dot(&x), b, epsilon = 1e-15);
    }

    #[test]
    fn not_positive_definite_gives_nan() {
        let m = array![[1.0, 2.0], [2.0, 1.0]];
        let l = cho_factor(m.view());
        assert!(l.iter().all(|x| x.is_nan()));
        let x = cho_solve_vec(l.view(), array![1.0, 1.0].view());
        assert!(x.iter().all(|x| x.is_nan()));
        let r = array![0.1, 0.2];
        assert!(gaussian_ln_density(l.view(), r.view()).is_nan());
    }

    #[test]
    fn nan_input_gives_nan_factor() {
        let mut m = spd_matrix();
        m[[2, 1]] = f64::NAN;
        let l = cho_factor(m.view());
        assert!(l.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn empty_matrix() {
        let m = Array2::<f64>::zeros((0, 0));
        let l = cho_factor(m.view());
        assert_eq!(l.shape(), &[0, 0]);
        let r = Array1::<f64>::zeros(0);
        assert_eq!(gaussian_ln_density(l.view(), r.view()), 0.0);
    }

    #[test]
    fn ln_density_matches_dense_reference() {
        let m = spd_matrix();
        let r = array![0.3, -1.2, 0.7];
        let l = cho_factor(m.view());
        let desired = starry_process_test_util::dense_gaussian_ln_density(m.view(), r.view());
        assert_abs_diff_eq!(gaussian_ln_density(l.view(), r.view()), desired, epsilon = 1e-12);
    }

    #[test]
    fn outer_product() {
        let a = array![1.0, 2.0];
        let b = array![3.0, 4.0, 5.0];
        assert_eq!(
            outer(a.view(), b.view()),
            array![[3.0, 4.0, 5.0], [6.0, 8.0, 10.0]]
        );
    }

    #[test]
    fn samples_have_requested_covariance() {
        const N: usize = 20000;
        let m = spd_matrix();
        let mean = array![1.0, -1.0, 0.0];
        let l = cho_factor(m.view());
        let mut rng = StdRng::seed_from_u64(0);
        let samples = sample_gaussian(mean.view(), l.view(), N, &mut rng);
        assert_eq!(samples.shape(), &[N, 3]);
        let sample_mean = samples.mean_axis(Axis(0)).unwrap();
        assert_abs_diff_eq!(sample_mean, mean, epsilon = 0.05);
        let centered = &samples - &sample_mean;
        let sample_cov = centered.t().dot(&centered) / (N as f64 - 1.0);
        assert_abs_diff_eq!(sample_cov, m, epsilon = 0.15);
    }
}
