//! Slow but straightforward numerics to check `starry-process` against

use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::f64::consts::{FRAC_PI_2, PI};

/// Gauss-Legendre nodes and weights on $[a, b]$, found by Newton iterations
pub fn gauss_legendre(n: usize, a: f64, b: f64) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let half_length = 0.5 * (b - a);
    let center = 0.5 * (b + a);
    for i in 0..n.div_ceil(2) {
        let mut x = f64::cos(PI * (i as f64 + 0.75) / (n as f64 + 0.5));
        for _ in 0..100 {
            let (p, dp) = legendre_with_derivative(n, x);
            let step = p / dp;
            x -= step;
            if step.abs() < 1e-16 {
                break;
            }
        }
        let (_, derivative) = legendre_with_derivative(n, x);
        let w = 2.0 / ((1.0 - x * x) * derivative * derivative);
        nodes[i] = center - half_length * x;
        nodes[n - 1 - i] = center + half_length * x;
        weights[i] = half_length * w;
        weights[n - 1 - i] = half_length * w;
    }
    (nodes, weights)
}

fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let (mut p0, mut p1) = (1.0, x);
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    let n = n as f64;
    (p1, n * (x * p1 - p0) / (x * x - 1.0))
}

/// Associated Legendre function $P_l^m(x)$ without the Condon-Shortley phase
///
/// $\sqrt{1 - x^2}$ is passed as `s`.
fn associated_legendre(l: usize, m: usize, x: f64, s: f64) -> f64 {
    let mut p_mm = 1.0;
    for k in 1..=m {
        p_mm *= (2 * k - 1) as f64 * s;
    }
    if l == m {
        return p_mm;
    }
    let mut p_prev = p_mm;
    let mut p = x * (2 * m + 1) as f64 * p_mm;
    for k in m + 2..=l {
        let next = ((2 * k - 1) as f64 * x * p - (k + m - 1) as f64 * p_prev) / (k - m) as f64;
        p_prev = p;
        p = next;
    }
    p
}

/// $4\pi$-normalized real harmonic $Y_{lm}$ at colatitude $\theta$ and zero longitude
fn real_harmonic(l: usize, m: usize, cos_theta: f64, sin_theta: f64) -> f64 {
    let factorial_ratio: f64 = (l - m + 1..=l + m).map(|k| k as f64).product::<f64>().recip();
    let delta = if m == 0 { 1.0 } else { 2.0 };
    let norm = f64::sqrt(delta * (2 * l + 1) as f64 * factorial_ratio);
    norm * associated_legendre(l, m, cos_theta, sin_theta)
}

/// Zonal expansion carried from the pole to latitude `lat` (radians) at zero longitude
fn rotated_zonal(ydeg: usize, lat: f64, zonal: &[f64]) -> Array1<f64> {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let mut y = Array1::<f64>::zeros((ydeg + 1) * (ydeg + 1));
    for l in 0..=ydeg {
        for m in 0..=l {
            let d = real_harmonic(l, m, sin_lat, cos_lat) / f64::sqrt((2 * l + 1) as f64);
            y[l * l + l + m] = zonal[l] * d;
        }
    }
    y
}

/// First and second moments of an axisymmetric spot moved to a random latitude
///
/// The cosine of the latitude is Beta(`alpha`, `beta`) distributed and both hemispheres are
/// equally likely. `zonal_first[l]` and `zonal_second[[l, k]]` are the $m = 0$ moments of the spot
/// centered at the pole. Latitude integration is done by a dense Gauss-Legendre rule.
pub fn latitude_moments_reference(
    ydeg: usize,
    alpha: f64,
    beta: f64,
    zonal_first: &[f64],
    zonal_second: ArrayView2<f64>,
) -> (Array1<f64>, Array2<f64>) {
    const N_NODES: usize = 200;
    let n = (ydeg + 1) * (ydeg + 1);
    let (nodes, weights) = gauss_legendre(N_NODES, 0.0, FRAC_PI_2);
    let density = |lat: f64| {
        let x = f64::cos(lat);
        lat.sin() * x.powf(alpha - 1.0) * (1.0 - x).powf(beta - 1.0)
    };
    let norm: f64 = nodes
        .iter()
        .zip_eq(&weights)
        .map(|(&lat, &w)| w * density(lat))
        .sum();

    let mut first = Array1::<f64>::zeros(n);
    let mut second = Array2::<f64>::zeros((n, n));
    for (&lat, &w) in nodes.iter().zip_eq(&weights) {
        let w = 0.5 * w * density(lat) / norm;
        for signed_lat in [lat, -lat] {
            let ones = vec![1.0; ydeg + 1];
            let d = rotated_zonal(ydeg, signed_lat, &ones);
            first.scaled_add(w, &rotated_zonal(ydeg, signed_lat, zonal_first));
            for (i, j) in (0..n).cartesian_product(0..n) {
                let (l_i, l_j) = (degree(i), degree(j));
                second[[i, j]] += w * zonal_second[[l_i, l_j]] * d[i] * d[j];
            }
        }
    }
    (first, second)
}

/// All $4\pi$-normalized real harmonics at the unit vector `point`, $m < 0$ are the sine terms
fn real_harmonics_at(ydeg: usize, point: [f64; 3]) -> Array1<f64> {
    let [x, y, z] = point;
    let (sin_theta, phi) = (x.hypot(y), y.atan2(x));
    let mut values = Array1::<f64>::zeros((ydeg + 1) * (ydeg + 1));
    for l in 0..=ydeg {
        for m in 0..=l {
            let p = real_harmonic(l, m, z, sin_theta);
            let (sin, cos) = (m as f64 * phi).sin_cos();
            values[l * l + l + m] = p * cos;
            if m > 0 {
                values[l * l + l - m] = p * sin;
            }
        }
    }
    values
}

/// Dense matrix moving an expansion so that its pole lands at latitude `lat` and zero longitude
///
/// The matrix is projected on a product grid of Gauss-Legendre nodes in $\cos\theta$ and
/// uniform longitudes, which is exact for the degrees involved.
fn tilt_matrix(ydeg: usize, lat: f64) -> Array2<f64> {
    let n = (ydeg + 1) * (ydeg + 1);
    let n_phi = 2 * ydeg + 3;
    let (nodes, weights) = gauss_legendre(ydeg + 2, -1.0, 1.0);
    // rotation by theta = pi/2 - lat about the y axis
    let (sin_theta, cos_theta) = (FRAC_PI_2 - lat).sin_cos();
    let mut matrix = Array2::<f64>::zeros((n, n));
    for (&z, &w) in nodes.iter().zip_eq(&weights) {
        let rho = f64::sqrt(1.0 - z * z);
        for k in 0..n_phi {
            let phi = 2.0 * PI * k as f64 / n_phi as f64;
            let point = [rho * phi.cos(), rho * phi.sin(), z];
            let back = [
                cos_theta * point[0] - sin_theta * point[2],
                point[1],
                sin_theta * point[0] + cos_theta * point[2],
            ];
            let here = real_harmonics_at(ydeg, point);
            let there = real_harmonics_at(ydeg, back);
            let w = w / (2.0 * n_phi as f64);
            for (i, j) in (0..n).cartesian_product(0..n) {
                matrix[[i, j]] += w * here[i] * there[j];
            }
        }
    }
    matrix
}

/// First and second moments of an arbitrary spot moved to a random latitude
///
/// Same as [latitude_moments_reference], but `first` and `second` are full moments of the spot
/// centered at the pole and each latitude applies a dense rotation matrix.
pub fn tilted_moments_reference(
    ydeg: usize,
    alpha: f64,
    beta: f64,
    first: ArrayView1<f64>,
    second: ArrayView2<f64>,
) -> (Array1<f64>, Array2<f64>) {
    const N_NODES: usize = 100;
    let n = (ydeg + 1) * (ydeg + 1);
    let (nodes, weights) = gauss_legendre(N_NODES, 0.0, FRAC_PI_2);
    let density = |lat: f64| {
        let x = f64::cos(lat);
        lat.sin() * x.powf(alpha - 1.0) * (1.0 - x).powf(beta - 1.0)
    };
    let norm: f64 = nodes
        .iter()
        .zip_eq(&weights)
        .map(|(&lat, &w)| w * density(lat))
        .sum();

    let mut moved_first = Array1::<f64>::zeros(n);
    let mut moved_second = Array2::<f64>::zeros((n, n));
    for (&lat, &w) in nodes.iter().zip_eq(&weights) {
        let w = 0.5 * w * density(lat) / norm;
        for signed_lat in [lat, -lat] {
            let d = tilt_matrix(ydeg, signed_lat);
            moved_first.scaled_add(w, &d.dot(&first));
            moved_second.scaled_add(w, &d.dot(&second).dot(&d.t()));
        }
    }
    (moved_first, moved_second)
}

fn degree(i: usize) -> usize {
    let mut l = 0;
    while (l + 1) * (l + 1) <= i {
        l += 1;
    }
    l
}

/// Log-density of the zero-mean Gaussian with covariance `cov` at `x`
///
/// Uses the LU decomposition with partial pivoting, so it does not need `cov` to be positive
/// definite to be computed, just non-singular.
pub fn dense_gaussian_ln_density(cov: ArrayView2<f64>, x: ArrayView1<f64>) -> f64 {
    let k = x.len();
    let mut lu = cov.to_owned();
    let mut rhs = x.to_owned();
    let mut ln_det = 0.0;
    for col in 0..k {
        let pivot = (col..k)
            .max_by(|&a, &b| lu[[a, col]].abs().total_cmp(&lu[[b, col]].abs()))
            .unwrap();
        if pivot != col {
            for j in 0..k {
                lu.swap([col, j], [pivot, j]);
            }
            rhs.swap(col, pivot);
        }
        let diag = lu[[col, col]];
        ln_det += diag.abs().ln();
        for row in col + 1..k {
            let factor = lu[[row, col]] / diag;
            for j in col..k {
                lu[[row, j]] -= factor * lu[[col, j]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    let mut solution = Array1::<f64>::zeros(k);
    for row in (0..k).rev() {
        let tail: f64 = (row + 1..k).map(|j| lu[[row, j]] * solution[j]).sum();
        solution[row] = (rhs[row] - tail) / lu[[row, row]];
    }
    -0.5 * (x.dot(&solution) + ln_det + k as f64 * f64::ln(2.0 * PI))
}

/// Central-difference Jacobian, `[[i, j]]` is $\partial f_i / \partial x_j$
pub fn finite_difference_jacobian(
    f: impl Fn(&[f64]) -> Vec<f64>,
    x: &[f64],
    step: f64,
) -> Array2<f64> {
    let n_out = f(x).len();
    let mut jacobian = Array2::<f64>::zeros((n_out, x.len()));
    for j in 0..x.len() {
        let mut forward = x.to_vec();
        forward[j] += step;
        let mut backward = x.to_vec();
        backward[j] -= step;
        for (i, (a, b)) in f(&forward).into_iter().zip_eq(f(&backward)).enumerate() {
            jacobian[[i, j]] = (a - b) / (2.0 * step);
        }
    }
    jacobian
}

/// `n` equally spaced times from `start` to `end` inclusive
pub fn uniform_time_grid(start: f64, end: f64, n: usize) -> Array1<f64> {
    Array1::linspace(start, end, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrature_integrates_polynomials() {
        let (x, w) = gauss_legendre(5, 0.0, 2.0);
        let integral: f64 = x.iter().zip(&w).map(|(x, w)| w * x.powi(9)).sum();
        assert!((integral - 2.0_f64.powi(10) / 10.0).abs() < 1e-10);
    }

    #[test]
    fn tilt_matrix_carries_zonal_expansion() {
        const YDEG: usize = 4;
        let lat = 0.7;
        let zonal: Vec<f64> = (0..=YDEG).map(|l| 1.0 + l as f64).collect();
        let mut at_pole = Array1::<f64>::zeros((YDEG + 1) * (YDEG + 1));
        for l in 0..=YDEG {
            at_pole[l * l + l] = zonal[l];
        }
        let moved = tilt_matrix(YDEG, lat).dot(&at_pole);
        let desired = rotated_zonal(YDEG, lat, &zonal);
        for (a, b) in moved.iter().zip_eq(&desired) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn dense_density_of_diagonal_covariance() {
        let cov = Array2::from_diag(&Array1::from(vec![2.0, 0.5]));
        let x = Array1::from(vec![1.0, -1.0]);
        let desired = -0.5 * (0.5 + 2.0 + f64::ln(1.0) + 2.0 * f64::ln(2.0 * PI));
        assert!((dense_gaussian_ln_density(cov.view(), x.view()) - desired).abs() < 1e-14);
    }
}
