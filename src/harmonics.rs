//! Real spherical harmonics and rotations about the $z$ axis
//!
//! Coefficient $(l, m)$ of a vector of degree `ydeg` lives at index $l^2 + l + m$. Harmonics are
//! normalized to $4\pi$ ($Y_{00} = 1$) without the Condon-Shortley phase; $m > 0$ terms go with
//! $\cos m\varphi$ and $m < 0$ terms with $\sin |m|\varphi$.

use crate::quadrature::Quadrature;
use crate::sin_cos::RecurrentSinCos;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip, s};
use std::f64::consts::TAU;

/// Number of coefficients of a degree-`ydeg` expansion
pub const fn n_coeffs(ydeg: usize) -> usize {
    (ydeg + 1) * (ydeg + 1)
}

/// Flat index of the $(l, m)$ coefficient
#[inline]
pub const fn index(l: usize, m: isize) -> usize {
    (l * l + l).wrapping_add_signed(m)
}

/// Degree and order of every coefficient, in storage order
pub fn degrees_orders(ydeg: usize) -> impl Iterator<Item = (usize, isize)> {
    (0..=ydeg).flat_map(|l| (-(l as isize)..=l as isize).map(move |m| (l, m)))
}

/// Legendre polynomials $P_0(x), \dots, P_{l_\mathrm{max}}(x)$
pub fn legendre_polynomials(lmax: usize, x: f64) -> Vec<f64> {
    let mut p = Vec::with_capacity(lmax + 1);
    p.push(1.0);
    if lmax >= 1 {
        p.push(x);
    }
    for l in 2..=lmax {
        let l_f = l as f64;
        let value = ((2.0 * l_f - 1.0) * x * p[l - 1] - (l_f - 1.0) * p[l - 2]) / l_f;
        p.push(value);
    }
    p
}

/// Associated Legendre functions normalized so that $\sum_m Y_{lm}^2 = 2l + 1$
///
/// Element `[l, m]` holds $\Pi_l^m(\cos\theta)$ for $0 \le m \le l$, the rest is zero. Both
/// $\cos\theta$ and $\sin\theta \ge 0$ are passed to keep full precision near the poles.
pub fn legendre_table(ydeg: usize, cos_theta: f64, sin_theta: f64) -> Array2<f64> {
    let x = cos_theta;
    let s = sin_theta;
    let mut p = Array2::<f64>::zeros((ydeg + 1, ydeg + 1));
    p[[0, 0]] = 1.0;
    for m in 0..=ydeg {
        let m_f = m as f64;
        match m {
            0 => {}
            1 => p[[1, 1]] = f64::sqrt(3.0) * s,
            _ => p[[m, m]] = f64::sqrt((2.0 * m_f + 1.0) / (2.0 * m_f)) * s * p[[m - 1, m - 1]],
        }
        if m < ydeg {
            p[[m + 1, m]] = f64::sqrt(2.0 * m_f + 3.0) * x * p[[m, m]];
        }
        for l in m + 2..=ydeg {
            let l_f = l as f64;
            let a = f64::sqrt(
                (2.0 * l_f - 1.0) * (2.0 * l_f + 1.0) / ((l_f - m_f) * (l_f + m_f)),
            );
            let b = f64::sqrt(
                (2.0 * l_f + 1.0) * (l_f + m_f - 1.0) * (l_f - m_f - 1.0)
                    / ((l_f - m_f) * (l_f + m_f) * (2.0 * l_f - 3.0)),
            );
            p[[l, m]] = a * x * p[[l - 1, m]] - b * p[[l - 2, m]];
        }
    }
    p
}

/// Real spherical harmonics $Y_{lm}(\theta, \varphi)$ for all $l \le$ `ydeg`
pub fn ylm(ydeg: usize, cos_theta: f64, sin_theta: f64, phi: f64) -> Array1<f64> {
    let p = legendre_table(ydeg, cos_theta, sin_theta);
    let mut y = Array1::<f64>::zeros(n_coeffs(ydeg));
    for (m, (sin, cos)) in RecurrentSinCos::multiples_of(phi).take(ydeg + 1).enumerate() {
        for l in m..=ydeg {
            y[index(l, m as isize)] = p[[l, m]] * cos;
            if m > 0 {
                y[index(l, -(m as isize))] = p[[l, m]] * sin;
            }
        }
    }
    y
}

/// Wigner-D column $D^l_{m0}$ carrying a zonal expansion from the pole to latitude $\lambda$
///
/// A vector with only $m = 0$ coefficients $z_l$ becomes $z_l D^l_{m0}$ at longitude zero, where
/// $D^l_{m0} = Y_{lm}(\pi/2 - \lambda, 0) / \sqrt{2l + 1}$.
pub fn zonal_rotation(ydeg: usize, sin_lat: f64, cos_lat: f64) -> Array1<f64> {
    let p = legendre_table(ydeg, sin_lat, cos_lat);
    let mut d = Array1::<f64>::zeros(n_coeffs(ydeg));
    for l in 0..=ydeg {
        let norm = f64::sqrt(2.0 * l as f64 + 1.0).recip();
        for m in 0..=l {
            d[index(l, m as isize)] = p[[l, m]] * norm;
        }
    }
    d
}

/// Harmonics at the unit vector `[x, y, z]`
fn ylm_at(ydeg: usize, [x, y, z]: [f64; 3]) -> Array1<f64> {
    ylm(ydeg, z, x.hypot(y), y.atan2(x))
}

/// Rotation carrying an arbitrary expansion from the pole to latitude $\lambda$ at longitude zero
///
/// It is the rotation about $y$ by the colatitude $\pi/2 - \lambda$, which mixes orders within
/// each degree only. Block $l$ is
/// $T^l_{m'm} = \frac{1}{4\pi} \oint Y_{lm'}(x)\, Y_{lm}(R^T x)\, d\Omega$, integrated exactly on
/// the product grid of `ydeg + 1` Gauss-Legendre nodes in $\cos\theta$ and `2 ydeg + 1` uniform
/// longitudes. The harmonics on the grid are evaluated once and reused for every latitude. Its
/// $m = 0$ columns are [zonal_rotation].
#[derive(Clone, Debug)]
pub struct LatitudeTilt {
    ydeg: usize,
    points: Vec<[f64; 3]>,
    /// Grid harmonics times the grid weights over $4\pi$, one point per row
    weighted: Array2<f64>,
}

impl LatitudeTilt {
    pub fn new(ydeg: usize) -> Self {
        let quadrature = Quadrature::gauss_legendre(ydeg + 1);
        let n_phi = 2 * ydeg + 1;
        let mut points = Vec::with_capacity(quadrature.len() * n_phi);
        let mut weights = Vec::with_capacity(quadrature.len() * n_phi);
        for (z, w) in quadrature.iter() {
            let rho = f64::sqrt(f64::max(1.0 - z * z, 0.0));
            for (sin, cos) in RecurrentSinCos::multiples_of(TAU / n_phi as f64).take(n_phi) {
                points.push([rho * cos, rho * sin, z]);
                // w 2pi / n_phi / 4pi
                weights.push(0.5 * w / n_phi as f64);
            }
        }
        let mut weighted = Array2::<f64>::zeros((points.len(), n_coeffs(ydeg)));
        for ((&point, &w), mut row) in points.iter().zip(&weights).zip(weighted.rows_mut()) {
            row.assign(&(ylm_at(ydeg, point) * w));
        }
        Self {
            ydeg,
            points,
            weighted,
        }
    }

    pub fn ydeg(&self) -> usize {
        self.ydeg
    }

    /// Blocks $T^l$ for $l = 0, \dots,$ `ydeg`, rows and columns ordered by $m$
    pub fn blocks(&self, sin_lat: f64, cos_lat: f64) -> Vec<Array2<f64>> {
        // R maps the pole to (cos lat, 0, sin lat)
        let (c, s) = (sin_lat, cos_lat);
        let mut rotated = Array2::<f64>::zeros(self.weighted.raw_dim());
        for (&[x, y, z], mut row) in self.points.iter().zip(rotated.rows_mut()) {
            row.assign(&ylm_at(self.ydeg, [c * x - s * z, y, s * x + c * z]));
        }
        (0..=self.ydeg)
            .map(|l| {
                let range = l * l..(l + 1) * (l + 1);
                let grid = self.weighted.slice(s![.., range.clone()]);
                grid.t().dot(&rotated.slice(s![.., range]))
            })
            .collect()
    }
}

/// Apply the block-diagonal matrix with `blocks` of consecutive degrees to the rows of `m`
pub fn rotate_rows(blocks: &[Array2<f64>], m: ArrayView2<f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros(m.raw_dim());
    for (l, block) in blocks.iter().enumerate() {
        let range = l * l..(l + 1) * (l + 1);
        out.slice_mut(s![range.clone(), ..])
            .assign(&block.dot(&m.slice(s![range, ..])));
    }
    out
}

/// Rotate the expansion in place by `angle` about $z$
///
/// The expanded function $f(\varphi)$ becomes $f(\varphi - \mathrm{angle})$.
pub fn rotate_z_in_place(ydeg: usize, mut v: ArrayViewMut1<f64>, angle: f64) {
    for (m, (sin, cos)) in RecurrentSinCos::multiples_of(angle)
        .enumerate()
        .skip(1)
        .take(ydeg)
    {
        for l in m..=ydeg {
            let i_cos = index(l, m as isize);
            let i_sin = index(l, -(m as isize));
            let (a, b) = (v[i_cos], v[i_sin]);
            v[i_cos] = a * cos - b * sin;
            v[i_sin] = a * sin + b * cos;
        }
    }
}

pub fn rotate_z(ydeg: usize, v: ArrayView1<f64>, angle: f64) -> Array1<f64> {
    let mut v = v.to_owned();
    rotate_z_in_place(ydeg, v.view_mut(), angle);
    v
}

/// Transposed [rotate_z], which is the rotation by `-angle`
pub fn rotate_z_adjoint(ydeg: usize, v: ArrayView1<f64>, angle: f64) -> Array1<f64> {
    rotate_z(ydeg, v, -angle)
}

/// Rotate every row `k` of `m` by `angles[k]`
pub fn tensordot_rz(ydeg: usize, m: ArrayView2<f64>, angles: ArrayView1<f64>) -> Array2<f64> {
    let mut m = m.to_owned();
    Zip::from(m.axis_iter_mut(Axis(0)))
        .and(angles)
        .for_each(|row, &angle| rotate_z_in_place(ydeg, row, angle));
    m
}

#[cfg(test)]
#[allow(clippy::unreadable_literal)]
mod tests {
    use super::*;

    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{Array, stack};
    use std::f64::consts::PI;

    fn direction(theta: f64, phi: f64, ydeg: usize) -> Array1<f64> {
        ylm(ydeg, theta.cos(), theta.sin(), phi)
    }

    #[test]
    fn indices() {
        assert_eq!(index(0, 0), 0);
        assert_eq!(index(1, -1), 1);
        assert_eq!(index(1, 1), 3);
        assert_eq!(index(3, -3), 9);
        let pairs: Vec<_> = degrees_orders(2).collect();
        assert_eq!(pairs.len(), n_coeffs(2));
        for (n, (l, m)) in pairs.into_iter().enumerate() {
            assert_eq!(index(l, m), n);
        }
    }

    #[test]
    fn legendre_polynomials_known_values() {
        let x = 0.3;
        let p = legendre_polynomials(3, x);
        assert_relative_eq!(p[2], 0.5 * (3.0 * x * x - 1.0), max_relative = 1e-15);
        assert_relative_eq!(p[3], 0.5 * (5.0 * x.powi(3) - 3.0 * x), max_relative = 1e-14);
    }

    #[test]
    fn low_degree_harmonics() {
        let (theta, phi) = (0.7_f64, 1.9_f64);
        let y = direction(theta, phi, 2);
        let s3 = f64::sqrt(3.0);
        assert_relative_eq!(y[index(0, 0)], 1.0);
        assert_relative_eq!(y[index(1, 0)], s3 * theta.cos(), max_relative = 1e-14);
        assert_relative_eq!(y[index(1, 1)], s3 * theta.sin() * phi.cos(), max_relative = 1e-14);
        assert_relative_eq!(y[index(1, -1)], s3 * theta.sin() * phi.sin(), max_relative = 1e-14);
        let y20 = f64::sqrt(5.0) * 0.5 * (3.0 * theta.cos().powi(2) - 1.0);
        assert_relative_eq!(y[index(2, 0)], y20, max_relative = 1e-14);
        let y22 = f64::sqrt(15.0) / 2.0 * theta.sin().powi(2) * (2.0 * phi).cos();
        assert_relative_eq!(y[index(2, 2)], y22, max_relative = 1e-14);
    }

    #[test]
    fn addition_theorem() {
        const YDEG: usize = 20;
        let a = direction(0.4, -2.0, YDEG);
        let b = direction(2.1, 0.9, YDEG);
        let cos_gamma =
            0.4_f64.cos() * 2.1_f64.cos() + 0.4_f64.sin() * 2.1_f64.sin() * (2.9_f64).cos();
        let p = legendre_polynomials(YDEG, cos_gamma);
        for (l, p_l) in p.iter().enumerate() {
            let dot: f64 = (-(l as isize)..=l as isize)
                .map(|m| a[index(l, m)] * b[index(l, m)])
                .sum();
            assert_abs_diff_eq!(dot, (2 * l + 1) as f64 * p_l, epsilon = 1e-11);
        }
    }

    #[test]
    fn harmonics_are_orthonormal_on_sphere() {
        const YDEG: usize = 4;
        // product Gauss-Legendre in cos(theta) and trapezoid in phi is exact here
        let q = crate::quadrature::Quadrature::gauss_legendre(YDEG + 1);
        let n_phi = 2 * YDEG + 1;
        let mut gram = Array2::<f64>::zeros((n_coeffs(YDEG), n_coeffs(YDEG)));
        for (x, w) in q.iter() {
            for k in 0..n_phi {
                let phi = 2.0 * PI * (k as f64) / (n_phi as f64);
                let y = ylm(YDEG, x, f64::sqrt(1.0 - x * x), phi);
                let weight = w * 2.0 * PI / (n_phi as f64);
                gram += &(crate::linalg::outer(y.view(), y.view()) * weight);
            }
        }
        assert_abs_diff_eq!(gram / (4.0 * PI), Array2::<f64>::eye(n_coeffs(YDEG)), epsilon = 1e-12);
    }

    #[test]
    fn rotation_shifts_longitude() {
        const YDEG: usize = 10;
        let y = direction(1.1, 0.3, YDEG);
        let rotated = rotate_z(YDEG, y.view(), 0.8);
        assert_abs_diff_eq!(rotated, direction(1.1, 1.1, YDEG), epsilon = 1e-12);
    }

    #[test]
    fn adjoint_is_inverse_and_transpose() {
        const YDEG: usize = 6;
        let u = Array::linspace(-1.0_f64, 1.0, n_coeffs(YDEG));
        let w = u.mapv(|x| (3.0 * x).sin());
        let angle = 2.6;
        let back = rotate_z_adjoint(YDEG, rotate_z(YDEG, u.view(), angle).view(), angle);
        assert_abs_diff_eq!(back, u, epsilon = 1e-14);
        let lhs = rotate_z(YDEG, u.view(), angle).dot(&w);
        let rhs = u.dot(&rotate_z_adjoint(YDEG, w.view(), angle));
        assert_relative_eq!(lhs, rhs, max_relative = 1e-13);
    }

    #[test]
    fn zonal_terms_are_not_rotated() {
        const YDEG: usize = 5;
        let mut v = Array1::<f64>::zeros(n_coeffs(YDEG));
        for l in 0..=YDEG {
            v[index(l, 0)] = 1.0 + l as f64;
        }
        assert_eq!(rotate_z(YDEG, v.view(), 1.234), v);
    }

    #[test]
    fn batched_rotation() {
        const YDEG: usize = 3;
        let row = direction(0.5, 0.0, YDEG);
        let rows = stack![Axis(0), row, row, row];
        let angles = ndarray::array![0.0, 1.0, -2.0];
        let rotated = tensordot_rz(YDEG, rows.view(), angles.view());
        for (r, &angle) in rotated.outer_iter().zip(angles.iter()) {
            assert_abs_diff_eq!(r, direction(0.5, angle, YDEG), epsilon = 1e-13);
        }
    }

    #[test]
    fn zonal_rotation_moves_pole_to_latitude() {
        const YDEG: usize = 8;
        let lat = 0.6_f64;
        let d = zonal_rotation(YDEG, lat.sin(), lat.cos());
        // the function sum_l (2l + 1) P_l(cos gamma) peaks at the spot centre
        let mut pole = Array1::<f64>::zeros(n_coeffs(YDEG));
        for l in 0..=YDEG {
            pole[index(l, 0)] = f64::sqrt(2.0 * l as f64 + 1.0);
        }
        let mut moved = Array1::<f64>::zeros(n_coeffs(YDEG));
        for (n, (l, _m)) in degrees_orders(YDEG).enumerate() {
            moved[n] = pole[index(l, 0)] * d[n];
        }
        assert_abs_diff_eq!(moved, direction(PI / 2.0 - lat, 0.0, YDEG), epsilon = 1e-12);
    }

    #[test]
    fn tilt_zonal_columns_are_zonal_rotation() {
        const YDEG: usize = 7;
        let lat = -0.4_f64;
        let blocks = LatitudeTilt::new(YDEG).blocks(lat.sin(), lat.cos());
        let d = zonal_rotation(YDEG, lat.sin(), lat.cos());
        for (l, block) in blocks.iter().enumerate() {
            for m in -(l as isize)..=l as isize {
                let row = (m + l as isize) as usize;
                assert_abs_diff_eq!(block[[row, l]], d[index(l, m)], epsilon = 1e-13);
            }
        }
    }

    #[test]
    fn tilt_blocks_are_orthogonal() {
        const YDEG: usize = 6;
        let lat = 0.9_f64;
        for block in LatitudeTilt::new(YDEG).blocks(lat.sin(), lat.cos()) {
            let n = block.nrows();
            assert_abs_diff_eq!(block.dot(&block.t()), Array2::<f64>::eye(n), epsilon = 1e-13);
        }
    }

    #[test]
    fn tilt_moves_the_map() {
        const YDEG: usize = 5;
        let lat = 0.35_f64;
        let (c, s) = (lat.sin(), lat.cos());
        let coeffs = Array::linspace(-1.0_f64, 2.0, n_coeffs(YDEG)).mapv(|x| (2.0 * x).cos());
        let blocks = LatitudeTilt::new(YDEG).blocks(c, s);
        let moved = rotate_rows(&blocks, coeffs.view().insert_axis(Axis(1)));
        // the value of the moved map at R x equals the value of the original map at x
        for &(theta, phi) in &[(0.3_f64, 1.0_f64), (1.7, -2.2), (2.9, 0.1)] {
            let (sin_theta, cos_theta) = f64::sin_cos(theta);
            let x = [sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta];
            let rx = [c * x[0] + s * x[2], x[1], -s * x[0] + c * x[2]];
            let original = coeffs.dot(&ylm_at(YDEG, x));
            let value = moved.column(0).dot(&ylm_at(YDEG, rx));
            assert_abs_diff_eq!(value, original, epsilon = 1e-12);
        }
    }
}
