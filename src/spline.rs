/// Clamped cubic spline
///
/// Piecewise cubic $S_j(x) = a_j + b_j (x - x_j) + c_j (x - x_j)^2 + d_j (x - x_j)^3$ with
/// continuous second derivative, passing through all knots and having prescribed first
/// derivatives at both ends. Outside the knot range the boundary values are returned.
#[derive(Clone, Debug)]
pub struct CubicSpline {
    x: Vec<f64>,
    coeffs: Vec<[f64; 4]>,
    y_last: f64,
}

impl CubicSpline {
    /// Build the spline through knots `x` (strictly increasing, at least two) and values `y`
    pub fn clamped(x: Vec<f64>, y: &[f64], slope_start: f64, slope_end: f64) -> Self {
        let n = x.len();
        debug_assert!(n >= 2, "need at least two knots");
        debug_assert_eq!(n, y.len());
        debug_assert!(x.windows(2).all(|w| w[1] > w[0]), "knots must increase");

        let h: Vec<_> = x.windows(2).map(|w| w[1] - w[0]).collect();

        let mut alpha = vec![0.0; n];
        alpha[0] = 3.0 * (y[1] - y[0]) / h[0] - 3.0 * slope_start;
        alpha[n - 1] = 3.0 * slope_end - 3.0 * (y[n - 1] - y[n - 2]) / h[n - 2];
        for i in 1..n - 1 {
            alpha[i] = 3.0 / h[i] * (y[i + 1] - y[i]) - 3.0 / h[i - 1] * (y[i] - y[i - 1]);
        }

        // Thomas algorithm for the second-derivative halves c_j
        let mut mu = vec![0.0; n];
        let mut z = vec![0.0; n];
        let l0 = 2.0 * h[0];
        mu[0] = 0.5;
        z[0] = alpha[0] / l0;
        for i in 1..n - 1 {
            let l = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / l;
            z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l;
        }
        let l_last = h[n - 2] * (2.0 - mu[n - 2]);
        z[n - 1] = (alpha[n - 1] - h[n - 2] * z[n - 2]) / l_last;

        let mut c = vec![0.0; n];
        c[n - 1] = z[n - 1];
        let mut coeffs = vec![[0.0; 4]; n - 1];
        for j in (0..n - 1).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            let b = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
            let d = (c[j + 1] - c[j]) / (3.0 * h[j]);
            coeffs[j] = [y[j], b, c[j], d];
        }

        Self {
            x,
            coeffs,
            y_last: y[n - 1],
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        if x <= self.x[0] {
            return self.coeffs[0][0];
        }
        if x >= self.x[self.x.len() - 1] {
            return self.y_last;
        }
        // index of the first knot greater than x, it is at least 1 here
        let segment = self.x.partition_point(|&knot| knot <= x) - 1;
        let dx = x - self.x[segment];
        let [a, b, c, d] = self.coeffs[segment];
        a + dx * (b + dx * (c + dx * d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tests::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn passes_through_knots() {
        let x = linspace(0.0, 3.0, 7);
        let y: Vec<_> = x.iter().map(|&x| f64::sin(x) + 0.1 * x).collect();
        let spline = CubicSpline::clamped(x.clone(), &y, 0.0, 0.0);
        for (&x, &y) in x.iter().zip(y.iter()) {
            assert_abs_diff_eq!(spline.evaluate(x), y, epsilon = 1e-14);
        }
    }

    #[test]
    fn reproduces_cubic_with_exact_slopes() {
        let f = |x: f64| 2.0 * x.powi(3) - x * x + 0.5 * x - 1.0;
        let df = |x: f64| 6.0 * x * x - 2.0 * x + 0.5;
        let x = vec![-1.0, -0.2, 0.5, 0.7, 2.0];
        let y: Vec<_> = x.iter().map(|&x| f(x)).collect();
        let spline = CubicSpline::clamped(x, &y, df(-1.0), df(2.0));
        for t in linspace(-1.0, 2.0, 31) {
            assert_abs_diff_eq!(spline.evaluate(t), f(t), epsilon = 1e-12);
        }
    }

    #[test]
    fn two_knots() {
        // the only cubic with these values and zero end slopes
        let spline = CubicSpline::clamped(vec![0.0, 1.0], &[0.0, 1.0], 0.0, 0.0);
        for t in linspace(0.0, 1.0, 11) {
            assert_abs_diff_eq!(spline.evaluate(t), 3.0 * t * t - 2.0 * t.powi(3), epsilon = 1e-14);
        }
    }

    #[test]
    fn interpolates_even_periodic_function() {
        let x = linspace(0.0, std::f64::consts::PI, 50);
        let y: Vec<_> = x.iter().map(|&x| f64::cos(2.0 * x)).collect();
        let spline = CubicSpline::clamped(x, &y, 0.0, 0.0);
        for t in linspace(0.0, std::f64::consts::PI, 333) {
            assert_abs_diff_eq!(spline.evaluate(t), f64::cos(2.0 * t), epsilon = 1e-5);
        }
    }

    #[test]
    fn constant_outside_range() {
        let spline = CubicSpline::clamped(vec![0.0, 1.0, 2.0], &[1.0, 2.0, 5.0], 0.0, 0.0);
        assert_eq!(spline.evaluate(-1.0), 1.0);
        assert_eq!(spline.evaluate(3.0), 5.0);
    }

    #[test]
    fn nan_gives_nan() {
        let spline = CubicSpline::clamped(vec![0.0, 1.0, 2.0], &[1.0, 2.0, 5.0], 0.0, 0.0);
        assert!(spline.evaluate(f64::NAN).is_nan());
    }
}
