//! Sines and cosines of angle multiples

/// Iterator over $(\sin m\theta, \cos m\theta)$ for $m = 0, 1, 2, \dots$
///
/// Uses the angle-addition recurrence, so a single `sin_cos` call is made for the whole sequence.
/// The round-off grows linearly with $m$, which is negligible for harmonic degrees in use.
pub struct RecurrentSinCos {
    increment: (f64, f64),
    current: (f64, f64),
}

impl RecurrentSinCos {
    pub fn multiples_of(angle: f64) -> Self {
        Self {
            increment: angle.sin_cos(),
            current: (0.0, 1.0),
        }
    }
}

impl Iterator for RecurrentSinCos {
    type Item = (f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let previous = self.current;
        let (sin_step, cos_step) = self.increment;
        let (sin, cos) = self.current;
        self.current = (sin_step * cos + cos_step * sin, cos_step * cos - sin_step * sin);
        Some(previous)
    }
}
