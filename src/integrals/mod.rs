//! Moments of the spherical harmonic expansion of a spotted surface
//!
//! The population model is a chain of stages, each owning its child and transforming the child's
//! moments in closed form: [SizeIntegral] builds a single polar spot, [LatitudeIntegral] moves it
//! to a random latitude, [LongitudeIntegral] spins it to a random longitude and
//! [ContrastIntegral] sums a number of such spots of a given contrast.

use crate::linalg::outer;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

mod contrast;
pub use contrast::ContrastIntegral;

mod latitude;
pub use latitude::{LatitudeIntegral, LatitudeSettings, beta2gauss, gauss2beta};

mod longitude;
pub use longitude::LongitudeIntegral;

mod size;
pub use size::SizeIntegral;

/// A stage of the moment chain
pub trait MomentIntegral {
    /// Spherical harmonic degree of the expansion
    fn ydeg(&self) -> usize;

    /// $E[y]$
    fn first_moment(&self) -> ArrayView1<'_, f64>;

    /// $E[y y^T]$
    fn second_moment(&self) -> ArrayView2<'_, f64>;

    fn mean(&self) -> Array1<f64> {
        self.first_moment().to_owned()
    }

    /// $E[y y^T] - E[y] E[y]^T$
    fn cov(&self) -> Array2<f64> {
        let e = self.first_moment();
        &self.second_moment() - &outer(e, e)
    }
}
