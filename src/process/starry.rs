use crate::config::{Hyperparameters, LatitudeShape};
use crate::error::StarryProcessError;
use crate::flux::FluxIntegral;
use crate::integrals::{
    ContrastIntegral, LatitudeIntegral, LongitudeIntegral, MomentIntegral, SizeIntegral,
};
use crate::normalization::Normalization;
use crate::process::{ProcessState, SpotProcess, StarryProcessSum};

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::ops::Add;

type SpotChain = ContrastIntegral<LongitudeIntegral<LatitudeIntegral<SizeIntegral>>>;

/// Gaussian process for light curves of a star with a population of similar spots
///
/// ```
/// use starry_process::{Geometry, Hyperparameters, SpotProcess, StarryProcess};
/// use ndarray::Array1;
///
/// let hyper = Hyperparameters {
///     ydeg: 5,
///     mu: Some(30.0),
///     sigma: Some(5.0),
///     ..Default::default()
/// };
/// let sp = StarryProcess::new(&hyper).unwrap();
/// let t = Array1::linspace(0.0, 2.0, 50);
/// let cov = sp.cov(t.view(), Geometry::new(60.0, 1.0)).unwrap();
/// assert_eq!(cov.shape(), &[50, 50]);
/// assert!(sp.log_jac().is_finite());
/// ```
#[derive(Clone, Debug)]
pub struct StarryProcess {
    chain: SpotChain,
    state: ProcessState,
}

impl StarryProcess {
    pub fn new(hyper: &Hyperparameters) -> Result<Self, StarryProcessError> {
        let shape = hyper.latitude_shape()?;
        hyper.check_ydeg()?;

        let size = SizeIntegral::new(hyper.ydeg, hyper.r, hyper.d)?;
        let latitude = match shape {
            LatitudeShape::Beta { a, b } => LatitudeIntegral::new(size, a, b, hyper.latitude)?,
            LatitudeShape::ModeAndWidth { mu, sigma } => {
                LatitudeIntegral::with_mode_and_width(size, mu, sigma, hyper.latitude)?
            }
        };
        let longitude = LongitudeIntegral::new(latitude);
        let chain = ContrastIntegral::new(longitude, hyper.c, hyper.n)?;

        let flux = FluxIntegral::new(
            hyper.ydeg,
            chain.mean(),
            chain.cov(),
            &hyper.u,
            hyper.udeg,
            hyper.marginalize_over_inclination,
            hyper.covpts,
        )?;
        let state = ProcessState::new(
            flux,
            hyper.normalized,
            Normalization::new(hyper.normalization_order, hyper.normalization_zmax),
            StdRng::seed_from_u64(hyper.seed),
        );
        log::debug!(
            "starry process: ydeg = {}, normalized = {}, marginalize_over_inclination = {}",
            hyper.ydeg,
            hyper.normalized,
            hyper.marginalize_over_inclination,
        );

        Ok(Self { chain, state })
    }

    pub fn size(&self) -> &SizeIntegral {
        self.latitude().child()
    }

    pub fn latitude(&self) -> &LatitudeIntegral<SizeIntegral> {
        self.longitude().child()
    }

    pub fn longitude(&self) -> &LongitudeIntegral<LatitudeIntegral<SizeIntegral>> {
        self.chain.child()
    }

    pub fn contrast(&self) -> &SpotChain {
        &self.chain
    }

    /// Log-Jacobian of the latitude reparametrization, see [LatitudeIntegral::log_jac]
    pub fn log_jac(&self) -> f64 {
        self.latitude().log_jac()
    }
}

impl SpotProcess for StarryProcess {
    fn state(&self) -> &ProcessState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcessState {
        &mut self.state
    }
}

impl<P> Add<&P> for &StarryProcess
where
    P: SpotProcess,
{
    type Output = Result<StarryProcessSum, StarryProcessError>;

    fn add(self, other: &P) -> Self::Output {
        StarryProcessSum::new(self, other)
    }
}
