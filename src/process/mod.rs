//! Gaussian process over light curves of spotted stars

use crate::config::{Baseline, Covariance, Geometry};
use crate::error::StarryProcessError;
use crate::flux::FluxIntegral;
use crate::linalg::{
    cho_factor, cho_inverse, cho_solve, cho_solve_vec, gaussian_ln_density, sample_gaussian,
};
use crate::normalization::Normalization;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;

mod starry;
pub use starry::StarryProcess;

mod sum;
pub use sum::StarryProcessSum;

/// Moments of a process and everything derived from them once
#[derive(Clone, Debug)]
pub struct ProcessState {
    flux: FluxIntegral,
    cho_cov_ylm: Array2<f64>,
    cov_ylm_inv: Array2<f64>,
    cov_ylm_inv_mean: Array1<f64>,
    normalized: bool,
    normalization: Normalization,
    rng: StdRng,
}

impl ProcessState {
    fn new(
        flux: FluxIntegral,
        normalized: bool,
        normalization: Normalization,
        rng: StdRng,
    ) -> Self {
        let cho_cov_ylm = cho_factor(flux.cov_ylm());
        let cov_ylm_inv = cho_inverse(cho_cov_ylm.view());
        let cov_ylm_inv_mean = cho_solve_vec(cho_cov_ylm.view(), flux.mean_ylm());
        Self {
            flux,
            cho_cov_ylm,
            cov_ylm_inv,
            cov_ylm_inv_mean,
            normalized,
            normalization,
            rng,
        }
    }
}

/// Operations of a spot population process
///
/// Implemented by [StarryProcess] and by sums of processes, [StarryProcessSum]. The moments are
/// fixed at construction; sampling methods take `&mut self` because each process owns its random
/// generator.
pub trait SpotProcess {
    #[doc(hidden)]
    fn state(&self) -> &ProcessState;

    #[doc(hidden)]
    fn state_mut(&mut self) -> &mut ProcessState;

    fn ydeg(&self) -> usize {
        self.state().flux.ydeg()
    }

    fn covpts(&self) -> usize {
        self.state().flux.covpts()
    }

    /// Whether light curves are divided by their own mean
    fn normalized(&self) -> bool {
        self.state().normalized
    }

    fn marginalize_over_inclination(&self) -> bool {
        self.state().flux.marginalize_over_inclination()
    }

    /// Mean of the spherical harmonic coefficients
    fn mean_ylm(&self) -> ArrayView1<'_, f64> {
        self.state().flux.mean_ylm()
    }

    /// Covariance of the spherical harmonic coefficients
    fn cov_ylm(&self) -> ArrayView2<'_, f64> {
        self.state().flux.cov_ylm()
    }

    /// Lower Cholesky factor of [SpotProcess::cov_ylm]
    fn cho_cov_ylm(&self) -> ArrayView2<'_, f64> {
        self.state().cho_cov_ylm.view()
    }

    fn flux_integral(&self) -> &FluxIntegral {
        &self.state().flux
    }

    fn normalization(&self) -> &Normalization {
        &self.state().normalization
    }

    /// Draw `n_samples` coefficient vectors from the prior, one per row
    fn sample_ylm(&mut self, n_samples: usize) -> Array2<f64> {
        let state = self.state_mut();
        sample_gaussian(
            state.flux.mean_ylm(),
            state.cho_cov_ylm.view(),
            n_samples,
            &mut state.rng,
        )
    }

    /// Mean light curve at times `t`
    ///
    /// It is zero for normalized light curves.
    fn mean(
        &self,
        t: ArrayView1<f64>,
        geometry: Geometry,
    ) -> Result<Array1<f64>, StarryProcessError> {
        let state = self.state();
        let mean = state.flux.mean(t, geometry.i, geometry.p)?;
        if state.normalized {
            Ok(Array1::<f64>::zeros(t.len()))
        } else {
            Ok(mean)
        }
    }

    /// Light curve covariance at times `t`
    ///
    /// For normalized light curves it is the series approximation of [Normalization], which is
    /// infinite when the series diverges.
    fn cov(
        &self,
        t: ArrayView1<f64>,
        geometry: Geometry,
    ) -> Result<Array2<f64>, StarryProcessError> {
        let state = self.state();
        let cov = state.flux.cov(t, geometry.i, geometry.p)?;
        if !state.normalized {
            return Ok(cov);
        }
        // the mean is the same for every time
        let mean = state.flux.mean(t, geometry.i, geometry.p)?;
        let mu = 1.0 + mean.first().copied().unwrap_or(0.0);
        Ok(state.normalization.normalize(mu, cov.view()))
    }

    /// Draw `n_samples` light curves at times `t`, one per row
    ///
    /// With inclination marginalization the samples are drawn from the light-curve Gaussian with
    /// `eps` added to the diagonal of its covariance. Otherwise coefficient samples are projected
    /// to the flux.
    fn sample(
        &mut self,
        t: ArrayView1<f64>,
        geometry: Geometry,
        n_samples: usize,
        eps: f64,
    ) -> Result<Array2<f64>, StarryProcessError> {
        if self.marginalize_over_inclination() {
            let mean = self.mean(t, geometry)?;
            let mut cov = self.cov(t, geometry)?;
            let mut diag = cov.diag_mut();
            diag += eps;
            let l = cho_factor(cov.view());
            Ok(sample_gaussian(
                mean.view(),
                l.view(),
                n_samples,
                &mut self.state_mut().rng,
            ))
        } else {
            let a = self
                .state()
                .flux
                .design_matrix(t, geometry.i, geometry.p)?;
            Ok(self.sample_ylm(n_samples).dot(&a.t()))
        }
    }

    /// Log marginal likelihood of the light curve `flux` observed at times `t`
    ///
    /// The total covariance is the process covariance plus `data_cov` plus `baseline.var` added to
    /// every entry, the residual is `flux - mean - baseline.mean`. Any non-finite value, for example
    /// of a covariance which is not positive definite, is reported as `-inf`.
    fn log_likelihood(
        &self,
        t: ArrayView1<f64>,
        flux: ArrayView1<f64>,
        data_cov: &Covariance,
        geometry: Geometry,
        baseline: Baseline,
    ) -> Result<f64, StarryProcessError> {
        StarryProcessError::check_shape("flux", flux.shape(), &[t.len()])?;
        let gp_mean = self.mean(t, geometry)?;
        let mut cov = self.cov(t, geometry)?;
        cov += &data_cov.to_matrix(t.len())?;
        cov += baseline.var;
        log::trace!("log-likelihood of {} observations", t.len());

        let residual = &flux - &gp_mean - baseline.mean;
        let l = cho_factor(cov.view());
        let ln_like = gaussian_ln_density(l.view(), residual.view());
        if ln_like.is_finite() {
            Ok(ln_like)
        } else {
            log::debug!("log-likelihood is {ln_like}, reporting -inf");
            Ok(f64::NEG_INFINITY)
        }
    }

    /// Mean and covariance of the coefficients conditioned on the light curve `flux`
    ///
    /// With the design matrix $A$ and the data covariance $C$ (`data_cov` plus `baseline.var` in
    /// every entry), $W = A^T C^{-1} A + \Sigma^{-1}$ is the posterior precision and
    /// $W^{-1} [A^T C^{-1} (f - b) + \Sigma^{-1} \mu]$ is the posterior mean.
    fn ylm_conditional_moments(
        &self,
        t: ArrayView1<f64>,
        flux: ArrayView1<f64>,
        data_cov: &Covariance,
        geometry: Geometry,
        baseline: Baseline,
    ) -> Result<(Array1<f64>, Array2<f64>), StarryProcessError> {
        let state = self.state();
        if state.flux.marginalize_over_inclination() {
            return Err(StarryProcessError::Unimplemented(
                "conditional sampling when marginalizing over inclination",
            ));
        }
        if state.normalized {
            return Err(StarryProcessError::Unimplemented(
                "conditional sampling of normalized light curves",
            ));
        }
        StarryProcessError::check_shape("flux", flux.shape(), &[t.len()])?;

        let mut c = data_cov.to_matrix(t.len())?;
        c += baseline.var;
        let a = state.flux.design_matrix(t, geometry.i, geometry.p)?;
        let cho_c = cho_factor(c.view());
        let c_inv_a = cho_solve(cho_c.view(), a.view());
        let w = a.t().dot(&c_inv_a) + &state.cov_ylm_inv;
        let cho_w = cho_factor(w.view());

        let gain = cho_solve(cho_w.view(), c_inv_a.t());
        let residual = &flux - baseline.mean;
        let mean =
            gain.dot(&residual) + cho_solve_vec(cho_w.view(), state.cov_ylm_inv_mean.view());
        let cov = cho_inverse(cho_w.view());
        Ok((mean, cov))
    }

    /// Draw `n_samples` coefficient vectors conditioned on the light curve, one per row
    ///
    /// See [SpotProcess::ylm_conditional_moments]. Fails with
    /// [StarryProcessError::Unimplemented] for normalized or inclination-marginalized processes.
    fn sample_ylm_conditional(
        &mut self,
        t: ArrayView1<f64>,
        flux: ArrayView1<f64>,
        data_cov: &Covariance,
        geometry: Geometry,
        baseline: Baseline,
        n_samples: usize,
    ) -> Result<Array2<f64>, StarryProcessError> {
        let (mean, cov) = self.ylm_conditional_moments(t, flux, data_cov, geometry, baseline)?;
        let l = cho_factor(cov.view());
        Ok(sample_gaussian(
            mean.view(),
            l.view(),
            n_samples,
            &mut self.state_mut().rng,
        ))
    }
}
