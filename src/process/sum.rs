use crate::error::StarryProcessError;
use crate::flux::FluxIntegral;
use crate::process::{ProcessState, SpotProcess};

use std::ops::Add;

/// Superposition of independent spot populations on the same star
///
/// Means and covariances of the coefficients add. Limb darkening, normalization settings and the
/// random generator state are taken from the first operand.
#[derive(Clone, Debug)]
pub struct StarryProcessSum {
    state: ProcessState,
}

impl StarryProcessSum {
    pub fn new<A, B>(first: &A, second: &B) -> Result<Self, StarryProcessError>
    where
        A: SpotProcess + ?Sized,
        B: SpotProcess + ?Sized,
    {
        if first.ydeg() != second.ydeg() {
            return Err(StarryProcessError::Incompatible("ydeg"));
        }
        if first.normalized() != second.normalized() {
            return Err(StarryProcessError::Incompatible("normalized"));
        }
        if first.marginalize_over_inclination() != second.marginalize_over_inclination() {
            return Err(StarryProcessError::Incompatible(
                "marginalize_over_inclination",
            ));
        }
        if first.covpts() != second.covpts() {
            return Err(StarryProcessError::Incompatible("covpts"));
        }

        let first_flux = first.flux_integral();
        let u = first_flux.u();
        let flux = FluxIntegral::new(
            first.ydeg(),
            &first.mean_ylm() + &second.mean_ylm(),
            &first.cov_ylm() + &second.cov_ylm(),
            u,
            u.len(),
            first.marginalize_over_inclination(),
            first.covpts(),
        )?;
        let state = ProcessState::new(
            flux,
            first.normalized(),
            first.normalization().clone(),
            first.state().rng.clone(),
        );
        log::debug!("sum of processes of degree {}", first.ydeg());

        Ok(Self { state })
    }

    /// Sum of all `processes`, same as chaining `+` from the left
    pub fn from_processes<'a, P, I>(processes: I) -> Result<Self, StarryProcessError>
    where
        P: SpotProcess + ?Sized + 'a,
        I: IntoIterator<Item = &'a P>,
    {
        let mut processes = processes.into_iter();
        let first = processes.next().ok_or(StarryProcessError::EmptySum)?;
        let state = ProcessState::new(
            first.flux_integral().clone(),
            first.normalized(),
            first.normalization().clone(),
            first.state().rng.clone(),
        );
        processes.try_fold(Self { state }, |sum, process| Self::new(&sum, process))
    }
}

impl SpotProcess for StarryProcessSum {
    fn state(&self) -> &ProcessState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcessState {
        &mut self.state
    }
}

impl<P> Add<&P> for &StarryProcessSum
where
    P: SpotProcess,
{
    type Output = Result<StarryProcessSum, StarryProcessError>;

    fn add(self, other: &P) -> Self::Output {
        StarryProcessSum::new(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::{Geometry, Hyperparameters};
    use crate::process::StarryProcess;
    use approx::assert_abs_diff_eq;
    use starry_process_test_util::uniform_time_grid;

    fn hyper() -> Hyperparameters {
        Hyperparameters {
            ydeg: 5,
            ..Default::default()
        }
    }

    #[test]
    fn identical_processes_double() {
        let sp = StarryProcess::new(&hyper()).unwrap();
        let sum = (&sp + &sp).unwrap();
        assert_eq!(sum.mean_ylm(), &sp.mean_ylm() * 2.0);
        assert_eq!(sum.cov_ylm(), &sp.cov_ylm() * 2.0);
        assert_eq!(sum.ydeg(), 5);
        assert!(sum.normalized());
    }

    #[test]
    fn different_populations_add() {
        let small = StarryProcess::new(&Hyperparameters {
            r: 10.0,
            d: 2.0,
            ..hyper()
        })
        .unwrap();
        let large = StarryProcess::new(&Hyperparameters {
            r: 40.0,
            c: 0.05,
            mu: Some(60.0),
            sigma: Some(5.0),
            ..hyper()
        })
        .unwrap();
        let sum = (&small + &large).unwrap();
        assert_abs_diff_eq!(
            sum.cov_ylm(),
            (&small.cov_ylm() + &large.cov_ylm()).view(),
            epsilon = 0.0
        );
        assert!(sum.cho_cov_ylm().iter().all(|x| x.is_finite()));

        let t = uniform_time_grid(0.0, 2.0, 15);
        let geometry = Geometry::new(80.0, 1.0);
        let raw_cov = |flux: &FluxIntegral| flux.cov(t.view(), geometry.i, geometry.p).unwrap();
        let cov_small = raw_cov(small.flux_integral());
        let cov_large = raw_cov(large.flux_integral());
        let cov_sum = raw_cov(sum.flux_integral());
        assert_abs_diff_eq!(cov_sum, cov_small + cov_large, epsilon = 1e-15);
    }

    #[test]
    fn sums_are_summable() {
        let sp = StarryProcess::new(&hyper()).unwrap();
        let double = (&sp + &sp).unwrap();
        let triple = (&double + &sp).unwrap();
        let also_triple = (&sp + &double).unwrap();
        assert_abs_diff_eq!(triple.mean_ylm(), (&sp.mean_ylm() * 3.0).view(), epsilon = 1e-15);
        assert_abs_diff_eq!(triple.cov_ylm(), also_triple.cov_ylm(), epsilon = 1e-15);
    }

    #[test]
    fn sum_of_many_is_chained_sum() {
        let processes: Vec<_> = [10.0, 20.0, 30.0]
            .into_iter()
            .map(|r| StarryProcess::new(&Hyperparameters { r, ..hyper() }).unwrap())
            .collect();
        let pair = (&processes[0] + &processes[1]).unwrap();
        let chained = (&pair + &processes[2]).unwrap();
        let sum = StarryProcessSum::from_processes(&processes).unwrap();
        assert_abs_diff_eq!(sum.mean_ylm(), chained.mean_ylm(), epsilon = 1e-15);
        assert_abs_diff_eq!(sum.cov_ylm(), chained.cov_ylm(), epsilon = 1e-15);

        let single = StarryProcessSum::from_processes(&processes[..1]).unwrap();
        assert_eq!(single.cov_ylm(), processes[0].cov_ylm());
    }

    #[test]
    fn empty_sum() {
        let processes: Vec<StarryProcess> = vec![];
        assert_eq!(
            StarryProcessSum::from_processes(&processes).unwrap_err(),
            StarryProcessError::EmptySum
        );
    }

    #[test]
    fn sum_inherits_the_generator() {
        let mut sp = StarryProcess::new(&hyper()).unwrap();
        let mut sum = (&sp + &sp).unwrap();
        let from_sum = sum.sample_ylm(2);
        let from_sp = sp.sample_ylm(2);
        // same normal draws, different moments
        let z_sum = from_sum - &sum.mean_ylm();
        let z_sp = from_sp - &sp.mean_ylm();
        assert_abs_diff_eq!(
            crate::linalg::solve_lower(sum.cho_cov_ylm(), z_sum.t()),
            crate::linalg::solve_lower(sp.cho_cov_ylm(), z_sp.t()),
            epsilon = 1e-6
        );
    }

    #[test]
    fn incompatible_processes() {
        let sp = StarryProcess::new(&hyper()).unwrap();
        let cases = [
            (Hyperparameters { ydeg: 6, ..hyper() }, "ydeg"),
            (
                Hyperparameters {
                    normalized: false,
                    ..hyper()
                },
                "normalized",
            ),
            (
                Hyperparameters {
                    marginalize_over_inclination: true,
                    ..hyper()
                },
                "marginalize_over_inclination",
            ),
            (
                Hyperparameters {
                    covpts: 100,
                    ..hyper()
                },
                "covpts",
            ),
        ];
        for (other, field) in cases {
            let other = StarryProcess::new(&other).unwrap();
            assert_eq!(
                (&sp + &other).unwrap_err(),
                StarryProcessError::Incompatible(field)
            );
        }
    }
}
