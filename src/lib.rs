#![doc = include_str!("../README.md")]


mod config;
pub use config::{Baseline, Covariance, Geometry, Hyperparameters, LatitudeShape, MIN_YDEG};

mod error;
pub use error::StarryProcessError;

mod flux;
pub use flux::{FluxIntegral, limb_darkening_weights};

pub mod harmonics;

pub mod integrals;
pub use integrals::{
    ContrastIntegral, LatitudeIntegral, LatitudeSettings, LongitudeIntegral, MomentIntegral,
    SizeIntegral, beta2gauss, gauss2beta,
};

pub mod linalg;

mod normalization;
pub use normalization::Normalization;

mod process;
pub use process::{ProcessState, SpotProcess, StarryProcess, StarryProcessSum};

#[doc(hidden)]
pub mod quadrature;

mod sin_cos;
#[doc(hidden)]
pub use sin_cos::RecurrentSinCos;

mod spline;

pub use ndarray;
