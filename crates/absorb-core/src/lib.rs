//! # Absorb Core
//!
//! The numerical backbone of the Absorb framework. This crate computes,
//! for every (detector, wavelength) pair, the fraction of a neutron beam
//! that survives absorption and scattering inside a sample and, for the
//! Paalman–Pings method, its container.
//!
//! ## Architecture
//!
//! All corrections implement the [`correction::AbsorptionMethod`] trait. A
//! run discretises the solid into volume elements, caches each element's
//! incident path once, then scans the spectra in parallel: per detector it
//! traces the scattered paths, integrates the attenuation at a subset of
//! wavelengths and interpolates the rest.
//!
//! ## Modules
//!
//! - [`types`]: Volume elements, attenuation model, policy enums.
//! - [`workspace`]: Spectrum container and detector positions.
//! - [`correction`]: Path tracing, integrator, sampler, scheduler, methods.
//! - [`units`]: Wavelength and energy conversions.

pub mod correction;
pub mod types;
pub mod units;
pub mod workspace;

pub use correction::{
    AbsorptionMethod, CorrectionError, CorrectionOutput, CorrectionParams, SpectrumScanScheduler,
};
pub use types::{AttenuationModel, EnergyMode, ExpMethod, LinearCoefficients};
pub use workspace::{Detector, SpectrumSet};
