//! Absorption-correction methods and the machinery they share.
//!
//! The [`AbsorptionMethod`] trait defines the interface every correction
//! implements. A method discretises its solid(s), builds a
//! [`RunContext`](context::RunContext) holding the element set and
//! attenuation model for that call only, and hands a per-spectrum kernel
//! to the [`SpectrumScanScheduler`](scan::SpectrumScanScheduler).

pub mod context;
pub mod integrator;
pub mod numerical;
pub mod paalman_pings;
pub mod paths;
pub mod sampler;
pub mod scan;

use absorb_compute::ComputeError;
use absorb_geometry::discretise::DiscretiseError;
use nalgebra::Vector3;
use serde::Serialize;
use thiserror::Error;

use crate::types::{EnergyMode, ExpMethod};
use crate::workspace::{SpectrumSet, WorkspaceError};

pub use numerical::{CylinderAbsorption, FlatPlateAbsorption, NumericalAbsorption, SphereAbsorption};
pub use paalman_pings::PaalmanPingsAbsorption;
pub use scan::{CancellationToken, LogProgress, NoProgress, ProgressReporter, SpectrumScanScheduler};

/// Errors that abort a correction run.
#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Discretisation produced no volume elements; use a smaller element size")]
    NoElements,

    #[error("Discretisation failed: {0}")]
    Discretise(#[from] DiscretiseError),

    #[error(
        "Volume element {element} at ({:.4e}, {:.4e}, {:.4e}) m lies outside the shape",
        .position.x, .position.y, .position.z
    )]
    ElementOutsideShape { element: usize, position: Vector3<f64> },

    #[error(
        "Incident ray from element {element} at ({:.4e}, {:.4e}, {:.4e}) m never leaves the shape; \
         check the sample placement",
        .position.x, .position.y, .position.z
    )]
    IncidentPathFailure { element: usize, position: Vector3<f64> },

    #[error(
        "Beam direction ({:.4}, {:.4}, {:.4}) must be finite and non-zero",
        .0.x, .0.y, .0.z
    )]
    InvalidBeamDirection(Vector3<f64>),

    #[error("muR = {mu_r:.4} is outside the valid range [{min}, {max}]")]
    MuROutOfRange { mu_r: f64, min: f64, max: f64 },

    #[error("Linear {name} coefficient must be non-negative and finite, got {value}")]
    NegativeAttenuation { name: &'static str, value: f64 },

    #[error("EFixed must be positive and finite, got {0} meV")]
    InvalidEFixed(f64),

    #[error("Inelastic correction needs an EFixed value{}", spectrum_suffix(.spectrum))]
    MissingEFixed { spectrum: Option<usize> },

    #[error("Input has no spectra")]
    NoSpectra,

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("Compute backend error: {0}")]
    Compute(#[from] ComputeError),

    #[error("Correction cancelled")]
    Cancelled,
}

fn spectrum_suffix(spectrum: &Option<usize>) -> String {
    match spectrum {
        Some(index) => format!(" for spectrum {index}"),
        None => String::new(),
    }
}

/// Run-wide settings shared by all methods.
#[derive(Debug, Clone)]
pub struct CorrectionParams {
    /// Number of exactly evaluated wavelengths per spectrum; `None` for all.
    pub number_of_wavelength_points: Option<usize>,
    pub exp_method: ExpMethod,
    pub emode: EnergyMode,
    /// Fixed energy (meV) for direct or indirect geometry.
    pub efixed: Option<f64>,
    /// Direction of travel of the incident beam.
    pub beam_direction: Vector3<f64>,
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self {
            number_of_wavelength_points: None,
            exp_method: ExpMethod::Exact,
            emode: EnergyMode::Elastic,
            efixed: None,
            beam_direction: Vector3::z(),
        }
    }
}

impl CorrectionParams {
    /// Reject settings no run could use.
    pub fn validate(&self) -> Result<(), CorrectionError> {
        let norm = self.beam_direction.norm();
        if !norm.is_finite() || norm < f64::EPSILON {
            return Err(CorrectionError::InvalidBeamDirection(self.beam_direction));
        }
        Ok(())
    }
}

/// One named set of correction factors.
#[derive(Debug, Clone)]
pub struct FactorSet {
    pub name: &'static str,
    pub spectra: SpectrumSet,
}

/// Diagnostics of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub method: String,
    pub element_count: usize,
    /// Summed element volume of the sample (m^3).
    pub discretised_volume: f64,
    pub container_element_count: Option<usize>,
    pub container_volume: Option<f64>,
    pub wavelength_step: usize,
    pub skipped_spectra: usize,
    pub degraded_spectra: usize,
}

/// Everything a correction run produces.
#[derive(Debug, Clone)]
pub struct CorrectionOutput {
    pub factors: Vec<FactorSet>,
    pub summary: RunSummary,
}

impl CorrectionOutput {
    pub fn get(&self, name: &str) -> Option<&SpectrumSet> {
        self.factors
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.spectra)
    }
}

/// The interface every absorption correction implements.
pub trait AbsorptionMethod {
    /// Compute attenuation factors for every spectrum of `input`.
    fn correct(
        &self,
        input: &SpectrumSet,
        params: &CorrectionParams,
        scheduler: &SpectrumScanScheduler,
    ) -> Result<CorrectionOutput, CorrectionError>;

    /// Human-readable name of the method.
    fn method_name(&self) -> &str;
}
