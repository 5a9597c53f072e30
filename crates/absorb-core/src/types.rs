//! Core types shared across the correction pipeline.
//!
//! This module defines the volume elements a solid is cut into, the
//! attenuation model of a material, and the run-wide policy enums.

use absorb_materials::provider::{MaterialProvider, REFERENCE_WAVELENGTH};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::correction::integrator::pairwise_sum;
use crate::correction::CorrectionError;
use crate::units::wavelength_from_energy;

/// One cell of a discretised solid.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeElement {
    /// Centroid (m).
    pub position: Vector3<f64>,
    /// Volume (m^3).
    pub volume: f64,
    /// Distance from the beam entry point to the centroid (m).
    pub incident_path: f64,
}

/// All the volume elements of one solid, plus their summed volume.
///
/// Built once per run and only read afterwards, so it is shared between
/// worker threads without locking.
#[derive(Debug, Clone)]
pub struct ElementSet {
    elements: Vec<VolumeElement>,
    total_volume: f64,
}

impl ElementSet {
    pub fn new(elements: Vec<VolumeElement>) -> Self {
        let total_volume = pairwise_sum(0..elements.len(), &|i| elements[i].volume);
        Self {
            elements,
            total_volume,
        }
    }

    pub fn elements(&self) -> &[VolumeElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Discretised volume of the solid; the integration normaliser.
    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }
}

/// Energy-transfer model of the measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyMode {
    /// Incident and final wavelengths are both the bin wavelength.
    #[default]
    Elastic,
    /// Fixed incident energy; the bin gives the final wavelength.
    Direct,
    /// Fixed final energy; the bin gives the incident wavelength.
    Indirect,
}

/// How `exp` is evaluated inside the integrator. Chosen once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpMethod {
    #[default]
    Exact,
    /// Bit-manipulation approximation, a few percent off but much faster.
    FastApproximate,
}

/// Linear attenuation coefficients of a homogeneous material (m⁻¹).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearCoefficients {
    /// Absorption at the 1.8 Å reference wavelength.
    pub absorption_at_reference: f64,
    /// Scattering, independent of wavelength.
    pub scattering: f64,
}

impl LinearCoefficients {
    pub fn new(absorption_at_reference: f64, scattering: f64) -> Self {
        Self {
            absorption_at_reference,
            scattering,
        }
    }

    pub fn from_material(material: &dyn MaterialProvider) -> Self {
        Self {
            absorption_at_reference: material.linear_absorption_at_reference(),
            scattering: material.linear_scattering(),
        }
    }
}

/// How a bin wavelength maps to the incident/final wavelength pair of one
/// spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WavelengthPairing {
    Elastic,
    /// Incident wavelength fixed at the given value.
    FixedIncident(f64),
    /// Final wavelength fixed at the given value.
    FixedFinal(f64),
}

impl WavelengthPairing {
    /// `(λ_incident, λ_final)` for a bin at wavelength `lambda`.
    pub fn pair(&self, lambda: f64) -> (f64, f64) {
        match *self {
            Self::Elastic => (lambda, lambda),
            Self::FixedIncident(fixed) => (fixed, lambda),
            Self::FixedFinal(fixed) => (lambda, fixed),
        }
    }

    pub fn is_elastic(&self) -> bool {
        matches!(self, Self::Elastic)
    }
}

/// Linear coefficients plus the energy mode of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttenuationModel {
    coefficients: LinearCoefficients,
    emode: EnergyMode,
    fixed_wavelength: Option<f64>,
}

impl AttenuationModel {
    /// Validate coefficients and resolve `efixed` (meV) to a wavelength.
    ///
    /// Direct geometry needs `efixed`; indirect geometry may instead take it
    /// from each detector.
    pub fn new(
        coefficients: LinearCoefficients,
        emode: EnergyMode,
        efixed: Option<f64>,
    ) -> Result<Self, CorrectionError> {
        for (name, value) in [
            ("absorption", coefficients.absorption_at_reference),
            ("scattering", coefficients.scattering),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CorrectionError::NegativeAttenuation { name, value });
            }
        }

        let fixed_wavelength = match efixed {
            Some(e) if e.is_finite() && e > 0.0 => Some(wavelength_from_energy(e)),
            Some(e) => return Err(CorrectionError::InvalidEFixed(e)),
            None => None,
        };
        if emode == EnergyMode::Direct && fixed_wavelength.is_none() {
            return Err(CorrectionError::MissingEFixed { spectrum: None });
        }

        Ok(Self {
            coefficients,
            emode,
            fixed_wavelength,
        })
    }

    pub fn elastic(coefficients: LinearCoefficients) -> Result<Self, CorrectionError> {
        Self::new(coefficients, EnergyMode::Elastic, None)
    }

    pub fn coefficients(&self) -> LinearCoefficients {
        self.coefficients
    }

    pub fn emode(&self) -> EnergyMode {
        self.emode
    }

    pub fn fixed_wavelength(&self) -> Option<f64> {
        self.fixed_wavelength
    }

    /// Linear absorption coefficient at `lambda` (m⁻¹).
    pub fn absorption(&self, lambda: f64) -> f64 {
        self.coefficients.absorption_at_reference * lambda / REFERENCE_WAVELENGTH
    }

    /// Absorption plus scattering at `lambda` (m⁻¹).
    pub fn total(&self, lambda: f64) -> f64 {
        self.absorption(lambda) + self.coefficients.scattering
    }

    /// Wavelength pairing for a spectrum whose detector may carry its own
    /// fixed energy (meV).
    pub fn pairing(
        &self,
        spectrum: usize,
        detector_efixed: Option<f64>,
    ) -> Result<WavelengthPairing, CorrectionError> {
        match self.emode {
            EnergyMode::Elastic => Ok(WavelengthPairing::Elastic),
            EnergyMode::Direct => self
                .fixed_wavelength
                .map(WavelengthPairing::FixedIncident)
                .ok_or(CorrectionError::MissingEFixed { spectrum: Some(spectrum) }),
            EnergyMode::Indirect => match detector_efixed {
                Some(e) if e.is_finite() && e > 0.0 => {
                    Ok(WavelengthPairing::FixedFinal(wavelength_from_energy(e)))
                }
                Some(e) => Err(CorrectionError::InvalidEFixed(e)),
                None => self
                    .fixed_wavelength
                    .map(WavelengthPairing::FixedFinal)
                    .ok_or(CorrectionError::MissingEFixed { spectrum: Some(spectrum) }),
            },
        }
    }
}
