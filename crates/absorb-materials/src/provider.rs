//! Material property provider trait.
//!
//! All material data sources implement [`MaterialProvider`], which returns
//! the neutron cross-sections and number density from which the linear
//! attenuation coefficients of a sample or container are derived.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wavelength (Å) at which absorption cross-sections are tabulated.
pub const REFERENCE_WAVELENGTH: f64 = 1.8;

/// Converts barn · Å⁻³ to m⁻¹ (1 barn = 1e-28 m², 1 Å⁻³ = 1e30 m⁻³).
pub const BARN_PER_CUBIC_ANGSTROM_TO_INV_M: f64 = 100.0;

/// Errors from material providers.
#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("Material not found: '{id}'. Valid identifiers: {valid}")]
    NotFound { id: String, valid: String },

    #[error("Material '{material}': {quantity} must be non-negative and finite, got {value}")]
    InvalidValue {
        material: String,
        quantity: &'static str,
        value: f64,
    },
}

/// Provides the scalar nuclear properties of a homogeneous material.
pub trait MaterialProvider: Send + Sync {
    /// Human-readable name of this material.
    fn name(&self) -> &str;

    /// Absorption cross-section at [`REFERENCE_WAVELENGTH`] (barn).
    fn absorption_xs(&self) -> f64;

    /// Total (coherent + incoherent) scattering cross-section (barn).
    fn scattering_xs(&self) -> f64;

    /// Number density (atoms / Å³).
    fn number_density(&self) -> f64;

    /// Linear absorption coefficient at the reference wavelength (m⁻¹).
    fn linear_absorption_at_reference(&self) -> f64 {
        self.absorption_xs() * self.number_density() * BARN_PER_CUBIC_ANGSTROM_TO_INV_M
    }

    /// Linear scattering coefficient (m⁻¹), independent of wavelength.
    fn linear_scattering(&self) -> f64 {
        self.scattering_xs() * self.number_density() * BARN_PER_CUBIC_ANGSTROM_TO_INV_M
    }
}

/// A material given directly by its cross-sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Absorption cross-section at 1.8 Å (barn).
    pub absorption_xs: f64,
    /// Total scattering cross-section (barn).
    pub scattering_xs: f64,
    /// Number density (atoms / Å³).
    pub number_density: f64,
}

impl Material {
    /// Construct a material, rejecting negative or non-finite values.
    pub fn new(
        name: impl Into<String>,
        absorption_xs: f64,
        scattering_xs: f64,
        number_density: f64,
    ) -> Result<Self, MaterialError> {
        let name = name.into();
        for (quantity, value) in [
            ("absorption cross-section", absorption_xs),
            ("scattering cross-section", scattering_xs),
            ("number density", number_density),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MaterialError::InvalidValue {
                    material: name.clone(),
                    quantity,
                    value,
                });
            }
        }
        Ok(Self {
            name,
            absorption_xs,
            scattering_xs,
            number_density,
        })
    }

    /// Same material with a different number density, e.g. a powder with
    /// a packing fraction below one.
    pub fn with_number_density(self, number_density: f64) -> Result<Self, MaterialError> {
        Self::new(self.name, self.absorption_xs, self.scattering_xs, number_density)
    }
}

impl MaterialProvider for Material {
    fn name(&self) -> &str {
        &self.name
    }

    fn absorption_xs(&self) -> f64 {
        self.absorption_xs
    }

    fn scattering_xs(&self) -> f64 {
        self.scattering_xs
    }

    fn number_density(&self) -> f64 {
        self.number_density
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_coefficients_from_cross_sections() {
        let m = Material::new("test", 5.0, 2.0, 0.1).unwrap();
        // 5 barn × 0.1 Å⁻³ × 100 = 50 m⁻¹
        assert_relative_eq!(m.linear_absorption_at_reference(), 50.0, max_relative = 1e-12);
        assert_relative_eq!(m.linear_scattering(), 20.0, max_relative = 1e-12);
    }

    #[test]
    fn test_negative_values_rejected() {
        let err = Material::new("bad", -1.0, 2.0, 0.1).unwrap_err();
        assert!(err.to_string().contains("absorption cross-section"));
        assert!(Material::new("bad", 1.0, 2.0, f64::NAN).is_err());
    }

    #[test]
    fn test_packing_fraction() {
        let m = Material::new("powder", 1.0, 1.0, 0.1)
            .unwrap()
            .with_number_density(0.05)
            .unwrap();
        assert_relative_eq!(m.linear_scattering(), 5.0, max_relative = 1e-12);
    }
}
