//! Built-in table of common sample and container elements.
//!
//! Cross-sections are the bound-atom values of V. F. Sears,
//! *Neutron News* **3**, 26 (1992); number densities follow from the bulk
//! mass density and molar mass of the pure element.

use crate::provider::{Material, MaterialError};

/// Avogadro's number scaled so that g/cm³ ÷ g/mol gives atoms/Å³.
const AVOGADRO_PER_CUBIC_ANGSTROM: f64 = 0.602_214_076;

/// One row of the element table.
#[derive(Debug, Clone, Copy)]
pub struct ElementData {
    pub symbol: &'static str,
    pub name: &'static str,
    /// Total scattering cross-section (barn).
    pub scattering_xs: f64,
    /// Absorption cross-section at 1.8 Å (barn).
    pub absorption_xs: f64,
    /// Bulk mass density (g/cm³).
    pub mass_density: f64,
    /// Molar mass (g/mol).
    pub molar_mass: f64,
}

impl ElementData {
    /// Number density of the bulk element (atoms / Å³).
    pub fn number_density(&self) -> f64 {
        self.mass_density * AVOGADRO_PER_CUBIC_ANGSTROM / self.molar_mass
    }

    pub fn to_material(&self) -> Material {
        Material {
            name: self.name.to_string(),
            absorption_xs: self.absorption_xs,
            scattering_xs: self.scattering_xs,
            number_density: self.number_density(),
        }
    }
}

pub const ELEMENTS: &[ElementData] = &[
    ElementData { symbol: "Al", name: "Aluminium", scattering_xs: 1.503, absorption_xs: 0.231, mass_density: 2.70, molar_mass: 26.9815 },
    ElementData { symbol: "Si", name: "Silicon", scattering_xs: 2.167, absorption_xs: 0.171, mass_density: 2.329, molar_mass: 28.0855 },
    ElementData { symbol: "Ti", name: "Titanium", scattering_xs: 4.35, absorption_xs: 6.09, mass_density: 4.506, molar_mass: 47.867 },
    ElementData { symbol: "V", name: "Vanadium", scattering_xs: 5.10, absorption_xs: 5.08, mass_density: 6.11, molar_mass: 50.9415 },
    ElementData { symbol: "Fe", name: "Iron", scattering_xs: 11.62, absorption_xs: 2.56, mass_density: 7.874, molar_mass: 55.845 },
    ElementData { symbol: "Ni", name: "Nickel", scattering_xs: 18.5, absorption_xs: 4.49, mass_density: 8.908, molar_mass: 58.6934 },
    ElementData { symbol: "Cu", name: "Copper", scattering_xs: 8.03, absorption_xs: 3.78, mass_density: 8.96, molar_mass: 63.546 },
    ElementData { symbol: "Zr", name: "Zirconium", scattering_xs: 6.46, absorption_xs: 0.185, mass_density: 6.52, molar_mass: 91.224 },
    ElementData { symbol: "Nb", name: "Niobium", scattering_xs: 6.255, absorption_xs: 1.15, mass_density: 8.57, molar_mass: 92.906 },
    ElementData { symbol: "Pb", name: "Lead", scattering_xs: 11.118, absorption_xs: 0.171, mass_density: 11.34, molar_mass: 207.2 },
];

/// Look up a built-in element by symbol (case-insensitive).
pub fn lookup(id: &str) -> Result<Material, MaterialError> {
    ELEMENTS
        .iter()
        .find(|e| e.symbol.eq_ignore_ascii_case(id))
        .map(ElementData::to_material)
        .ok_or_else(|| MaterialError::NotFound {
            id: id.to_string(),
            valid: ELEMENTS
                .iter()
                .map(|e| e.symbol)
                .collect::<Vec<_>>()
                .join(", "),
        })
}
