//! Unit conversions used by the correction engine.
//!
//! Wavelengths are in ångström, energies in meV, lengths in metres.

/// `E[meV] · λ²[Å²]` for a neutron.
pub const NEUTRON_ENERGY_WAVELENGTH: f64 = 81.804_2;

/// Wavelength (Å) of a neutron with the given energy (meV).
pub fn wavelength_from_energy(energy_mev: f64) -> f64 {
    (NEUTRON_ENERGY_WAVELENGTH / energy_mev).sqrt()
}

/// Millimetres to metres.
pub fn millimetres(mm: f64) -> f64 {
    mm * 1e-3
}
