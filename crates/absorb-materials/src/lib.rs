//! # Absorb Materials
//!
//! Material property providers for the Absorb framework. All materials
//! implement the [`MaterialProvider`](provider::MaterialProvider) trait,
//! which exposes the absorption and scattering cross-sections and the
//! number density needed to build linear attenuation coefficients.
//!
//! ## Available data sources
//!
//! | Source | Module |
//! |--------|--------|
//! | Explicit cross-sections | [`provider::Material`] |
//! | Built-in element table (Sears 1992) | [`library`] |

pub mod library;
pub mod provider;

pub use provider::{Material, MaterialError, MaterialProvider};
