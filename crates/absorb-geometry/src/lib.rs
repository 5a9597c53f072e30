//! # Absorb Geometry
//!
//! Geometry handling for the Absorb framework. This crate provides:
//!
//! - **Rays and the shape capability** ([`ray`], [`shape`]): the
//!   [`ShapeQuery`](shape::ShapeQuery) trait that any solid must implement
//!   to be corrected for absorption.
//! - **Parametric primitives** ([`primitives`]): spheres, cylinders,
//!   annular cans, flat plates, and ellipsoids.
//! - **Meshes** ([`mesh`], [`parsers`]): closed triangle meshes imported
//!   from `.obj` files.
//! - **Discretisation** ([`discretise`]): closed-form and raster
//!   decompositions of solids into volume elements.
//! - **Transformations** ([`transform`]): placement of locally-built
//!   element sets in the world frame.

pub mod discretise;
pub mod mesh;
pub mod parsers;
pub mod primitives;
pub mod ray;
pub mod shape;
pub mod transform;

pub use ray::Ray;
pub use shape::{length_inside, ShapeQuery};
