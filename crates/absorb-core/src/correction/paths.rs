//! Incident and scattered path lengths through a single solid.
//!
//! Incident paths do not depend on the detector, so they are traced once
//! per run while the element set is built. Scattered paths are traced per
//! detector. In both cases the first intersection reported along the ray
//! is taken as the exit point.

use absorb_geometry::discretise::LatticeElement;
use absorb_geometry::{Ray, ShapeQuery};
use nalgebra::Vector3;

use super::CorrectionError;
use crate::types::{ElementSet, VolumeElement};

/// Build the element set of `shape` from a raw lattice, verifying every
/// element lies inside and caching its incident path.
///
/// The incident path of an element is the distance from its centroid back
/// along the beam to where the ray leaves the solid. A ray that finds no
/// boundary means the geometry is mis-specified and aborts the run.
pub fn build_element_set(
    shape: &dyn ShapeQuery,
    lattice: Vec<LatticeElement>,
    beam_direction: &Vector3<f64>,
) -> Result<ElementSet, CorrectionError> {
    if lattice.is_empty() {
        return Err(CorrectionError::NoElements);
    }
    let backwards = -*beam_direction;

    let mut elements = Vec::with_capacity(lattice.len());
    for (index, cell) in lattice.into_iter().enumerate() {
        if !shape.contains(&cell.position) {
            return Err(CorrectionError::ElementOutsideShape {
                element: index,
                position: cell.position,
            });
        }
        let incident_path = Ray::new(cell.position, backwards)
            .and_then(|ray| shape.intercept(&ray).first().copied())
            .ok_or(CorrectionError::IncidentPathFailure {
                element: index,
                position: cell.position,
            })?;
        elements.push(VolumeElement {
            position: cell.position,
            volume: cell.volume,
            incident_path,
        });
    }

    Ok(ElementSet::new(elements))
}

/// Fill `paths` with the distance from each element to where the ray
/// towards `detector` leaves `shape`.
///
/// Elements whose ray finds no boundary (a detector on or inside the
/// surface, or at the centroid itself) get a zero-length path. Returns the
/// number of such elements.
pub fn resolve_scattered(
    shape: &dyn ShapeQuery,
    elements: &ElementSet,
    detector: &Vector3<f64>,
    paths: &mut [f64],
) -> usize {
    let mut fallbacks = 0;
    for (element, path) in elements.elements().iter().zip(paths.iter_mut()) {
        let exit = Ray::towards(element.position, *detector)
            .and_then(|ray| shape.intercept(&ray).first().copied());
        *path = match exit {
            Some(distance) => distance,
            None => {
                fallbacks += 1;
                0.0
            }
        };
    }
    fallbacks
}
