//! Discretisation of solids into volume elements.
//!
//! Built-in shapes with a natural coordinate system get closed-form
//! decompositions whose element volumes are exact:
//!
//! - cylinders into height slices × concentric annuli,
//!   with `6·(j+1)` angular segments in annulus `j` so that element volumes
//!   stay comparable across the radius;
//! - spheres into concentric shells × equal-area polar bands × azimuthal
//!   segments;
//! - cuboids into a regular `nx × ny × nz` grid that tiles the plate.
//!
//! Everything else falls back to a cubic raster: the bounding box is cut
//! into cubes of side `element_size` and only cubes whose centre lies inside
//! the shape are kept.

use std::f64::consts::PI;

use nalgebra::Vector3;
use thiserror::Error;

use crate::primitives::{Cuboid, Cylinder, Sphere};
use crate::shape::ShapeQuery;
use crate::transform::Transform;

/// Errors raised while discretising a solid.
#[derive(Debug, Error)]
pub enum DiscretiseError {
    #[error("Element size must be positive and finite, got {0}")]
    InvalidElementSize(f64),

    #[error("{name} must be at least 1, got {value}")]
    InvalidCount { name: &'static str, value: usize },

    #[error("Grid of {cells} cells exceeds the limit of {limit}; increase the element size")]
    TooManyCells { cells: u64, limit: u64 },
}

/// Upper bound on the number of raster or plate cells for one shape.
pub const MAX_RASTER_CELLS: u64 = 50_000_000;

/// A single volume element produced by discretisation.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeElement {
    /// Element centroid (m).
    pub position: Vector3<f64>,
    /// Element volume (m^3).
    pub volume: f64,
}

fn check_count(name: &'static str, value: usize) -> Result<(), DiscretiseError> {
    if value == 0 {
        return Err(DiscretiseError::InvalidCount { name, value });
    }
    Ok(())
}

fn check_size(size: f64) -> Result<(), DiscretiseError> {
    if !size.is_finite() || size <= 0.0 {
        return Err(DiscretiseError::InvalidElementSize(size));
    }
    Ok(())
}

/// Discretise any shape into a cubic raster of side `element_size`.
pub fn discretise_raster(
    shape: &dyn ShapeQuery,
    element_size: f64,
) -> Result<Vec<LatticeElement>, DiscretiseError> {
    discretise_raster_where(shape, element_size, |_| true)
}

/// Raster of `shape` keeping only cells that do not lie inside `excluded`.
///
/// Used to separate a sample from a container that overlaps it.
pub fn discretise_raster_excluding(
    shape: &dyn ShapeQuery,
    excluded: &dyn ShapeQuery,
    element_size: f64,
) -> Result<Vec<LatticeElement>, DiscretiseError> {
    discretise_raster_where(shape, element_size, |p| !excluded.contains(p))
}

/// Cells along each axis needed to cover `extent`, at least one per axis.
/// Float-to-int casts saturate, so huge counts stay representable.
fn cell_counts(extent: &Vector3<f64>, element_size: f64) -> Vector3<usize> {
    extent.map(|e| ((e / element_size).ceil() as usize).max(1))
}

/// Total cell count, refused when it overflows or exceeds [`MAX_RASTER_CELLS`].
fn check_cells(counts: &Vector3<usize>) -> Result<u64, DiscretiseError> {
    let cells = counts
        .iter()
        .try_fold(1u64, |acc, &n| acc.checked_mul(n as u64));
    match cells {
        Some(cells) if cells <= MAX_RASTER_CELLS => Ok(cells),
        _ => Err(DiscretiseError::TooManyCells {
            cells: cells.unwrap_or(u64::MAX),
            limit: MAX_RASTER_CELLS,
        }),
    }
}

fn discretise_raster_where<F>(
    shape: &dyn ShapeQuery,
    element_size: f64,
    keep: F,
) -> Result<Vec<LatticeElement>, DiscretiseError>
where
    F: Fn(&Vector3<f64>) -> bool,
{
    check_size(element_size)?;

    let (min, max) = shape.bounding_box();
    let centre = (min + max) * 0.5;
    let counts = cell_counts(&(max - min), element_size);
    let cells = check_cells(&counts)?;

    // Centre the lattice on the bounding box so symmetric shapes give
    // symmetric element sets.
    let start = centre - counts.map(|n| n as f64) * (0.5 * element_size);
    let volume = element_size.powi(3);
    let mut elements = Vec::new();

    for i in 0..counts.x {
        let x = start.x + (i as f64 + 0.5) * element_size;
        for j in 0..counts.y {
            let y = start.y + (j as f64 + 0.5) * element_size;
            for k in 0..counts.z {
                let z = start.z + (k as f64 + 0.5) * element_size;
                let p = Vector3::new(x, y, z);
                if shape.contains(&p) && keep(&p) {
                    elements.push(LatticeElement { position: p, volume });
                }
            }
        }
    }

    log::debug!(
        "Raster {}x{}x{} at {:.3e} m kept {} of {} cells",
        counts.x,
        counts.y,
        counts.z,
        element_size,
        elements.len(),
        cells
    );

    Ok(elements)
}

/// Closed-form slice/annulus decomposition of a solid cylinder.
pub fn discretise_cylinder(
    cylinder: &Cylinder,
    num_slices: usize,
    num_annuli: usize,
) -> Result<Vec<LatticeElement>, DiscretiseError> {
    annular_elements(
        &cylinder.base_centre,
        &cylinder.unit_axis(),
        cylinder.height,
        cylinder.radius,
        num_slices,
        num_annuli,
    )
}

fn annular_elements(
    base: &Vector3<f64>,
    axis: &Vector3<f64>,
    height: f64,
    radius: f64,
    num_slices: usize,
    num_annuli: usize,
) -> Result<Vec<LatticeElement>, DiscretiseError> {
    check_count("Number of slices", num_slices)?;
    check_count("Number of annuli", num_annuli)?;

    let placement =
        Transform::aligning(&Vector3::z(), axis).then(&Transform::translation(*base));
    let slice_thickness = height / num_slices as f64;
    let delta_r = radius / num_annuli as f64;

    let segments_total: usize = (0..num_annuli).map(|j| 6 * (j + 1)).sum();
    let mut elements = Vec::with_capacity(num_slices * segments_total);

    for i in 0..num_slices {
        let z = (i as f64 + 0.5) * slice_thickness;
        for j in 0..num_annuli {
            let segments = 6 * (j + 1);
            let d_phi = 2.0 * PI / segments as f64;
            let r_in = j as f64 * delta_r;
            let r_out = r_in + delta_r;
            let r_mid = r_in + 0.5 * delta_r;
            let volume = slice_thickness * 0.5 * d_phi * (r_out * r_out - r_in * r_in);
            for k in 0..segments {
                let phi = d_phi * k as f64;
                let local = Vector3::new(r_mid * phi.cos(), r_mid * phi.sin(), z);
                elements.push(LatticeElement {
                    position: placement.apply(&local),
                    volume,
                });
            }
        }
    }

    Ok(elements)
}

/// Closed-form shell decomposition of a sphere.
///
/// Shell `j` is cut into `3·(j+1)` polar bands of equal solid angle, each
/// split into `6·(j+1)` azimuthal segments.
pub fn discretise_sphere(
    sphere: &Sphere,
    num_shells: usize,
) -> Result<Vec<LatticeElement>, DiscretiseError> {
    check_count("Number of shells", num_shells)?;

    let delta_r = sphere.radius / num_shells as f64;
    let mut elements = Vec::new();

    for j in 0..num_shells {
        let r_in = j as f64 * delta_r;
        let r_out = r_in + delta_r;
        let r_mid = r_in + 0.5 * delta_r;
        let bands = 3 * (j + 1);
        let segments = 6 * (j + 1);
        let d_cos = 2.0 / bands as f64;
        let d_phi = 2.0 * PI / segments as f64;
        let volume = (r_out.powi(3) - r_in.powi(3)) / 3.0 * d_cos * d_phi;
        for m in 0..bands {
            let cos_theta = 1.0 - (m as f64 + 0.5) * d_cos;
            let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
            for k in 0..segments {
                let phi = (k as f64 + 0.5) * d_phi;
                let dir = Vector3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);
                elements.push(LatticeElement {
                    position: sphere.centre + dir * r_mid,
                    volume,
                });
            }
        }
    }

    Ok(elements)
}

/// Regular grid that exactly tiles a cuboid, with cells no larger than
/// `element_size` along any axis.
pub fn discretise_cuboid(
    cuboid: &Cuboid,
    element_size: f64,
) -> Result<Vec<LatticeElement>, DiscretiseError> {
    check_size(element_size)?;

    let full = cuboid.half_extents * 2.0;
    let counts = cell_counts(&full, element_size);
    let cells = check_cells(&counts)?;
    let step = full.component_div(&counts.map(|n| n as f64));
    let volume = step.x * step.y * step.z;
    let start = cuboid.centre - cuboid.half_extents;

    let mut elements = Vec::with_capacity(cells as usize);
    for i in 0..counts.x {
        for j in 0..counts.y {
            for k in 0..counts.z {
                let offset = Vector3::new(i as f64 + 0.5, j as f64 + 0.5, k as f64 + 0.5);
                elements.push(LatticeElement {
                    position: start + offset.component_mul(&step),
                    volume,
                });
            }
        }
    }

    Ok(elements)
}

/// Sum of element volumes (m^3).
pub fn total_volume(elements: &[LatticeElement]) -> f64 {
    elements.iter().map(|e| e.volume).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Ellipsoid, Primitive};
    use approx::assert_relative_eq;

    #[test]
    fn test_cylinder_volume_is_exact() {
        let cyl = Cylinder::centred(0.002, 0.004);
        let elements = discretise_cylinder(&cyl, 5, 4).unwrap();
        // 5 slices × (6 + 12 + 18 + 24) segments
        assert_eq!(elements.len(), 5 * 60);
        assert_relative_eq!(
            total_volume(&elements),
            PI * 0.002 * 0.002 * 0.004,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_cylinder_elements_inside() {
        let cyl = Cylinder {
            base_centre: Vector3::new(0.1, 0.2, 0.3),
            axis: Vector3::new(1.0, 1.0, 0.0),
            height: 0.05,
            radius: 0.01,
        };
        let shape = Primitive::Cylinder(cyl.clone());
        let elements = discretise_cylinder(&cyl, 3, 3).unwrap();
        for e in &elements {
            assert!(shape.contains(&e.position), "{:?} outside", e.position);
        }
    }

    #[test]
    fn test_sphere_volume_is_exact() {
        let sphere = Sphere {
            centre: Vector3::new(0.0, 0.0, 0.01),
            radius: 0.003,
        };
        let elements = discretise_sphere(&sphere, 4).unwrap();
        assert_relative_eq!(
            total_volume(&elements),
            4.0 / 3.0 * PI * 0.003f64.powi(3),
            max_relative = 1e-12
        );
        let shape = Primitive::Sphere(sphere);
        assert!(elements.iter().all(|e| shape.contains(&e.position)));
    }

    #[test]
    fn test_cuboid_tiles_plate() {
        let plate = Cuboid {
            centre: Vector3::zeros(),
            half_extents: Vector3::new(0.01, 0.02, 0.001),
        };
        let elements = discretise_cuboid(&plate, 0.0015).unwrap();
        assert_relative_eq!(total_volume(&elements), 8.0 * 0.01 * 0.02 * 0.001, max_relative = 1e-12);
        // ceil(0.02 / 0.0015) * ceil(0.04 / 0.0015) * ceil(0.002 / 0.0015)
        assert_eq!(elements.len(), 14 * 27 * 2);
    }

    #[test]
    fn test_raster_volume_approaches_analytic() {
        let ellipsoid = Primitive::Ellipsoid(Ellipsoid {
            centre: Vector3::zeros(),
            semi_axes: Vector3::new(0.004, 0.003, 0.002),
        });
        let exact = ellipsoid.analytic_volume();
        let coarse = total_volume(&discretise_raster(&ellipsoid, 0.0005).unwrap());
        let fine = total_volume(&discretise_raster(&ellipsoid, 0.0001).unwrap());
        assert_relative_eq!(coarse, exact, max_relative = 0.15);
        assert_relative_eq!(fine, exact, max_relative = 0.02);
    }

    #[test]
    fn test_raster_excluding_container() {
        let outer = Primitive::Cylinder(Cylinder::centred(0.004, 0.01));
        let core = Primitive::Cylinder(Cylinder::centred(0.002, 0.02));
        let wall = discretise_raster_excluding(&outer, &core, 0.0005).unwrap();
        assert!(!wall.is_empty());
        assert!(wall.iter().all(|e| !core.contains(&e.position)));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let cyl = Cylinder::centred(1.0, 1.0);
        assert!(matches!(
            discretise_cylinder(&cyl, 0, 3),
            Err(DiscretiseError::InvalidCount { .. })
        ));
        let shape = Primitive::Cylinder(cyl);
        assert!(matches!(
            discretise_raster(&shape, -1.0),
            Err(DiscretiseError::InvalidElementSize(_))
        ));
        assert!(matches!(
            discretise_raster(&shape, 1e-5),
            Err(DiscretiseError::TooManyCells { .. })
        ));
    }

    #[test]
    fn test_tiny_element_size_refused_without_overflow() {
        let sphere = Primitive::Sphere(Sphere {
            centre: Vector3::zeros(),
            radius: 0.01,
        });
        // 2e7 cells per axis: the product does not fit in u64.
        match discretise_raster(&sphere, 1e-9) {
            Err(DiscretiseError::TooManyCells { cells, limit }) => {
                assert_eq!(cells, u64::MAX);
                assert_eq!(limit, MAX_RASTER_CELLS);
            }
            other => panic!("expected TooManyCells, got {other:?}"),
        }

        let plate = Cuboid {
            centre: Vector3::zeros(),
            half_extents: Vector3::new(0.01, 0.01, 0.001),
        };
        assert!(matches!(
            discretise_cuboid(&plate, 1e-9),
            Err(DiscretiseError::TooManyCells { .. })
        ));
        // Fits in u64 but is far above the limit.
        match discretise_cuboid(&plate, 1e-6) {
            Err(DiscretiseError::TooManyCells { cells, .. }) => {
                assert!(cells > MAX_RASTER_CELLS && cells < u64::MAX);
            }
            other => panic!("expected TooManyCells, got {other:?}"),
        }
    }
}
