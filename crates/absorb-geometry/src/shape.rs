//! The solid-geometry capability consumed by the correction engine.
//!
//! Anything that can answer "where does this ray cross my boundary?" and
//! "is this point inside me?" can be corrected for absorption. Parametric
//! [`Primitive`](crate::primitives::Primitive)s and triangle
//! [`MeshShape`](crate::mesh::MeshShape)s both implement [`ShapeQuery`].
//!
//! Implementations are queried concurrently from many worker threads, so
//! they must be free of hidden mutable state.

use nalgebra::Vector3;

use crate::ray::Ray;

/// A closed solid that supports ray and containment queries.
pub trait ShapeQuery: Send + Sync {
    /// Whether the shape is well formed (positive dimensions, finite values).
    /// Must hold before any other query is made.
    fn has_valid_shape(&self) -> bool;

    /// Whether `point` lies inside (or on the surface of) the solid.
    fn contains(&self, point: &Vector3<f64>) -> bool;

    /// Distances along `ray` at which it crosses the boundary, ascending.
    /// Only crossings in front of the origin are reported.
    fn intercept(&self, ray: &Ray) -> Vec<f64>;

    /// Axis-aligned bounding box as `(min_corner, max_corner)`.
    fn bounding_box(&self) -> (Vector3<f64>, Vector3<f64>);

    /// Total length of `ray` that lies inside the solid.
    ///
    /// Works for origins both inside and outside the solid and for
    /// non-convex shapes that the ray enters several times.
    fn distance_inside(&self, ray: &Ray) -> f64 {
        length_inside(&self.intercept(ray), self.contains(&ray.origin))
    }
}

/// Length covered by the in-solid segments of a ray, given its ascending
/// boundary crossings and whether the origin starts inside.
pub fn length_inside(hits: &[f64], starts_inside: bool) -> f64 {
    let mut inside = starts_inside;
    let mut previous = 0.0;
    let mut total = 0.0;
    for &t in hits {
        if inside {
            total += t - previous;
        }
        inside = !inside;
        previous = t;
    }
    total
}

impl<T: ShapeQuery + ?Sized> ShapeQuery for &T {
    fn has_valid_shape(&self) -> bool {
        (**self).has_valid_shape()
    }

    fn contains(&self, point: &Vector3<f64>) -> bool {
        (**self).contains(point)
    }

    fn intercept(&self, ray: &Ray) -> Vec<f64> {
        (**self).intercept(ray)
    }

    fn bounding_box(&self) -> (Vector3<f64>, Vector3<f64>) {
        (**self).bounding_box()
    }
}

impl<T: ShapeQuery + ?Sized> ShapeQuery for std::sync::Arc<T> {
    fn has_valid_shape(&self) -> bool {
        (**self).has_valid_shape()
    }

    fn contains(&self, point: &Vector3<f64>) -> bool {
        (**self).contains(point)
    }

    fn intercept(&self, ray: &Ray) -> Vec<f64> {
        (**self).intercept(ray)
    }

    fn bounding_box(&self) -> (Vector3<f64>, Vector3<f64>) {
        (**self).bounding_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{HollowCylinder, Primitive, Sphere};

    #[test]
    fn test_distance_inside_from_centre() {
        let sphere = Primitive::Sphere(Sphere {
            centre: Vector3::zeros(),
            radius: 2.0,
        });
        let ray = Ray::new(Vector3::zeros(), Vector3::x()).unwrap();
        assert!((sphere.distance_inside(&ray) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_inside_from_outside() {
        let sphere = Primitive::Sphere(Sphere {
            centre: Vector3::zeros(),
            radius: 1.0,
        });
        let ray = Ray::new(Vector3::new(-5.0, 0.0, 0.0), Vector3::x()).unwrap();
        assert!((sphere.distance_inside(&ray) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_inside_counts_both_annulus_walls() {
        let can = Primitive::HollowCylinder(HollowCylinder {
            base_centre: Vector3::new(0.0, 0.0, -1.0),
            axis: Vector3::z(),
            height: 2.0,
            inner_radius: 1.0,
            outer_radius: 1.5,
        });
        // Start inside the hollow core, travel along +x: crosses one wall.
        let ray = Ray::new(Vector3::zeros(), Vector3::x()).unwrap();
        assert!((can.distance_inside(&ray) - 0.5).abs() < 1e-12);
        // Start outside, travel through the whole can: crosses both walls.
        let ray = Ray::new(Vector3::new(-3.0, 0.0, 0.0), Vector3::x()).unwrap();
        assert!((can.distance_inside(&ray) - 1.0).abs() < 1e-12);
    }
}
