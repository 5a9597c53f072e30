//! Rigid placement of locally-built geometry.
//!
//! Closed-form discretisations generate elements in a canonical frame (axis
//! along +z, base at the origin). A [`Transform`] carries them into the
//! world frame of the shape they belong to.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// An affine transformation: rotation/scale matrix + translation.
#[derive(Debug, Clone)]
pub struct Transform {
    /// 3x3 rotation/scale matrix.
    pub matrix: Matrix3<f64>,
    /// Translation vector (m).
    pub translation: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

impl Transform {
    /// Create a pure translation.
    pub fn translation(offset: Vector3<f64>) -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: offset,
        }
    }

    /// Rotation taking the unit vector `from` onto the unit vector `to`.
    ///
    /// Antiparallel vectors have no unique rotation; a half turn about any
    /// axis perpendicular to `from` is used.
    pub fn aligning(from: &Vector3<f64>, to: &Vector3<f64>) -> Self {
        let rotation = Rotation3::rotation_between(from, to).unwrap_or_else(|| {
            let perp = if from.x.abs() < 0.9 {
                from.cross(&Vector3::x())
            } else {
                from.cross(&Vector3::y())
            };
            Rotation3::from_axis_angle(
                &nalgebra::Unit::new_normalize(perp),
                std::f64::consts::PI,
            )
        });
        Self {
            matrix: *rotation.matrix(),
            translation: Vector3::zeros(),
        }
    }

    /// Apply this transformation to a point.
    pub fn apply(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * point + self.translation
    }

    /// Compose two transforms: self followed by other.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            matrix: other.matrix * self.matrix,
            translation: other.matrix * self.translation + other.translation,
        }
    }
}
