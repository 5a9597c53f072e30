//! Rays used for path-length queries through solids.

use nalgebra::Vector3;

/// Intersections closer than this to the ray origin are discarded, so a ray
/// launched from a point on a surface does not report that surface again.
pub const SURFACE_EPSILON: f64 = 1e-12;

/// A half-line defined by an origin and a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin point (m).
    pub origin: Vector3<f64>,
    /// Unit direction vector.
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Create a ray, normalising the direction.
    ///
    /// Returns `None` if the direction has zero (or non-finite) length.
    pub fn new(origin: Vector3<f64>, direction: Vector3<f64>) -> Option<Self> {
        let norm = direction.norm();
        if !norm.is_finite() || norm < f64::EPSILON {
            return None;
        }
        Some(Self {
            origin,
            direction: direction / norm,
        })
    }

    /// Create a ray from `origin` pointing at `target`.
    pub fn towards(origin: Vector3<f64>, target: Vector3<f64>) -> Option<Self> {
        Self::new(origin, target - origin)
    }

    /// Point along the ray at distance `t`.
    pub fn point_at(&self, t: f64) -> Vector3<f64> {
        self.origin + self.direction * t
    }
}

/// Roots of `a t^2 + 2 b t + c = 0` in ascending order, if real.
pub(crate) fn solve_half_quadratic(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    if a.abs() < f64::EPSILON {
        return None;
    }
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    // Avoid cancellation by computing the larger-magnitude root first.
    let q = if b >= 0.0 { -(b + sq) } else { -(b - sq) };
    let (t0, t1) = if q.abs() < f64::EPSILON {
        (-b / a, -b / a)
    } else {
        (q / a, c / q)
    };
    Some(if t0 <= t1 { (t0, t1) } else { (t1, t0) })
}

/// Sort a list of hit distances, drop hits behind the origin, and merge
/// coincident hits (a ray through an edge is reported by both faces).
pub(crate) fn finish_hits(mut hits: Vec<f64>) -> Vec<f64> {
    hits.retain(|t| t.is_finite() && *t > SURFACE_EPSILON);
    hits.sort_by(|a, b| a.total_cmp(b));
    hits.dedup_by(|a, b| (*a - *b).abs() <= SURFACE_EPSILON * b.abs().max(1.0));
    hits
}
