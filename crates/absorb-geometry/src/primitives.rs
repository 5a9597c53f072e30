//! Parametric geometric primitives.
//!
//! Each primitive defines a closed volume in 3D space that can be queried
//! by rays and discretised into volume elements by the
//! [`discretise`](crate::discretise) module. Primitives are fully described
//! by their TOML parameters. All lengths are in metres.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::ray::{finish_hits, solve_half_quadratic, Ray};
use crate::shape::ShapeQuery;

/// A built-in sample or container shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    Sphere(Sphere),
    Cylinder(Cylinder),
    HollowCylinder(HollowCylinder),
    Cuboid(Cuboid),
    Ellipsoid(Ellipsoid),
}

/// A sphere defined by its centre and radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sphere {
    /// Centre position (m).
    #[serde(default = "origin")]
    pub centre: Vector3<f64>,
    /// Radius (m).
    pub radius: f64,
}

/// A solid cylinder defined by its bottom end-cap centre, axis, and radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cylinder {
    /// Centre of the bottom end-cap (m).
    pub base_centre: Vector3<f64>,
    /// Axis direction (normalised internally).
    #[serde(default = "vertical")]
    pub axis: Vector3<f64>,
    /// Length along the axis (m).
    pub height: f64,
    /// Radius (m).
    pub radius: f64,
}

/// An annular can: the usual container around a cylindrical sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HollowCylinder {
    /// Centre of the bottom end-cap (m).
    pub base_centre: Vector3<f64>,
    /// Axis direction (normalised internally).
    #[serde(default = "vertical")]
    pub axis: Vector3<f64>,
    /// Length along the axis (m).
    pub height: f64,
    /// Radius of the hollow core (m).
    pub inner_radius: f64,
    /// Outer wall radius (m).
    pub outer_radius: f64,
}

/// An axis-aligned cuboid (flat plate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cuboid {
    /// Centre position (m).
    #[serde(default = "origin")]
    pub centre: Vector3<f64>,
    /// Half-extents along x, y, z (m).
    pub half_extents: Vector3<f64>,
}

/// An axis-aligned ellipsoid defined by its centre and semi-axis lengths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Centre position (m).
    #[serde(default = "origin")]
    pub centre: Vector3<f64>,
    /// Semi-axis lengths along x, y, z (m).
    pub semi_axes: Vector3<f64>,
}

fn origin() -> Vector3<f64> {
    Vector3::zeros()
}

fn vertical() -> Vector3<f64> {
    Vector3::y()
}

impl Cylinder {
    /// Cylinder of the given radius and height centred on the origin with
    /// its axis along +y (vertical, perpendicular to a beam along +z).
    pub fn centred(radius: f64, height: f64) -> Self {
        Self {
            base_centre: Vector3::new(0.0, -0.5 * height, 0.0),
            axis: Vector3::y(),
            height,
            radius,
        }
    }

    pub fn unit_axis(&self) -> Vector3<f64> {
        self.axis.normalize()
    }
}

impl HollowCylinder {
    /// Can centred on the origin with its axis along +y.
    pub fn centred(inner_radius: f64, outer_radius: f64, height: f64) -> Self {
        Self {
            base_centre: Vector3::new(0.0, -0.5 * height, 0.0),
            axis: Vector3::y(),
            height,
            inner_radius,
            outer_radius,
        }
    }

    pub fn unit_axis(&self) -> Vector3<f64> {
        self.axis.normalize()
    }
}

impl Primitive {
    /// Exact enclosed volume (m^3).
    pub fn analytic_volume(&self) -> f64 {
        use std::f64::consts::PI;
        match self {
            Primitive::Sphere(s) => 4.0 / 3.0 * PI * s.radius.powi(3),
            Primitive::Cylinder(c) => PI * c.radius * c.radius * c.height,
            Primitive::HollowCylinder(h) => {
                PI * (h.outer_radius * h.outer_radius - h.inner_radius * h.inner_radius) * h.height
            }
            Primitive::Cuboid(c) => 8.0 * c.half_extents.x * c.half_extents.y * c.half_extents.z,
            Primitive::Ellipsoid(e) => {
                4.0 / 3.0 * PI * e.semi_axes.x * e.semi_axes.y * e.semi_axes.z
            }
        }
    }

    /// Short lowercase name, as used in configuration files.
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Sphere(_) => "sphere",
            Primitive::Cylinder(_) => "cylinder",
            Primitive::HollowCylinder(_) => "hollow_cylinder",
            Primitive::Cuboid(_) => "cuboid",
            Primitive::Ellipsoid(_) => "ellipsoid",
        }
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn finite(v: &Vector3<f64>) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// Hits of a ray with a capped (optionally hollow) cylinder.
fn cylinder_hits(
    base: &Vector3<f64>,
    axis: &Vector3<f64>,
    height: f64,
    outer: f64,
    inner: Option<f64>,
    ray: &Ray,
) -> Vec<f64> {
    let rel = ray.origin - base;
    let o_ax = rel.dot(axis);
    let d_ax = ray.direction.dot(axis);
    let o_perp = rel - axis * o_ax;
    let d_perp = ray.direction - axis * d_ax;

    let mut hits = Vec::with_capacity(6);
    let within_height = |t: f64| {
        let h = o_ax + t * d_ax;
        (0.0..=height).contains(&h)
    };

    let a = d_perp.dot(&d_perp);
    let b = o_perp.dot(&d_perp);
    for radius in std::iter::once(outer).chain(inner) {
        let c = o_perp.dot(&o_perp) - radius * radius;
        if let Some((t0, t1)) = solve_half_quadratic(a, b, c) {
            hits.extend([t0, t1].into_iter().filter(|&t| within_height(t)));
        }
    }

    if d_ax.abs() > f64::EPSILON {
        let inner_sq = inner.map_or(0.0, |r| r * r);
        for cap in [0.0, height] {
            let t = (cap - o_ax) / d_ax;
            let r = o_perp + d_perp * t;
            let r_sq = r.dot(&r);
            if r_sq <= outer * outer && r_sq >= inner_sq {
                hits.push(t);
            }
        }
    }

    finish_hits(hits)
}

fn cylinder_contains(
    base: &Vector3<f64>,
    axis: &Vector3<f64>,
    height: f64,
    outer: f64,
    inner: f64,
    point: &Vector3<f64>,
) -> bool {
    let rel = point - base;
    let h = rel.dot(axis);
    if !(0.0..=height).contains(&h) {
        return false;
    }
    let radial = rel - axis * h;
    let r_sq = radial.dot(&radial);
    r_sq <= outer * outer && r_sq >= inner * inner
}

fn cylinder_bounds(
    base: &Vector3<f64>,
    axis: &Vector3<f64>,
    height: f64,
    radius: f64,
) -> (Vector3<f64>, Vector3<f64>) {
    let top = base + axis * height;
    // Half-width of the end discs projected onto each world axis.
    let spread = axis.map(|a| (1.0 - a * a).max(0.0).sqrt() * radius);
    (base.inf(&top) - spread, base.sup(&top) + spread)
}

impl ShapeQuery for Primitive {
    fn has_valid_shape(&self) -> bool {
        match self {
            Primitive::Sphere(s) => finite(&s.centre) && positive(s.radius),
            Primitive::Cylinder(c) => {
                finite(&c.base_centre)
                    && positive(c.axis.norm())
                    && positive(c.height)
                    && positive(c.radius)
            }
            Primitive::HollowCylinder(h) => {
                finite(&h.base_centre)
                    && positive(h.axis.norm())
                    && positive(h.height)
                    && h.inner_radius >= 0.0
                    && positive(h.outer_radius)
                    && h.inner_radius < h.outer_radius
            }
            Primitive::Cuboid(c) => finite(&c.centre) && c.half_extents.iter().all(|&v| positive(v)),
            Primitive::Ellipsoid(e) => finite(&e.centre) && e.semi_axes.iter().all(|&v| positive(v)),
        }
    }

    fn contains(&self, point: &Vector3<f64>) -> bool {
        match self {
            Primitive::Sphere(s) => (point - s.centre).norm_squared() <= s.radius * s.radius,
            Primitive::Cylinder(c) => {
                cylinder_contains(&c.base_centre, &c.unit_axis(), c.height, c.radius, 0.0, point)
            }
            Primitive::HollowCylinder(h) => cylinder_contains(
                &h.base_centre,
                &h.unit_axis(),
                h.height,
                h.outer_radius,
                h.inner_radius,
                point,
            ),
            Primitive::Cuboid(c) => (point - c.centre)
                .iter()
                .zip(c.half_extents.iter())
                .all(|(d, h)| d.abs() <= *h),
            Primitive::Ellipsoid(e) => {
                let scaled = (point - e.centre).component_div(&e.semi_axes);
                scaled.norm_squared() <= 1.0
            }
        }
    }

    fn intercept(&self, ray: &Ray) -> Vec<f64> {
        match self {
            Primitive::Sphere(s) => {
                let rel = ray.origin - s.centre;
                let b = rel.dot(&ray.direction);
                let c = rel.dot(&rel) - s.radius * s.radius;
                match solve_half_quadratic(1.0, b, c) {
                    Some((t0, t1)) => finish_hits(vec![t0, t1]),
                    None => Vec::new(),
                }
            }
            Primitive::Cylinder(c) => {
                cylinder_hits(&c.base_centre, &c.unit_axis(), c.height, c.radius, None, ray)
            }
            Primitive::HollowCylinder(h) => cylinder_hits(
                &h.base_centre,
                &h.unit_axis(),
                h.height,
                h.outer_radius,
                Some(h.inner_radius),
                ray,
            ),
            Primitive::Cuboid(c) => {
                let mut t_near = f64::NEG_INFINITY;
                let mut t_far = f64::INFINITY;
                for i in 0..3 {
                    let lo = c.centre[i] - c.half_extents[i];
                    let hi = c.centre[i] + c.half_extents[i];
                    let o = ray.origin[i];
                    let d = ray.direction[i];
                    if d.abs() < f64::EPSILON {
                        if o < lo || o > hi {
                            return Vec::new();
                        }
                        continue;
                    }
                    let (t0, t1) = {
                        let a = (lo - o) / d;
                        let b = (hi - o) / d;
                        if a <= b { (a, b) } else { (b, a) }
                    };
                    t_near = t_near.max(t0);
                    t_far = t_far.min(t1);
                }
                if t_near > t_far {
                    return Vec::new();
                }
                finish_hits(vec![t_near, t_far])
            }
            Primitive::Ellipsoid(e) => {
                let o = (ray.origin - e.centre).component_div(&e.semi_axes);
                let d = ray.direction.component_div(&e.semi_axes);
                match solve_half_quadratic(d.dot(&d), o.dot(&d), o.dot(&o) - 1.0) {
                    Some((t0, t1)) => finish_hits(vec![t0, t1]),
                    None => Vec::new(),
                }
            }
        }
    }

    fn bounding_box(&self) -> (Vector3<f64>, Vector3<f64>) {
        match self {
            Primitive::Sphere(s) => {
                let r = Vector3::repeat(s.radius);
                (s.centre - r, s.centre + r)
            }
            Primitive::Cylinder(c) => {
                cylinder_bounds(&c.base_centre, &c.unit_axis(), c.height, c.radius)
            }
            Primitive::HollowCylinder(h) => {
                cylinder_bounds(&h.base_centre, &h.unit_axis(), h.height, h.outer_radius)
            }
            Primitive::Cuboid(c) => (c.centre - c.half_extents, c.centre + c.half_extents),
            Primitive::Ellipsoid(e) => (e.centre - e.semi_axes, e.centre + e.semi_axes),
        }
    }
}
