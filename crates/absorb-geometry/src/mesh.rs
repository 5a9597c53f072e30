//! Closed triangle meshes as queryable solids.

use nalgebra::Vector3;

use crate::parsers::obj::ObjMesh;
use crate::ray::{finish_hits, Ray};
use crate::shape::ShapeQuery;

/// Direction used for parity containment tests. Deliberately not aligned
/// with any axis so rays rarely graze mesh edges of axis-aligned models.
const PARITY_DIRECTION: [f64; 3] = [0.577_215_664_9, 0.301_029_995_7, 0.759_286_737_3];

/// A watertight triangle mesh.
#[derive(Debug, Clone)]
pub struct MeshShape {
    mesh: ObjMesh,
    bounds: (Vector3<f64>, Vector3<f64>),
}

impl MeshShape {
    pub fn new(mesh: ObjMesh) -> Self {
        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        for v in &mesh.vertices {
            min = min.inf(v);
            max = max.sup(v);
        }
        Self {
            mesh,
            bounds: (min, max),
        }
    }

    pub fn num_triangles(&self) -> usize {
        self.mesh.faces.len()
    }

    /// Enclosed volume from the divergence theorem (m^3).
    pub fn enclosed_volume(&self) -> f64 {
        self.mesh
            .faces
            .iter()
            .map(|f| {
                let [a, b, c] = self.corners(f);
                a.dot(&b.cross(&c))
            })
            .sum::<f64>()
            .abs()
            / 6.0
    }

    fn corners(&self, face: &[usize; 3]) -> [Vector3<f64>; 3] {
        [
            self.mesh.vertices[face[0]],
            self.mesh.vertices[face[1]],
            self.mesh.vertices[face[2]],
        ]
    }

    /// Möller–Trumbore ray/triangle test.
    fn hit_triangle(&self, face: &[usize; 3], ray: &Ray) -> Option<f64> {
        let [v0, v1, v2] = self.corners(face);
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let p = ray.direction.cross(&e2);
        let det = e1.dot(&p);
        if det.abs() < 1e-300 {
            return None;
        }
        let inv = 1.0 / det;
        let s = ray.origin - v0;
        let u = s.dot(&p) * inv;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(&e1);
        let v = ray.direction.dot(&q) * inv;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        Some(e2.dot(&q) * inv)
    }
}

impl ShapeQuery for MeshShape {
    fn has_valid_shape(&self) -> bool {
        self.mesh.faces.len() >= 4
            && self.mesh.vertices.iter().all(|v| v.iter().all(|c| c.is_finite()))
            && self.enclosed_volume() > 0.0
    }

    fn contains(&self, point: &Vector3<f64>) -> bool {
        let (min, max) = &self.bounds;
        if (0..3).any(|i| point[i] < min[i] || point[i] > max[i]) {
            return false;
        }
        match Ray::new(*point, Vector3::from(PARITY_DIRECTION)) {
            Some(ray) => self.intercept(&ray).len() % 2 == 1,
            None => false,
        }
    }

    fn intercept(&self, ray: &Ray) -> Vec<f64> {
        let hits = self
            .mesh
            .faces
            .iter()
            .filter_map(|f| self.hit_triangle(f, ray))
            .collect();
        finish_hits(hits)
    }

    fn bounding_box(&self) -> (Vector3<f64>, Vector3<f64>) {
        self.bounds
    }
}
