//! Planar polygon (vertex loop plus cached supporting plane).

use crate::float_types::Real;
use crate::mesh::Aabb;
use crate::mesh::plane::Plane;
use crate::mesh::vertex::Vertex;
use nalgebra::Point3;

/// A convex or near-planar polygon with at least three vertices.
///
/// The reliefs produced by this crate only ever contain triangles and quads,
/// so fan triangulation is exact for everything the exporter sees.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub vertices: Vec<Vertex>,
    pub plane: Plane,
}

impl Polygon {
    /// Build a polygon from a vertex loop; the supporting plane is derived
    /// from the loop winding.
    pub fn new(vertices: Vec<Vertex>) -> Self {
        debug_assert!(vertices.len() >= 3, "polygon needs at least 3 vertices");
        let plane = Plane::from_vertices(&vertices);
        Polygon { vertices, plane }
    }

    /// Reverse winding and flip all normals.
    pub fn flip(&mut self) {
        self.vertices.reverse();
        for v in &mut self.vertices {
            v.flip();
        }
        self.plane.flip();
    }

    /// Fan triangulation around the first vertex.
    pub fn triangulate(&self) -> Vec<[Vertex; 3]> {
        let mut triangles = Vec::with_capacity(self.vertices.len().saturating_sub(2));
        for i in 1..self.vertices.len().saturating_sub(1) {
            triangles.push([
                self.vertices[0].clone(),
                self.vertices[i].clone(),
                self.vertices[i + 1].clone(),
            ]);
        }
        triangles
    }

    pub fn bounding_box(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for v in &self.vertices {
            aabb.grow(&v.pos);
        }
        aabb
    }

    /// Area-weighted face normal length squared; used to drop slivers.
    pub fn area_squared(&self) -> Real {
        let mut normal = nalgebra::Vector3::zeros();
        for i in 1..self.vertices.len().saturating_sub(1) {
            let a: Point3<Real> = self.vertices[0].pos;
            let b = self.vertices[i].pos;
            let c = self.vertices[i + 1].pos;
            normal += (b - a).cross(&(c - a));
        }
        normal.norm_squared() * 0.25
    }
}
