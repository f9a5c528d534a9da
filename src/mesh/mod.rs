//! Triangle/quad polygon-soup mesh with lazy bounds, in-place transforms and
//! BSP-backed clipping against solid cutters.

use crate::float_types::{EPSILON, Real};
use crate::mesh::bsp::Node;
use crate::mesh::plane::Plane;
use crate::mesh::polygon::Polygon;
use crate::mesh::vertex::Vertex;
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use std::sync::OnceLock;

pub mod bsp;
pub mod decimate;
pub mod plane;
pub mod polygon;
pub mod vertex;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub mins: Point3<Real>,
    pub maxs: Point3<Real>,
}

impl Aabb {
    pub fn empty() -> Self {
        Aabb {
            mins: Point3::new(Real::MAX, Real::MAX, Real::MAX),
            maxs: Point3::new(-Real::MAX, -Real::MAX, -Real::MAX),
        }
    }

    pub fn grow(&mut self, p: &Point3<Real>) {
        for axis in 0..3 {
            self.mins[axis] = self.mins[axis].min(p[axis]);
            self.maxs[axis] = self.maxs[axis].max(p[axis]);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mins.x > self.maxs.x
    }

    pub fn center(&self) -> Point3<Real> {
        nalgebra::center(&self.mins, &self.maxs)
    }

    /// Componentwise `max - min`; zero for an empty box.
    pub fn extents(&self) -> Vector3<Real> {
        if self.is_empty() {
            Vector3::zeros()
        } else {
            self.maxs - self.mins
        }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        !(self.is_empty() || other.is_empty())
            && (0..3).all(|axis| {
                self.mins[axis] <= other.maxs[axis] && self.maxs[axis] >= other.mins[axis]
            })
    }
}

/// A mesh as a set of polygons, with a lazily computed bounding box.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub polygons: Vec<Polygon>,
    bounding_box: OnceLock<Aabb>,
}

impl Mesh {
    pub fn new() -> Self {
        Mesh {
            polygons: Vec::new(),
            bounding_box: OnceLock::new(),
        }
    }

    pub fn from_polygons(polygons: Vec<Polygon>) -> Self {
        Mesh {
            polygons,
            bounding_box: OnceLock::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Number of triangles after fan triangulation.
    pub fn triangle_count(&self) -> usize {
        self.polygons
            .iter()
            .map(|p| p.vertices.len().saturating_sub(2))
            .sum()
    }

    pub fn bounding_box(&self) -> Aabb {
        *self.bounding_box.get_or_init(|| {
            let mut aabb = Aabb::empty();
            for poly in &self.polygons {
                for v in &poly.vertices {
                    aabb.grow(&v.pos);
                }
            }
            if aabb.is_empty() {
                aabb = Aabb {
                    mins: Point3::origin(),
                    maxs: Point3::origin(),
                };
            }
            aabb
        })
    }

    pub fn invalidate_bounding_box(&mut self) {
        self.bounding_box = OnceLock::new();
    }

    /// Translate in place.
    pub fn translate(&mut self, offset: Vector3<Real>) {
        for poly in &mut self.polygons {
            for v in &mut poly.vertices {
                v.pos += offset;
            }
            poly.plane = Plane::from_vertices(&poly.vertices);
        }
        self.invalidate_bounding_box();
    }

    /// Uniform scale about the world origin, in place. Normals are direction
    /// vectors and unaffected by a uniform scale.
    pub fn scale_uniform(&mut self, factor: Real) {
        for poly in &mut self.polygons {
            for v in &mut poly.vertices {
                v.pos = Point3::from(v.pos.coords * factor);
            }
            poly.plane = Plane::from_vertices(&poly.vertices);
        }
        self.invalidate_bounding_box();
    }

    /// Append another mesh's polygons (plain join, no boolean resolution).
    pub fn merge(&mut self, other: &Mesh) {
        self.polygons.extend_from_slice(&other.polygons);
        self.invalidate_bounding_box();
    }

    /// Split polygons into (may_touch, cannot_touch) by bounding-box tests so
    /// clipping only pays for geometry near the cutter.
    fn partition_polygons(&self, cutter_bb: &Aabb) -> (Vec<Polygon>, Vec<Polygon>) {
        let mut maybe = Vec::new();
        let mut never = Vec::new();
        for p in &self.polygons {
            if p.bounding_box().intersects(cutter_bb) {
                maybe.push(p.clone());
            } else {
                never.push(p.clone());
            }
        }
        (maybe, never)
    }

    /// Keep only the parts of this mesh inside `solid` (boolean intersection
    /// for an open sheet: the sheet is clipped, no cutter faces are added).
    pub fn clipped_inside(&self, solid: &Mesh) -> Mesh {
        let cutter_bb = solid.bounding_box();
        let (candidates, _outside) = self.partition_polygons(&cutter_bb);
        let mut tree = Node::from_polygons(&solid.polygons);
        tree.invert();
        Mesh::from_polygons(tree.clip_polygons(&candidates))
    }

    /// Remove the parts of this mesh inside `solid` (boolean difference for an
    /// open sheet).
    pub fn clipped_outside(&self, solid: &Mesh) -> Mesh {
        let cutter_bb = solid.bounding_box();
        let (candidates, passthru) = self.partition_polygons(&cutter_bb);
        let tree = Node::from_polygons(&solid.polygons);
        let mut kept = tree.clip_polygons(&candidates);
        kept.extend(passthru);
        Mesh::from_polygons(kept)
    }

    /// Angle-based smooth shading: vertex normals become the average of the
    /// face normals of adjacent faces within `angle_deg` of each other.
    /// Topology and positions are untouched.
    pub fn shade_smooth_by_angle(&mut self, angle_deg: Real) {
        let cos_threshold = angle_deg.to_radians().cos();
        let quantize = |p: &Point3<Real>| -> (i64, i64, i64) {
            const SCALE: Real = 1.0 / (EPSILON * 100.0);
            (
                (p.x * SCALE).round() as i64,
                (p.y * SCALE).round() as i64,
                (p.z * SCALE).round() as i64,
            )
        };

        let mut face_normals: HashMap<(i64, i64, i64), Vec<Vector3<Real>>> = HashMap::new();
        for poly in &self.polygons {
            let n = poly.plane.normal();
            for v in &poly.vertices {
                face_normals.entry(quantize(&v.pos)).or_default().push(n);
            }
        }

        for poly in &mut self.polygons {
            let face_n = poly.plane.normal();
            for v in &mut poly.vertices {
                let Some(adjacent) = face_normals.get(&quantize(&v.pos)) else {
                    continue;
                };
                let mut sum = Vector3::zeros();
                for n in adjacent {
                    if n.dot(&face_n) >= cos_threshold {
                        sum += *n;
                    }
                }
                if sum.norm_squared() > EPSILON {
                    v.normal = sum.normalize();
                }
            }
        }
    }

    /// Visit the fan triangulation of every polygon.
    pub fn visit_triangles<F>(&self, mut f: F)
    where
        F: FnMut([Vertex; 3]),
    {
        for poly in &self.polygons {
            for tri in poly.triangulate() {
                f(tri);
            }
        }
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::cuboid;

    #[test]
    fn cuboid_bounds_and_counts() {
        let cube = cuboid(2.0, 4.0, 6.0, &Point3::new(0.0, 0.0, -3.0));
        let bb = cube.bounding_box();
        assert!((bb.extents() - Vector3::new(2.0, 4.0, 6.0)).norm() < 1e-12);
        assert!((bb.maxs.z - 0.0).abs() < 1e-12);
        assert_eq!(cube.triangle_count(), 12);
    }

    #[test]
    fn clip_inside_keeps_covered_sheet_parts() {
        // A 2x2 sheet at z=0 clipped to a unit box keeps ~1x1 worth of area.
        let sheet = Mesh::from_polygons(vec![Polygon::new(vec![
            Vertex::new(Point3::new(-1.0, -1.0, 0.0), Vector3::z()),
            Vertex::new(Point3::new(1.0, -1.0, 0.0), Vector3::z()),
            Vertex::new(Point3::new(1.0, 1.0, 0.0), Vector3::z()),
            Vertex::new(Point3::new(-1.0, 1.0, 0.0), Vector3::z()),
        ])]);
        let cutter = cuboid(1.0, 1.0, 1.0, &Point3::origin());

        let kept = sheet.clipped_inside(&cutter);
        assert!(!kept.is_empty());
        let bb = kept.bounding_box();
        assert!(bb.extents().x <= 1.0 + 1e-9);
        assert!(bb.extents().y <= 1.0 + 1e-9);

        let outside = sheet.clipped_outside(&cutter);
        let area: Real = outside.polygons.iter().map(|p| p.area_squared().sqrt()).sum();
        assert!((area - 3.0).abs() < 1e-6);
    }

    #[test]
    fn translate_and_scale_move_bounds() {
        let mut cube = cuboid(1.0, 1.0, 1.0, &Point3::origin());
        cube.translate(Vector3::new(1.0, 0.0, 0.0));
        assert!((cube.bounding_box().center().x - 1.0).abs() < 1e-12);
        cube.scale_uniform(2.0);
        assert!((cube.bounding_box().extents().x - 2.0).abs() < 1e-12);
        assert!((cube.bounding_box().center().x - 2.0).abs() < 1e-12);
    }
}
