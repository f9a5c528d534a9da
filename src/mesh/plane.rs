//! Oriented plane and polygon classification/splitting used by the BSP tree.

use crate::float_types::{EPSILON, Real};
use crate::mesh::polygon::Polygon;
use crate::mesh::vertex::Vertex;
use nalgebra::{Point3, Vector3};

pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// A plane in `n · p = w` form with unit normal.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    normal: Vector3<Real>,
    w: Real,
}

impl Plane {
    pub fn from_normal(normal: Vector3<Real>, w: Real) -> Self {
        Plane {
            normal: normal.normalize(),
            w,
        }
    }

    /// Plane through three points; normal follows the right-hand rule
    /// `(p2-p1) × (p3-p1)`. Degenerate triples yield the XY plane.
    pub fn from_points(p1: &Point3<Real>, p2: &Point3<Real>, p3: &Point3<Real>) -> Self {
        let normal = (p2 - p1).cross(&(p3 - p1));
        if normal.norm_squared() < EPSILON * EPSILON {
            return Plane {
                normal: Vector3::z(),
                w: 0.0,
            };
        }
        let normal = normal.normalize();
        Plane {
            w: normal.dot(&p1.coords),
            normal,
        }
    }

    /// Best-effort supporting plane of a vertex loop: first non-degenerate
    /// triangle, oriented to agree with the loop's Newell normal.
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        if vertices.len() < 3 {
            return Plane {
                normal: Vector3::z(),
                w: 0.0,
            };
        }
        let mut plane =
            Self::from_points(&vertices[0].pos, &vertices[1].pos, &vertices[2].pos);

        // Newell's method over the full loop settles the winding for
        // near-degenerate leading triangles.
        let reference: Vector3<Real> = vertices
            .iter()
            .zip(vertices.iter().cycle().skip(1))
            .fold(Vector3::zeros(), |acc, (curr, next)| {
                acc + (curr.pos.coords).cross(&next.pos.coords)
            });
        if plane.normal.dot(&reference) < 0.0 {
            plane.flip();
        }
        plane
    }

    pub const fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    pub const fn offset(&self) -> Real {
        self.w
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Classify a point against the plane within [`EPSILON`].
    pub fn orient_point(&self, point: &Point3<Real>) -> i8 {
        let t = self.normal.dot(&point.coords) - self.w;
        if t < -EPSILON {
            BACK
        } else if t > EPSILON {
            FRONT
        } else {
            COPLANAR
        }
    }

    /// Side a coplanar polygon's plane faces relative to this one.
    pub fn orient_plane(&self, other: &Plane) -> i8 {
        if self.normal.dot(&other.normal) > 0.0 {
            FRONT
        } else {
            BACK
        }
    }

    /// Split `polygon` by this plane, returning
    /// `(coplanar_front, coplanar_back, front, back)`.
    pub fn split_polygon(
        &self,
        polygon: &Polygon,
    ) -> (Vec<Polygon>, Vec<Polygon>, Vec<Polygon>, Vec<Polygon>) {
        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();

        let types: Vec<i8> = polygon
            .vertices
            .iter()
            .map(|v| self.orient_point(&v.pos))
            .collect();
        let polygon_type = types.iter().fold(0, |acc, &t| acc | t);

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal()) > 0.0 {
                    coplanar_front.push(polygon.clone());
                } else {
                    coplanar_back.push(polygon.clone());
                }
            },
            FRONT => front.push(polygon.clone()),
            BACK => back.push(polygon.clone()),
            _ => {
                let mut split_front: Vec<Vertex> = Vec::with_capacity(polygon.vertices.len() + 1);
                let mut split_back: Vec<Vertex> = Vec::with_capacity(polygon.vertices.len() + 1);

                for i in 0..polygon.vertices.len() {
                    let j = (i + 1) % polygon.vertices.len();
                    let type_i = types[i];
                    let type_j = types[j];
                    let vertex_i = &polygon.vertices[i];
                    let vertex_j = &polygon.vertices[j];

                    if type_i != BACK {
                        split_front.push(vertex_i.clone());
                    }
                    if type_i != FRONT {
                        split_back.push(vertex_i.clone());
                    }

                    // Edge crosses the plane: interpolate the crossing vertex
                    // into both halves.
                    if (type_i | type_j) == SPANNING {
                        let denom = self.normal.dot(&(vertex_j.pos - vertex_i.pos));
                        if denom.abs() > EPSILON {
                            let t = (self.w - self.normal.dot(&vertex_i.pos.coords)) / denom;
                            let crossing = vertex_i.interpolate(vertex_j, t);
                            split_front.push(crossing.clone());
                            split_back.push(crossing);
                        }
                    }
                }

                if split_front.len() >= 3 {
                    front.push(Polygon::new(split_front));
                }
                if split_back.len() >= 3 {
                    back.push(Polygon::new(split_back));
                }
            },
        }

        (coplanar_front, coplanar_back, front, back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orient_point_classifies_halfspaces() {
        let plane = Plane::from_normal(Vector3::z(), 0.0);
        assert_eq!(plane.orient_point(&Point3::new(0.0, 0.0, 1.0)), FRONT);
        assert_eq!(plane.orient_point(&Point3::new(0.0, 0.0, -1.0)), BACK);
        assert_eq!(plane.orient_point(&Point3::new(5.0, -3.0, 0.0)), COPLANAR);
    }

    #[test]
    fn split_polygon_spanning_triangle() {
        let plane = Plane::from_normal(Vector3::x(), 0.0);
        let tri = Polygon::new(vec![
            Vertex::new(Point3::new(-1.0, 0.0, 0.0), Vector3::z()),
            Vertex::new(Point3::new(1.0, 0.0, 0.0), Vector3::z()),
            Vertex::new(Point3::new(1.0, 1.0, 0.0), Vector3::z()),
        ]);
        let (cf, cb, front, back) = plane.split_polygon(&tri);
        assert!(cf.is_empty() && cb.is_empty());
        assert_eq!(front.len(), 1);
        assert_eq!(back.len(), 1);
        // Crossing vertices sit on the splitting plane.
        for poly in front.iter().chain(back.iter()) {
            for v in &poly.vertices {
                assert!(v.pos.x >= -1.0 - 1e-12 && v.pos.x <= 1.0 + 1e-12);
            }
        }
    }
}
