//! Primitive solids: the base plate and the trim/cutter boxes are all cuboids.

use crate::float_types::Real;
use crate::mesh::{Mesh, polygon::Polygon, vertex::Vertex};
use nalgebra::{Point3, Vector3};

/// Axis-aligned cuboid of the given size centered at `center`, with outward
/// normals (six quads).
pub fn cuboid(width: Real, height: Real, depth: Real, center: &Point3<Real>) -> Mesh {
    let hx = width / 2.0;
    let hy = height / 2.0;
    let hz = depth / 2.0;
    let corner = |sx: Real, sy: Real, sz: Real| {
        Point3::new(center.x + sx * hx, center.y + sy * hy, center.z + sz * hz)
    };

    // (normal, four corners CCW seen from outside)
    let faces: [(Vector3<Real>, [Point3<Real>; 4]); 6] = [
        (
            -Vector3::x(),
            [
                corner(-1.0, -1.0, -1.0),
                corner(-1.0, -1.0, 1.0),
                corner(-1.0, 1.0, 1.0),
                corner(-1.0, 1.0, -1.0),
            ],
        ),
        (
            Vector3::x(),
            [
                corner(1.0, -1.0, -1.0),
                corner(1.0, 1.0, -1.0),
                corner(1.0, 1.0, 1.0),
                corner(1.0, -1.0, 1.0),
            ],
        ),
        (
            -Vector3::y(),
            [
                corner(-1.0, -1.0, -1.0),
                corner(1.0, -1.0, -1.0),
                corner(1.0, -1.0, 1.0),
                corner(-1.0, -1.0, 1.0),
            ],
        ),
        (
            Vector3::y(),
            [
                corner(-1.0, 1.0, -1.0),
                corner(-1.0, 1.0, 1.0),
                corner(1.0, 1.0, 1.0),
                corner(1.0, 1.0, -1.0),
            ],
        ),
        (
            -Vector3::z(),
            [
                corner(-1.0, -1.0, -1.0),
                corner(-1.0, 1.0, -1.0),
                corner(1.0, 1.0, -1.0),
                corner(1.0, -1.0, -1.0),
            ],
        ),
        (
            Vector3::z(),
            [
                corner(-1.0, -1.0, 1.0),
                corner(1.0, -1.0, 1.0),
                corner(1.0, 1.0, 1.0),
                corner(-1.0, 1.0, 1.0),
            ],
        ),
    ];

    let polygons = faces
        .into_iter()
        .map(|(normal, pts)| {
            Polygon::new(pts.into_iter().map(|p| Vertex::new(p, normal)).collect())
        })
        .collect();
    Mesh::from_polygons(polygons)
}
