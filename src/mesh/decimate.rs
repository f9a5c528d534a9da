//! Polygon-count reduction for export.
//!
//! Grid vertex clustering: vertices are snapped to the representative
//! (average) of their spatial cell and triangles that collapse are dropped.
//! Shape is preserved to within one cell; the cell size is searched so the
//! output lands near `ratio * input` triangles.

use crate::float_types::{EPSILON, Real};
use crate::mesh::{Mesh, polygon::Polygon, vertex::Vertex};
use nalgebra::Point3;
use std::collections::HashMap;
use tracing::debug;

/// Reduce `mesh` to roughly `ratio` of its triangle count (`0 < ratio <= 1`).
pub fn decimate_to_ratio(mesh: &Mesh, ratio: Real) -> Mesh {
    let input_triangles = mesh.triangle_count();
    if input_triangles == 0 || ratio >= 1.0 {
        return mesh.clone();
    }
    let target = ((input_triangles as Real * ratio).round() as usize).max(2);

    let bb = mesh.bounding_box();
    let extents = bb.extents();
    let max_extent = extents.x.max(extents.y).max(extents.z).max(EPSILON);

    // Displaced sheets carry ~2 triangles per grid cell, so an n-per-axis
    // cluster grid yields ~2n^2 triangles.
    let cells_per_axis = ((target as Real / 2.0).sqrt().ceil()).max(1.0);
    let mut cell_size = max_extent / cells_per_axis;

    let mut best = cluster(mesh, &bb.mins, cell_size);
    for _ in 0..4 {
        let count = best.triangle_count();
        if count <= target.saturating_mul(6) / 5 {
            break;
        }
        cell_size *= 1.25;
        best = cluster(mesh, &bb.mins, cell_size);
    }

    debug!(
        input_triangles,
        output_triangles = best.triangle_count(),
        target,
        "decimated mesh"
    );
    best
}

fn cluster(mesh: &Mesh, origin: &Point3<Real>, cell_size: Real) -> Mesh {
    let key = |p: &Point3<Real>| -> (i64, i64, i64) {
        (
            ((p.x - origin.x) / cell_size).floor() as i64,
            ((p.y - origin.y) / cell_size).floor() as i64,
            ((p.z - origin.z) / cell_size).floor() as i64,
        )
    };

    // First pass: representative position per occupied cell.
    let mut sums: HashMap<(i64, i64, i64), (Point3<Real>, usize)> = HashMap::new();
    mesh.visit_triangles(|tri| {
        for v in &tri {
            let entry = sums
                .entry(key(&v.pos))
                .or_insert((Point3::origin(), 0));
            entry.0 += v.pos.coords;
            entry.1 += 1;
        }
    });
    let representatives: HashMap<(i64, i64, i64), Point3<Real>> = sums
        .into_iter()
        .map(|(k, (sum, n))| (k, Point3::from(sum.coords / n as Real)))
        .collect();

    // Second pass: rebuild triangles through the representatives, dropping
    // the ones that collapse.
    let mut polygons = Vec::new();
    mesh.visit_triangles(|tri| {
        let keys = [key(&tri[0].pos), key(&tri[1].pos), key(&tri[2].pos)];
        if keys[0] == keys[1] || keys[1] == keys[2] || keys[0] == keys[2] {
            return;
        }
        let verts: Vec<Vertex> = tri
            .iter()
            .enumerate()
            .map(|(i, v)| Vertex::new(representatives[&keys[i]], v.normal))
            .collect();
        let poly = Polygon::new(verts);
        if poly.area_squared() > EPSILON * EPSILON {
            polygons.push(poly);
        }
    });

    Mesh::from_polygons(polygons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    /// Dense flat grid sheet for decimation exercises.
    fn dense_sheet(n: usize) -> Mesh {
        let step = 1.0 / n as Real;
        let mut polygons = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let x0 = i as Real * step;
                let y0 = j as Real * step;
                let corners = [
                    Point3::new(x0, y0, 0.0),
                    Point3::new(x0 + step, y0, 0.0),
                    Point3::new(x0 + step, y0 + step, 0.0),
                    Point3::new(x0, y0 + step, 0.0),
                ];
                polygons.push(Polygon::new(vec![
                    Vertex::new(corners[0], Vector3::z()),
                    Vertex::new(corners[1], Vector3::z()),
                    Vertex::new(corners[2], Vector3::z()),
                ]));
                polygons.push(Polygon::new(vec![
                    Vertex::new(corners[0], Vector3::z()),
                    Vertex::new(corners[2], Vector3::z()),
                    Vertex::new(corners[3], Vector3::z()),
                ]));
            }
        }
        Mesh::from_polygons(polygons)
    }

    #[test]
    fn reduces_triangle_count_and_keeps_bounds() {
        let sheet = dense_sheet(40);
        let before = sheet.triangle_count();
        let out = decimate_to_ratio(&sheet, 0.3);
        let after = out.triangle_count();
        assert!(after < before, "expected reduction, got {after} of {before}");
        // Shape preserved within a cluster cell.
        let bb = out.bounding_box();
        assert!(bb.extents().x <= 1.0 + 1e-9 && bb.extents().y <= 1.0 + 1e-9);
    }

    #[test]
    fn ratio_one_is_identity() {
        let sheet = dense_sheet(4);
        assert_eq!(
            decimate_to_ratio(&sheet, 1.0).triangle_count(),
            sheet.triangle_count()
        );
    }
}
