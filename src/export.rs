//! Binary STL export. Geometry is carried in meters internally and written
//! in millimeters, the unit slicers assume.

use crate::errors::CardError;
use crate::float_types::{Real, m_to_mm};
use crate::mesh::Mesh;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use stl_io::{Normal, Triangle, Vertex as StlVertex};
use tracing::info;

/// Write `mesh` as binary STL at `path`, scaled to millimeters. Degenerate
/// facets are skipped; an entirely empty export is an error.
pub fn write_binary_stl(mesh: &Mesh, path: &Path) -> Result<(), CardError> {
    let mut triangles = Vec::<Triangle>::new();
    mesh.visit_triangles(|tri| {
        let a = tri[0].pos.coords;
        let b = tri[1].pos.coords;
        let c = tri[2].pos.coords;
        let face = (b - a).cross(&(c - a));
        if face.norm_squared() < 1e-24 {
            return;
        }
        let n = face.normalize();
        triangles.push(Triangle {
            normal: Normal::new([n.x as f32, n.y as f32, n.z as f32]),
            vertices: tri.map(|v| {
                StlVertex::new([
                    m_to_mm(v.pos.x) as f32,
                    m_to_mm(v.pos.y) as f32,
                    m_to_mm(v.pos.z) as f32,
                ])
            }),
        });
    });
    if triangles.is_empty() {
        return Err(CardError::EmptyExport);
    }

    let file = File::create(path).map_err(|e| CardError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| CardError::io(path, e))?;
    info!(path = %path.display(), facets = triangles.len(), "wrote binary STL");
    Ok(())
}

/// Largest absolute coordinate in mm, for sanity checks on assembled exports.
pub fn max_abs_coord_mm(mesh: &Mesh) -> Real {
    let bb = mesh.bounding_box();
    let mut largest: Real = 0.0;
    for axis in 0..3 {
        largest = largest.max(bb.mins[axis].abs()).max(bb.maxs[axis].abs());
    }
    m_to_mm(largest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::cuboid;
    use nalgebra::Point3;

    #[test]
    fn stl_roundtrip_is_millimeters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.stl");
        // 130x170x3 mm plate expressed in meters, top at Z=0.
        let plate = cuboid(0.13, 0.17, 0.003, &Point3::new(0.0, 0.0, -0.0015));
        write_binary_stl(&plate, &path).unwrap();

        let mut file = File::open(&path).unwrap();
        let stl = stl_io::read_stl(&mut file).unwrap();
        assert_eq!(stl.faces.len(), 12);

        let mut max = [f32::MIN; 3];
        let mut min = [f32::MAX; 3];
        for v in &stl.vertices {
            for axis in 0..3 {
                max[axis] = max[axis].max(v[axis]);
                min[axis] = min[axis].min(v[axis]);
            }
        }
        assert!((max[0] - 65.0).abs() < 1e-3);
        assert!((min[1] - -85.0).abs() < 1e-3);
        assert!((max[2] - 0.0).abs() < 1e-3);
        assert!((min[2] - -3.0).abs() < 1e-3);
    }

    #[test]
    fn empty_mesh_refuses_to_export() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_binary_stl(&Mesh::new(), &dir.path().join("empty.stl")).unwrap_err();
        assert!(matches!(err, CardError::EmptyExport));
    }
}
