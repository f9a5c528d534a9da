//! Positioning helpers composed by the placement pipeline.
//!
//! All of these operate on the mesh's baked world-space vertices (there is no
//! deferred modifier stack to forget to evaluate) and mutate the target mesh
//! in place. Targets and margins are in millimeters, geometry in meters.

use crate::float_types::{Real, mm_to_m};
use crate::mesh::Mesh;
use nalgebra::Vector3;

/// World-space dimensions `(max - min)` componentwise, meters.
pub fn world_dims(mesh: &Mesh) -> Vector3<Real> {
    mesh.bounding_box().extents()
}

/// Translate so the XY bounding-box center is at the world origin; Z untouched.
pub fn center_xy(mesh: &mut Mesh) {
    let c = mesh.bounding_box().center();
    mesh.translate(Vector3::new(-c.x, -c.y, 0.0));
}

/// Translate in Z so the bounding-box minimum Z is 0.
pub fn rest_on_z0(mesh: &mut Mesh) {
    let min_z = mesh.bounding_box().mins.z;
    mesh.translate(Vector3::new(0.0, 0.0, -min_z));
}

pub fn top_z(mesh: &Mesh) -> Real {
    mesh.bounding_box().maxs.z
}

pub fn bottom_z(mesh: &Mesh) -> Real {
    mesh.bounding_box().mins.z
}

/// Uniformly scale `mesh` to fit within `target_w_mm x target_h_mm` shrunk by
/// `margin_mm` on every side, then boosted by `size_boost`. Returns the final
/// world-space Z depth (meters).
///
/// Near-zero source dimensions short-circuit and return the unscaled depth.
pub fn uniform_fit(
    mesh: &mut Mesh,
    target_w_mm: Real,
    target_h_mm: Real,
    margin_mm: Real,
    size_boost: Real,
) -> Real {
    const EPS: Real = 1e-9;
    let d = world_dims(mesh);
    if d.x < EPS || d.y < EPS {
        return d.z;
    }

    let tw = (mm_to_m(target_w_mm) - 2.0 * mm_to_m(margin_mm)).max(1e-6);
    let th = (mm_to_m(target_h_mm) - 2.0 * mm_to_m(margin_mm)).max(1e-6);

    let scale = (tw / d.x).min(th / d.y) * size_boost;
    mesh.scale_uniform(scale);
    world_dims(mesh).z
}

/// Move `mesh` in Z only so its bottom equals `base`'s top plus `z_offset`.
pub fn snap_bottom_to_top(mesh: &mut Mesh, base: &Mesh, z_offset: Real) {
    let target = top_z(base) + z_offset;
    let dz = target - bottom_z(mesh);
    mesh.translate(Vector3::new(0.0, 0.0, dz));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::cuboid;
    use nalgebra::Point3;

    fn block(w: Real, h: Real, d: Real) -> Mesh {
        cuboid(w, h, d, &Point3::new(0.3, -0.2, 0.1))
    }

    #[test]
    fn uniform_fit_scale_law_width_tight() {
        // 0.2 x 0.1 source into a 100x100mm cell: width is the tight axis.
        let mut m = block(0.2, 0.1, 0.05);
        let margin = 5.0;
        let boost = 1.25;
        let depth = uniform_fit(&mut m, 100.0, 100.0, margin, boost);
        let expected_scale = (0.090 / 0.2) * boost;
        let d = world_dims(&m);
        assert!((d.x - 0.2 * expected_scale).abs() < 1e-12);
        assert!((d.y - 0.1 * expected_scale).abs() < 1e-12);
        assert!((depth - 0.05 * expected_scale).abs() < 1e-12);
    }

    #[test]
    fn uniform_fit_scale_law_height_tight() {
        // Swap the tight axis; the min() rule must pick the other ratio.
        let mut m = block(0.1, 0.2, 0.05);
        uniform_fit(&mut m, 100.0, 100.0, 5.0, 1.0);
        let d = world_dims(&m);
        assert!((d.y - 0.090).abs() < 1e-12);
        assert!(d.x < 0.090);
    }

    #[test]
    fn uniform_fit_degenerate_source_is_untouched() {
        let mut m = block(0.0, 0.1, 0.02);
        // Zero width would divide by ~0; must return current depth unscaled.
        let depth = uniform_fit(&mut m, 50.0, 50.0, 0.0, 1.0);
        assert!((depth - 0.02).abs() < 1e-12);
        assert!((world_dims(&m).y - 0.1).abs() < 1e-12);
    }

    #[test]
    fn center_and_rest_normalize_frame() {
        let mut m = block(0.1, 0.1, 0.1);
        center_xy(&mut m);
        rest_on_z0(&mut m);
        let bb = m.bounding_box();
        assert!(bb.center().x.abs() < 1e-12 && bb.center().y.abs() < 1e-12);
        assert!(bb.mins.z.abs() < 1e-12);
    }

    #[test]
    fn snap_rests_on_base_top() {
        let base = cuboid(1.0, 1.0, 0.003, &Point3::new(0.0, 0.0, -0.0015));
        let mut m = block(0.1, 0.1, 0.1);
        snap_bottom_to_top(&mut m, &base, 0.0005);
        assert!((bottom_z(&m) - 0.0005).abs() < 1e-12);
    }
}
