//! Displaced-relief builder: a subdivided plane displaced per-pixel by a depth
//! raster's luminance, with heightfield smoothing.
//!
//! The plane keeps a fixed footprint regardless of the source image aspect;
//! the target cell decides the final shape via `uniform_fit` during placement,
//! not the raw image. The flat backing rim is kept: the placement pipeline
//! sinks it into the base plate, where it hides the seam and binds the piece
//! to the card. The optional alpha cut-out mode removes see-through cells
//! instead (standalone silhouette export), and must not be used for pieces
//! that go onto a card.

use crate::config::PipelineConfig;
use crate::errors::CardError;
use crate::float_types::{Real, mm_to_m};
use crate::mesh::{Mesh, polygon::Polygon, vertex::Vertex};
use nalgebra::{Point3, Vector3};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ReliefParams {
    /// Displacement strength in meters; luminance 1.0 displaces this far.
    pub strength: Real,
    /// Grid cuts per axis (cells = cuts + 1).
    pub cuts: u32,
    pub plane_width_mm: Real,
    pub plane_height_mm: Real,
    pub smooth_iterations: u32,
    pub smooth_factor: Real,
    /// Remove cells whose color-image alpha falls below this threshold.
    /// `None` keeps the full backing plane (the card-assembly default).
    pub alpha_cutout: Option<Real>,
}

impl ReliefParams {
    pub fn figure(config: &PipelineConfig) -> Self {
        Self::with_strength(config, config.displacement_strength_figure)
    }

    pub fn accessory(config: &PipelineConfig) -> Self {
        Self::with_strength(config, config.displacement_strength_accessories)
    }

    fn with_strength(config: &PipelineConfig, strength: Real) -> Self {
        ReliefParams {
            strength,
            cuts: config.subdivide_cuts,
            plane_width_mm: config.relief_plane_width_mm,
            plane_height_mm: config.relief_plane_height_mm,
            smooth_iterations: config.smooth_iterations,
            smooth_factor: config.smooth_factor,
            alpha_cutout: None,
        }
    }
}

/// Build the displaced relief mesh for one (color, depth) pair.
///
/// The depth raster is sampled bilinearly via the grid's UV coordinates;
/// displacement is `luminance * strength` with mid-level 0, so black is no
/// displacement and white pops fully toward the viewer (+Z). A missing or
/// unloadable depth file is an error: there is no safe default depth map.
pub fn build_displaced_relief(
    depth_path: &Path,
    color_path: &Path,
    params: &ReliefParams,
) -> Result<Mesh, CardError> {
    if !depth_path.exists() {
        return Err(CardError::MissingInput(depth_path.to_path_buf()));
    }
    let depth = image::open(depth_path)
        .map_err(|source| CardError::Raster {
            path: depth_path.to_path_buf(),
            source,
        })?
        .to_luma32f();
    let (depth_w, depth_h) = depth.dimensions();

    let cells = params.cuts as usize + 1;
    let nv = cells + 1;
    let plane_w = mm_to_m(params.plane_width_mm);
    let plane_h = mm_to_m(params.plane_height_mm);
    let step_x = plane_w / cells as Real;
    let step_y = plane_h / cells as Real;

    // Per-vertex heights sampled through UV space; image V runs top-down.
    let mut heights = vec![0.0 as Real; nv * nv];
    for j in 0..nv {
        for i in 0..nv {
            let u = i as Real / cells as Real;
            let v = j as Real / cells as Real;
            let lum = sample_bilinear(depth_w, depth_h, u, 1.0 - v, |x, y| {
                depth.get_pixel(x, y).0[0] as Real
            });
            heights[j * nv + i] = lum * params.strength;
        }
    }

    smooth_heights(
        &mut heights,
        nv,
        params.smooth_iterations,
        params.smooth_factor,
        None,
    );

    // Optional silhouette mode: drop cells the color image is transparent
    // over, then relax the ragged cut boundary.
    let cell_mask = match params.alpha_cutout {
        Some(threshold) => {
            let mask = alpha_cell_mask(color_path, cells, threshold)?;
            let boundary = boundary_vertices(&mask, cells, nv);
            smooth_heights(&mut heights, nv, 5, 0.5, Some(&boundary));
            Some(mask)
        },
        None => None,
    };

    let mesh = grid_to_mesh(&heights, cells, nv, step_x, step_y, plane_w, plane_h, cell_mask.as_deref());
    info!(
        depth = %depth_path.display(),
        triangles = mesh.triangle_count(),
        strength = params.strength,
        "built displaced relief"
    );
    Ok(mesh)
}

/// Bilinear sample of a `[0,1]^2` UV position over a `w x h` raster.
fn sample_bilinear(
    w: u32,
    h: u32,
    u: Real,
    v: Real,
    get: impl Fn(u32, u32) -> Real,
) -> Real {
    let fx = (u.clamp(0.0, 1.0)) * (w.saturating_sub(1)) as Real;
    let fy = (v.clamp(0.0, 1.0)) * (h.saturating_sub(1)) as Real;
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = fx - x0 as Real;
    let ty = fy - y0 as Real;

    let top = get(x0, y0) * (1.0 - tx) + get(x1, y0) * tx;
    let bottom = get(x0, y1) * (1.0 - tx) + get(x1, y1) * tx;
    top * (1.0 - ty) + bottom * ty
}

/// Relax the heightfield: each pass blends every vertex toward its 4-neighbor
/// average by `factor`. Smoothing-only: XY positions never move, so the mesh
/// cannot shrink or inflate, only lose grid stair-stepping.
fn smooth_heights(
    heights: &mut [Real],
    nv: usize,
    iterations: u32,
    factor: Real,
    only: Option<&[bool]>,
) {
    for _ in 0..iterations {
        let snapshot = heights.to_vec();
        for j in 0..nv {
            for i in 0..nv {
                let idx = j * nv + i;
                if let Some(mask) = only {
                    if !mask[idx] {
                        continue;
                    }
                }
                let mut sum = 0.0;
                let mut count = 0.0;
                if i > 0 {
                    sum += snapshot[idx - 1];
                    count += 1.0;
                }
                if i + 1 < nv {
                    sum += snapshot[idx + 1];
                    count += 1.0;
                }
                if j > 0 {
                    sum += snapshot[idx - nv];
                    count += 1.0;
                }
                if j + 1 < nv {
                    sum += snapshot[idx + nv];
                    count += 1.0;
                }
                heights[idx] += factor * (sum / count - snapshot[idx]);
            }
        }
    }
}

/// Which grid cells the color image considers opaque enough to keep.
fn alpha_cell_mask(
    color_path: &Path,
    cells: usize,
    threshold: Real,
) -> Result<Vec<bool>, CardError> {
    if !color_path.exists() {
        return Err(CardError::MissingInput(color_path.to_path_buf()));
    }
    let color = image::open(color_path)
        .map_err(|source| CardError::Raster {
            path: color_path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    let (w, h) = color.dimensions();

    let mut mask = vec![false; cells * cells];
    let mut removed = 0usize;
    for cj in 0..cells {
        for ci in 0..cells {
            // Average the four cell corners in UV space.
            let mut alpha = 0.0;
            for (di, dj) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let u = (ci + di) as Real / cells as Real;
                let v = (cj + dj) as Real / cells as Real;
                alpha += sample_bilinear(w, h, u, 1.0 - v, |x, y| {
                    color.get_pixel(x, y).0[3] as Real / 255.0
                });
            }
            let keep = alpha / 4.0 >= threshold;
            mask[cj * cells + ci] = keep;
            if !keep {
                removed += 1;
            }
        }
    }
    debug!(removed, total = cells * cells, "alpha cut-out cell mask");
    Ok(mask)
}

/// Vertices on the kept/removed boundary of the cell mask.
fn boundary_vertices(mask: &[bool], cells: usize, nv: usize) -> Vec<bool> {
    let mut boundary = vec![false; nv * nv];
    for cj in 0..cells {
        for ci in 0..cells {
            if mask[cj * cells + ci] {
                continue;
            }
            // Corners of a removed cell adjoining a kept cell get relaxed.
            for (di, dj) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                boundary[(cj + dj) * nv + ci + di] = true;
            }
        }
    }
    boundary
}

#[allow(clippy::too_many_arguments)]
fn grid_to_mesh(
    heights: &[Real],
    cells: usize,
    nv: usize,
    step_x: Real,
    step_y: Real,
    plane_w: Real,
    plane_h: Real,
    cell_mask: Option<&[bool]>,
) -> Mesh {
    let position = |i: usize, j: usize| -> Point3<Real> {
        Point3::new(
            -plane_w / 2.0 + i as Real * step_x,
            -plane_h / 2.0 + j as Real * step_y,
            heights[j * nv + i],
        )
    };
    // Outward (+Z) normals from central differences of the heightfield.
    let normal = |i: usize, j: usize| -> Vector3<Real> {
        let h = |i: usize, j: usize| heights[j * nv + i];
        let dx = (h((i + 1).min(nv - 1), j) - h(i.saturating_sub(1), j))
            / (((i + 1).min(nv - 1) - i.saturating_sub(1)) as Real * step_x);
        let dy = (h(i, (j + 1).min(nv - 1)) - h(i, j.saturating_sub(1)))
            / (((j + 1).min(nv - 1) - j.saturating_sub(1)) as Real * step_y);
        Vector3::new(-dx, -dy, 1.0).normalize()
    };

    let mut polygons = Vec::with_capacity(cells * cells * 2);
    for cj in 0..cells {
        for ci in 0..cells {
            if let Some(mask) = cell_mask {
                if !mask[cj * cells + ci] {
                    continue;
                }
            }
            let v00 = Vertex::new(position(ci, cj), normal(ci, cj));
            let v10 = Vertex::new(position(ci + 1, cj), normal(ci + 1, cj));
            let v11 = Vertex::new(position(ci + 1, cj + 1), normal(ci + 1, cj + 1));
            let v01 = Vertex::new(position(ci, cj + 1), normal(ci, cj + 1));
            polygons.push(Polygon::new(vec![v00.clone(), v10, v11.clone()]));
            polygons.push(Polygon::new(vec![v00, v11, v01]));
        }
    }
    Mesh::from_polygons(polygons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, LumaA, Rgba, RgbaImage};

    fn params(cuts: u32) -> ReliefParams {
        ReliefParams {
            strength: 0.01,
            cuts,
            plane_width_mm: 80.0,
            plane_height_mm: 120.0,
            smooth_iterations: 5,
            smooth_factor: 0.5,
            alpha_cutout: None,
        }
    }

    fn write_gray(dir: &Path, name: &str, f: impl Fn(u32, u32) -> u8) -> std::path::PathBuf {
        let img = GrayImage::from_fn(64, 64, |x, y| Luma([f(x, y)]));
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn black_depth_builds_a_flat_plane() {
        let dir = tempfile::tempdir().unwrap();
        let depth = write_gray(dir.path(), "depth.png", |_, _| 0);
        let color = depth.clone();
        let mesh = build_displaced_relief(&depth, &color, &params(16)).unwrap();
        assert_eq!(mesh.triangle_count(), 17 * 17 * 2);
        let bb = mesh.bounding_box();
        assert!(bb.extents().z < 1e-9);
        assert!((bb.extents().x - 0.080).abs() < 1e-9);
        assert!((bb.extents().y - 0.120).abs() < 1e-9);
    }

    #[test]
    fn white_patch_displaces_toward_viewer_within_strength() {
        let dir = tempfile::tempdir().unwrap();
        let depth = write_gray(dir.path(), "depth.png", |x, y| {
            if (16..48).contains(&x) && (16..48).contains(&y) { 255 } else { 0 }
        });
        let mesh = build_displaced_relief(&depth, &depth, &params(32)).unwrap();
        let bb = mesh.bounding_box();
        assert!(bb.maxs.z > 0.005, "expected a positive bump");
        assert!(bb.maxs.z <= 0.01 + 1e-9, "displacement must not exceed strength");
        assert!(bb.mins.z >= -1e-9, "mid-level 0 never displaces backward");
    }

    #[test]
    fn missing_depth_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        let err = build_displaced_relief(&missing, &missing, &params(8)).unwrap_err();
        assert!(matches!(err, CardError::MissingInput(_)));
    }

    #[test]
    fn unreadable_depth_is_a_raster_error() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, b"not a png").unwrap();
        let err = build_displaced_relief(&bogus, &bogus, &params(8)).unwrap_err();
        assert!(matches!(err, CardError::Raster { .. }));
    }

    #[test]
    fn alpha_cutout_removes_transparent_cells() {
        let dir = tempfile::tempdir().unwrap();
        let depth = write_gray(dir.path(), "depth.png", |_, _| 128);
        // Left half opaque, right half transparent.
        let color = RgbaImage::from_fn(64, 64, |x, _| {
            Rgba([200, 10, 10, if x < 32 { 255 } else { 0 }])
        });
        let color_path = dir.path().join("color.png");
        color.save(&color_path).unwrap();

        let mut p = params(16);
        p.alpha_cutout = Some(0.1);
        let cut = build_displaced_relief(&depth, &color_path, &p).unwrap();
        let full = build_displaced_relief(&depth, &color_path, &params(16)).unwrap();
        assert!(cut.triangle_count() < full.triangle_count() / 2 + 17 * 2 * 2);
        // Kept geometry is the opaque (left) side.
        assert!(cut.bounding_box().maxs.x < 0.005);
    }

    #[test]
    fn smoothing_relaxes_single_spike() {
        // A lone white pixel on black: smoothing must pull the spike down.
        let dir = tempfile::tempdir().unwrap();
        let spiky = write_gray(dir.path(), "spike.png", |x, y| {
            if x == 32 && y == 32 { 255 } else { 0 }
        });
        let mut no_smooth = params(64);
        no_smooth.smooth_iterations = 0;
        let rough = build_displaced_relief(&spiky, &spiky, &no_smooth).unwrap();
        let smooth = build_displaced_relief(&spiky, &spiky, &params(64)).unwrap();
        assert!(smooth.bounding_box().maxs.z < rough.bounding_box().maxs.z);
    }

    #[test]
    fn gray_images_with_alpha_are_accepted() {
        // Depth rasters sometimes arrive as LumaA; conversion must cope.
        let dir = tempfile::tempdir().unwrap();
        let img = image::ImageBuffer::from_fn(32, 32, |_, _| LumaA([64u8, 255]));
        let path = dir.path().join("depth_la.png");
        img.save(&path).unwrap();
        let mesh = build_displaced_relief(&path, &path, &params(8)).unwrap();
        assert!(mesh.bounding_box().maxs.z > 0.0);
    }
}
