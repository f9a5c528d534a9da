//! Placing relief pieces onto the card: fit, snap, sink, trim.
//!
//! The placement record is captured BEFORE any trimming so the print-texture
//! compositor paints the artwork over the piece's full intended footprint.
//! Trimming only removes overhanging geometry; it never moves what remains,
//! so the pre-trim rectangle stays pixel-registered with the surviving mesh.

use crate::config::PipelineConfig;
use crate::errors::CardError;
use crate::float_types::{Real, m_to_mm, mm_to_m};
use crate::geom;
use crate::layout::Cell;
use crate::mesh::Mesh;
use crate::pipeline::PieceRole;
use crate::shapes::cuboid;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Where a piece ended up on the card, captured before trimming.
/// Millimeters, card-centered coordinates with +Y up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub role: PieceRole,
    pub min_x_mm: Real,
    pub min_y_mm: Real,
    pub width_mm: Real,
    pub height_mm: Real,
    /// Whether the piece overhung its cell and was trimmed to the card.
    pub trimmed: bool,
}

/// Fit `mesh` into `cell`, seat it on `plate`'s top surface, sink it into
/// the plate, then trim whatever still overhangs the card outline or pokes
/// below the card bottom. Returns the pre-trim placement record.
pub fn place_piece(
    mesh: &mut Mesh,
    role: PieceRole,
    cell: &Cell,
    plate: &Mesh,
    config: &PipelineConfig,
) -> Result<PlacementRecord, CardError> {
    let (margin, boost) = match role {
        PieceRole::Figure => (config.margin_figure_mm, config.size_boost_figure),
        PieceRole::Accessory(_) => {
            (config.margin_accessories_mm, config.size_boost_accessories)
        },
    };

    geom::center_xy(mesh);
    geom::rest_on_z0(mesh);
    geom::uniform_fit(mesh, cell.width, cell.height, margin, boost);
    geom::center_xy(mesh);

    let d = geom::world_dims(mesh);
    if d.x < 1e-9 || d.y < 1e-9 {
        return Err(CardError::DegenerateBounds { role });
    }

    // Into the cell, onto the plate's top surface, then sunk into the plate.
    mesh.translate(Vector3::new(mm_to_m(cell.x), mm_to_m(cell.y), 0.0));
    geom::snap_bottom_to_top(mesh, plate, 0.0);
    mesh.translate(Vector3::new(0.0, 0.0, -mm_to_m(config.sink_depth_mm)));

    let pre_trim = mesh.bounding_box();
    let mut record = PlacementRecord {
        role,
        min_x_mm: m_to_mm(pre_trim.mins.x),
        min_y_mm: m_to_mm(pre_trim.mins.y),
        width_mm: m_to_mm(pre_trim.extents().x),
        height_mm: m_to_mm(pre_trim.extents().y),
        trimmed: false,
    };

    let card_w = mm_to_m(config.card.width_mm);
    let card_h = mm_to_m(config.card.height_mm);
    let overhangs = pre_trim.mins.x < -card_w / 2.0 - 1e-12
        || pre_trim.maxs.x > card_w / 2.0 + 1e-12
        || pre_trim.mins.y < -card_h / 2.0 - 1e-12
        || pre_trim.maxs.y > card_h / 2.0 + 1e-12;
    if overhangs {
        // Tall box over the card outline; only XY matters for the trim.
        let span_z = (pre_trim.extents().z + mm_to_m(config.card.thickness_mm)) * 4.0 + 1.0;
        let keeper = cuboid(card_w, card_h, span_z, &Point3::origin());
        let clipped = mesh.clipped_inside(&keeper);
        if clipped.is_empty() {
            warn!(%role, "card-outline trim removed everything; keeping untrimmed piece");
        } else {
            *mesh = clipped;
            record.trimmed = true;
            debug!(%role, "trimmed overhanging piece to card outline");
        }
    }

    // Nothing may poke out of the card's underside.
    let floor = -mm_to_m(config.card.thickness_mm);
    if mesh.bounding_box().mins.z < floor - 1e-12 {
        let depth = 1.0;
        let cutter = cuboid(
            card_w * 2.0,
            card_h * 2.0,
            depth,
            &Point3::new(0.0, 0.0, floor - depth / 2.0),
        );
        let cut = mesh.clipped_outside(&cutter);
        if cut.is_empty() {
            warn!(%role, "underside cut removed everything; keeping uncut piece");
        } else {
            *mesh = cut;
        }
    }

    mesh.shade_smooth_by_angle(config.shade_angle_deg);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::CardLayout;
    use crate::pipeline::base_plate;
    use crate::shapes::cuboid;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    fn slab(w: Real, h: Real, d: Real) -> Mesh {
        cuboid(w, h, d, &Point3::new(0.1, 0.2, 0.05))
    }

    #[test]
    fn figure_lands_in_its_cell_sunk_one_millimeter() {
        let config = config();
        let layout = CardLayout::compute(&config);
        let mut m = slab(0.08, 0.12, 0.01);
        let rec = place_piece(&mut m, PieceRole::Figure, &layout.figure, &base_plate(&config), &config)
            .unwrap();

        let bb = m.bounding_box();
        // Bottom sits sink_depth below the card top.
        assert!((bb.mins.z - -0.001).abs() < 1e-9);
        // Pre-trim center matches the cell center.
        let cx = rec.min_x_mm + rec.width_mm / 2.0;
        let cy = rec.min_y_mm + rec.height_mm / 2.0;
        assert!((cx - layout.figure.x).abs() < 1e-6);
        assert!((cy - layout.figure.y).abs() < 1e-6);
    }

    #[test]
    fn boost_overhang_is_trimmed_but_record_keeps_full_footprint() {
        let config = config();
        let layout = CardLayout::compute(&config);
        // A wide source fit by width: the 1.62 boost carries the right edge
        // past the card outline.
        let mut m = slab(0.2, 0.05, 0.01);
        let rec = place_piece(
            &mut m,
            PieceRole::Accessory(0),
            &layout.accessories[0],
            &base_plate(&config),
            &config,
        )
        .unwrap();

        // Fitted width = (52 - 6) * 1.62 mm.
        assert!((rec.width_mm - 46.0 * 1.62).abs() < 1e-6);
        assert!((rec.height_mm - 46.0 * 1.62 / 4.0).abs() < 1e-6);

        // The record may overflow the card edge; the mesh must not.
        assert!(rec.min_x_mm + rec.width_mm > config.card.width_mm / 2.0);
        let bb = m.bounding_box();
        assert!(m_to_mm(bb.maxs.x) <= config.card.width_mm / 2.0 + 1e-6);
        assert!(rec.trimmed);
    }

    #[test]
    fn nothing_below_the_card_bottom() {
        let mut config = config();
        config.sink_depth_mm = 5.0;
        let layout = CardLayout::compute(&config);
        // Shallow piece sunk deeper than the 3mm plate: the excess is cut.
        let mut m = slab(0.05, 0.05, 0.004);
        place_piece(&mut m, PieceRole::Figure, &layout.figure, &base_plate(&config), &config)
            .unwrap();
        assert!(m.bounding_box().mins.z >= -mm_to_m(config.card.thickness_mm) - 1e-9);
    }

    #[test]
    fn flat_source_is_degenerate() {
        let config = config();
        let layout = CardLayout::compute(&config);
        let mut m = Mesh::new();
        let err = place_piece(
            &mut m,
            PieceRole::Accessory(2),
            &layout.accessories[2],
            &base_plate(&config),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, CardError::DegenerateBounds { .. }));
    }
}
