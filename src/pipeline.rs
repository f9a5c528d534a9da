//! End-to-end card build: reliefs, placement, lettering, STL, texture, and
//! the editable project file.
//!
//! Failure policy: anything wrong with the figure kills the job (except
//! degenerate bounds after scaling, which skips the piece), anything wrong
//! with a single accessory demotes that accessory to an omission and the
//! build continues. Errors that do surface carry the stage they happened in
//! so a caller can rerun from there.

use crate::config::{BackgroundSpec, PipelineConfig, text_color};
use crate::errors::{CardError, PipelineError, Stage};
use crate::export::write_binary_stl;
use crate::float_types::mm_to_m;
use crate::layout::CardLayout;
use crate::mesh::{Mesh, decimate::decimate_to_ratio};
use crate::placement::{PlacementRecord, place_piece};
use crate::relief::{ReliefParams, build_displaced_relief};
use crate::shapes::cuboid;
use crate::text::{TextPanel, extrude_panel, shape_text_band};
use crate::texture::{ArtLayer, compose, write_png_with_dpi};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const PROJECT_VERSION: u32 = 1;

/// Which slot on the card a piece fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PieceRole {
    Figure,
    Accessory(u8),
}

impl std::fmt::Display for PieceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PieceRole::Figure => f.write_str("figure"),
            PieceRole::Accessory(i) => write!(f, "accessory-{}", i + 1),
        }
    }
}

/// One accessory's color/depth raster pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessoryInput {
    pub color: PathBuf,
    pub depth: PathBuf,
}

/// Everything a single card build needs besides the pipeline constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarterPackJob {
    /// Names the output artifacts: `{job_id}.stl`, `{job_id}_texture.png`,
    /// `{job_id}.cardproj`.
    pub job_id: String,
    pub figure_color: PathBuf,
    pub figure_depth: PathBuf,
    /// Up to three; extra entries are ignored with a warning.
    pub accessories: Vec<AccessoryInput>,
    pub title: String,
    pub subtitle: Option<String>,
    pub text_color: String,
    pub background: BackgroundSpec,
    /// Lettering is omitted when no font is given or it cannot be parsed.
    pub font: Option<PathBuf>,
}

/// A piece (or the lettering) dropped from the build, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Omission {
    pub what: String,
    pub reason: String,
}

/// What a finished build produced.
#[derive(Debug)]
pub struct BuildReport {
    pub stl_path: PathBuf,
    pub texture_path: PathBuf,
    pub project_path: PathBuf,
    pub placements: Vec<PlacementRecord>,
    pub omissions: Vec<Omission>,
    pub triangle_count: usize,
}

/// Triangle count of a placed piece before export decimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshStat {
    pub role: PieceRole,
    pub triangles: usize,
}

/// The editable project file, written before (and independent of) the STL.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectFile {
    pub version: u32,
    pub job: StarterPackJob,
    pub config: PipelineConfig,
    pub placements: Vec<PlacementRecord>,
    pub mesh_stats: Vec<MeshStat>,
    pub omissions: Vec<Omission>,
}

impl ProjectFile {
    pub fn load(path: &Path) -> Result<Self, CardError> {
        let file = File::open(path).map_err(|e| CardError::io(path, e))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save(&self, path: &Path) -> Result<(), CardError> {
        let file = File::create(path).map_err(|e| CardError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

struct PlacedPiece {
    role: PieceRole,
    mesh: Mesh,
    record: PlacementRecord,
    color: PathBuf,
}

/// Run the whole build, writing `{job_id}.stl`, `{job_id}_texture.png` and
/// `{job_id}.cardproj` into `out_dir`.
pub fn build_starter_pack(
    job: &StarterPackJob,
    config: &PipelineConfig,
    out_dir: &Path,
) -> Result<BuildReport, PipelineError> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| CardError::io(out_dir, e).at(Stage::Export))?;
    let stl_path = out_dir.join(format!("{}.stl", job.job_id));
    let texture_path = out_dir.join(format!("{}_texture.png", job.job_id));
    let project_path = out_dir.join(format!("{}.cardproj", job.job_id));

    let mut omissions = Vec::new();
    let layout = CardLayout::compute(config);
    let plate = base_plate(config);

    // Reliefs. The figure is mandatory, accessories degrade.
    let figure_relief = build_displaced_relief(
        &job.figure_depth,
        &job.figure_color,
        &ReliefParams::figure(config),
    )
    .map_err(|e| e.at(Stage::Relief))?;

    if job.accessories.len() > 3 {
        warn!(
            given = job.accessories.len(),
            "more than three accessories; extras ignored"
        );
    }
    let accessory_params = ReliefParams::accessory(config);
    let mut accessory_reliefs: Vec<(u8, Mesh, PathBuf)> = Vec::new();
    for (i, acc) in job.accessories.iter().take(3).enumerate() {
        match build_displaced_relief(&acc.depth, &acc.color, &accessory_params) {
            Ok(mesh) => accessory_reliefs.push((i as u8, mesh, acc.color.clone())),
            Err(err) => {
                warn!(%err, slot = i + 1, "accessory relief failed; omitting");
                omissions.push(Omission {
                    what: PieceRole::Accessory(i as u8).to_string(),
                    reason: err.to_string(),
                });
            },
        }
    }

    // Placement. Degenerate bounds after scaling skip the piece with a
    // warning, even for the figure; other figure failures stay fatal.
    let mut pieces: Vec<PlacedPiece> = Vec::new();
    {
        let mut mesh = figure_relief;
        match place_piece(&mut mesh, PieceRole::Figure, &layout.figure, &plate, config) {
            Ok(record) => pieces.push(PlacedPiece {
                role: PieceRole::Figure,
                mesh,
                record,
                color: job.figure_color.clone(),
            }),
            Err(err @ CardError::DegenerateBounds { .. }) => {
                warn!(%err, "figure skipped");
                omissions.push(Omission {
                    what: PieceRole::Figure.to_string(),
                    reason: err.to_string(),
                });
            },
            Err(err) => return Err(err.at(Stage::Placement)),
        }
    }
    for (slot, mut mesh, color) in accessory_reliefs {
        let role = PieceRole::Accessory(slot);
        let cell = &layout.accessories[slot as usize];
        match place_piece(&mut mesh, role, cell, &plate, config) {
            Ok(record) => pieces.push(PlacedPiece {
                role,
                mesh,
                record,
                color,
            }),
            Err(err) => {
                warn!(%err, %role, "accessory placement failed; omitting");
                omissions.push(Omission {
                    what: role.to_string(),
                    reason: err.to_string(),
                });
            },
        }
    }

    // Lettering degrades to a bare card face rather than failing the job.
    let panel: Option<TextPanel> = match &job.font {
        Some(font) => {
            match shape_text_band(
                font,
                &job.title,
                job.subtitle.as_deref(),
                &config.text,
                &config.card,
            ) {
                Ok(panel) if !panel.is_empty() => Some(panel),
                Ok(_) => None,
                Err(err) => {
                    warn!(%err, "lettering failed; omitting text");
                    omissions.push(Omission {
                        what: "text".into(),
                        reason: err.to_string(),
                    });
                    None
                },
            }
        },
        None => None,
    };

    // The project file captures the editable scene before decimation and
    // export touch it; it is useful even if the STL write fails.
    let placements: Vec<PlacementRecord> = pieces.iter().map(|p| p.record).collect();
    let project = ProjectFile {
        version: PROJECT_VERSION,
        job: job.clone(),
        config: config.clone(),
        placements: placements.clone(),
        mesh_stats: pieces
            .iter()
            .map(|p| MeshStat {
                role: p.role,
                triangles: p.mesh.triangle_count(),
            })
            .collect(),
        omissions: omissions.clone(),
    };
    project
        .save(&project_path)
        .map_err(|e| e.at(Stage::Export))?;

    // Assemble and export. Pieces are joined by concatenation; the sink into
    // the plate hides the open seams.
    let mut assembly = plate;
    for piece in &mut pieces {
        if piece.mesh.triangle_count() > config.decimate_threshold {
            piece.mesh = decimate_to_ratio(&piece.mesh, config.decimate_ratio);
        }
        assembly.merge(&piece.mesh);
    }
    if let Some(panel) = &panel {
        assembly.merge(&extrude_panel(panel, &config.text));
    }
    let triangle_count = assembly.triangle_count();
    debug!(
        triangles = triangle_count,
        extent_mm = crate::export::max_abs_coord_mm(&assembly),
        "assembled export mesh"
    );
    write_binary_stl(&assembly, &stl_path).map_err(|e| e.at(Stage::Export))?;

    // Texture. Figure artwork is mandatory here too.
    let mut layers = Vec::new();
    for piece in &pieces {
        match image::open(&piece.color) {
            Ok(img) => layers.push(ArtLayer {
                record: piece.record,
                image: img.to_rgba8(),
            }),
            Err(err) => {
                if piece.role == PieceRole::Figure {
                    return Err(CardError::Raster {
                        path: piece.color.clone(),
                        source: err,
                    }
                    .at(Stage::Texture));
                }
                warn!(%err, role = %piece.role, "artwork unreadable; omitting from texture");
                omissions.push(Omission {
                    what: format!("{} artwork", piece.role),
                    reason: err.to_string(),
                });
            },
        }
    }
    let ink = rgba_from_f32(text_color(&job.text_color));
    let canvas = compose(
        &config.card,
        config.dpi,
        &job.background,
        &layers,
        panel.as_ref().map(|p| (p, ink)),
    );
    write_png_with_dpi(&canvas, config.dpi, &texture_path).map_err(|e| e.at(Stage::Texture))?;

    info!(
        stl = %stl_path.display(),
        texture = %texture_path.display(),
        pieces = placements.len(),
        omitted = omissions.len(),
        "starter pack build complete"
    );
    Ok(BuildReport {
        stl_path,
        texture_path,
        project_path,
        placements,
        omissions,
        triangle_count,
    })
}

/// Standalone silhouette relief: alpha cut-out, smoothed, decimated, exported
/// as its own STL with no card underneath.
pub fn build_cutout_relief(
    color: &Path,
    depth: &Path,
    config: &PipelineConfig,
    out_path: &Path,
) -> Result<(), PipelineError> {
    let mut params = ReliefParams::figure(config);
    params.alpha_cutout = Some(0.1);
    let mut mesh =
        build_displaced_relief(depth, color, &params).map_err(|e| e.at(Stage::Relief))?;
    mesh.shade_smooth_by_angle(config.shade_angle_deg);
    if mesh.triangle_count() > config.decimate_threshold {
        mesh = decimate_to_ratio(&mesh, config.decimate_ratio);
    }
    write_binary_stl(&mesh, out_path).map_err(|e| e.at(Stage::Export))
}

/// The card plate: top face at Z=0, bottom at -thickness.
pub fn base_plate(config: &PipelineConfig) -> Mesh {
    let t = mm_to_m(config.card.thickness_mm);
    cuboid(
        mm_to_m(config.card.width_mm),
        mm_to_m(config.card.height_mm),
        t,
        &Point3::new(0.0, 0.0, -t / 2.0),
    )
}

/// Filesystem-safe name derived from the title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "starter-pack".to_string()
    } else {
        slug
    }
}

fn rgba_from_f32(c: [f32; 4]) -> [u8; 4] {
    c.map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_filesystem_safe() {
        assert_eq!(slugify("Chef Octopus!"), "chef-octopus");
        assert_eq!(slugify("  A  B  "), "a-b");
        assert_eq!(slugify("日本語"), "starter-pack");
    }

    #[test]
    fn base_plate_spans_the_card() {
        let plate = base_plate(&PipelineConfig::default());
        let bb = plate.bounding_box();
        assert!((bb.extents().x - 0.130).abs() < 1e-12);
        assert!((bb.extents().y - 0.170).abs() < 1e-12);
        assert!((bb.maxs.z - 0.0).abs() < 1e-12);
        assert!((bb.mins.z - -0.003).abs() < 1e-12);
    }

    #[test]
    fn piece_roles_name_their_slot() {
        assert_eq!(PieceRole::Figure.to_string(), "figure");
        assert_eq!(PieceRole::Accessory(2).to_string(), "accessory-3");
    }
}
