//! Title/subtitle lettering: glyph outlines shaped into filled 2D
//! triangulations on the card face, then extruded into shallow prisms.
//!
//! The same triangulation drives both outputs. The exporter extrudes it into
//! raised lettering; the texture compositor rasterizes it in the text color.
//! One geometry source keeps the printed ink and the relief aligned.

use crate::config::{CardSpec, TextConfig};
use crate::errors::CardError;
use crate::float_types::{Real, mm_to_m};
use crate::mesh::{Mesh, polygon::Polygon, vertex::Vertex};
use geo::TriangulateEarcut;
use geo::{Coord, LineString, Polygon as GeoPolygon};
use nalgebra::{Point3, Vector3};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};
use ttf_parser::{Face, OutlineBuilder};

/// Curve flattening steps per quadratic/cubic segment.
const CURVE_STEPS: usize = 8;

/// An indexed, counter-clockwise 2D triangulation in card-face millimeters.
#[derive(Debug, Clone)]
pub struct GlyphTriangulation {
    pub vertices: Vec<[Real; 2]>,
    pub triangles: Vec<[usize; 3]>,
}

/// Filled lettering for the whole text band.
#[derive(Debug, Clone, Default)]
pub struct TextPanel {
    pub glyphs: Vec<GlyphTriangulation>,
}

impl TextPanel {
    pub fn is_empty(&self) -> bool {
        self.glyphs.iter().all(|g| g.triangles.is_empty())
    }
}

/// Shape the title and optional subtitle into the text band.
///
/// Each line starts at its nominal size and is scaled down (never up) to fit
/// its bounding box, centered horizontally. The title hangs from the top
/// margin; the subtitle follows below the gap.
pub fn shape_text_band(
    font_path: &Path,
    title: &str,
    subtitle: Option<&str>,
    text: &TextConfig,
    card: &CardSpec,
) -> Result<TextPanel, CardError> {
    if !font_path.exists() {
        return Err(CardError::MissingInput(font_path.to_path_buf()));
    }
    let data = std::fs::read(font_path).map_err(|e| CardError::io(font_path, e))?;
    let face = Face::from_slice(&data, 0).map_err(|_| CardError::Font(font_path.to_path_buf()))?;

    let mut panel = TextPanel::default();
    let mut top_y = card.height_mm / 2.0 - text.top_margin_mm;

    let title_h = place_line(
        &mut panel,
        &face,
        title,
        text.size_mm,
        text.title_max_width_mm,
        text.title_max_height_mm,
        top_y,
    );
    if let Some(sub) = subtitle.filter(|s| !s.is_empty()) {
        // An absent title leaves the subtitle at the title's top position.
        if title_h > 0.0 {
            top_y -= title_h + text.gap_mm;
        }
        place_line(
            &mut panel,
            &face,
            sub,
            text.size_mm * text.subtitle_scale,
            text.subtitle_max_width_mm,
            text.subtitle_max_height_mm,
            top_y,
        );
    }
    debug!(glyphs = panel.glyphs.len(), "shaped text band");
    Ok(panel)
}

/// Extrude the panel into lettering prisms: bottom face lifted off the card
/// top, walls, and a top face.
pub fn extrude_panel(panel: &TextPanel, text: &TextConfig) -> Mesh {
    let z0 = mm_to_m(text.lift_mm);
    let z1 = mm_to_m(text.lift_mm + text.extrude_mm);
    let mut polygons = Vec::new();

    for glyph in &panel.glyphs {
        let at = |i: usize, z: Real| {
            let [x, y] = glyph.vertices[i];
            Point3::new(mm_to_m(x), mm_to_m(y), z)
        };

        // Directed boundary edges of the CCW triangulation become walls.
        let mut edges: HashSet<(usize, usize)> = HashSet::new();
        for tri in &glyph.triangles {
            for k in 0..3 {
                edges.insert((tri[k], tri[(k + 1) % 3]));
            }
        }

        for tri in &glyph.triangles {
            let [a, b, c] = *tri;
            polygons.push(Polygon::new(vec![
                Vertex::new(at(a, z1), Vector3::z()),
                Vertex::new(at(b, z1), Vector3::z()),
                Vertex::new(at(c, z1), Vector3::z()),
            ]));
            polygons.push(Polygon::new(vec![
                Vertex::new(at(c, z0), -Vector3::z()),
                Vertex::new(at(b, z0), -Vector3::z()),
                Vertex::new(at(a, z0), -Vector3::z()),
            ]));
            for k in 0..3 {
                let (i, j) = (tri[k], tri[(k + 1) % 3]);
                if edges.contains(&(j, i)) {
                    continue;
                }
                let [ax, ay] = glyph.vertices[i];
                let [bx, by] = glyph.vertices[j];
                let out = Vector3::new(by - ay, -(bx - ax), 0.0);
                let normal = if out.norm_squared() > 0.0 {
                    out.normalize()
                } else {
                    Vector3::x()
                };
                polygons.push(Polygon::new(vec![
                    Vertex::new(at(i, z0), normal),
                    Vertex::new(at(j, z0), normal),
                    Vertex::new(at(j, z1), normal),
                    Vertex::new(at(i, z1), normal),
                ]));
            }
        }
    }
    Mesh::from_polygons(polygons)
}

/// Shape one line, fit it into `max_w x max_h`, hang it centered under
/// `top_y`. Returns the fitted line height.
fn place_line(
    panel: &mut TextPanel,
    face: &Face<'_>,
    line: &str,
    size_mm: Real,
    max_w: Real,
    max_h: Real,
    top_y: Real,
) -> Real {
    let mut glyphs = shape_line(face, line, size_mm);
    if glyphs.is_empty() {
        return 0.0;
    }

    let (min, max) = bounds(&glyphs);
    let w = max[0] - min[0];
    let h = max[1] - min[1];
    if w <= 0.0 || h <= 0.0 {
        return 0.0;
    }
    let scale = (max_w / w).min(max_h / h).min(1.0);
    let fitted_h = h * scale;

    // Scale about the bbox center, then center X and hang the top at top_y.
    let cx = (min[0] + max[0]) / 2.0;
    let cy = (min[1] + max[1]) / 2.0;
    for g in &mut glyphs {
        for v in &mut g.vertices {
            v[0] = (v[0] - cx) * scale;
            v[1] = (v[1] - cy) * scale + top_y - fitted_h / 2.0;
        }
    }
    panel.glyphs.append(&mut glyphs);
    fitted_h
}

fn bounds(glyphs: &[GlyphTriangulation]) -> ([Real; 2], [Real; 2]) {
    let mut min = [Real::MAX; 2];
    let mut max = [-Real::MAX; 2];
    for g in glyphs {
        for v in &g.vertices {
            for axis in 0..2 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
    }
    (min, max)
}

/// Shape one line of text at `size_mm` starting at pen x=0, baseline y=0.
fn shape_line(face: &Face<'_>, line: &str, size_mm: Real) -> Vec<GlyphTriangulation> {
    let upem = face.units_per_em().unwrap_or(1000) as Real;
    let scale = size_mm / upem;

    let mut out = Vec::new();
    let mut pen_x: Real = 0.0;
    for ch in line.chars() {
        let Some(gid) = face.glyph_index(ch) else {
            pen_x += size_mm / 2.0;
            continue;
        };
        let mut builder = ContourCollector::new(scale, pen_x);
        if face.outline_glyph(gid, &mut builder).is_some() {
            builder.finish_contour();
            out.extend(triangulate_contours(builder.contours));
        }
        let advance = face
            .glyph_hor_advance(gid)
            .map(|a| a as Real * scale)
            .unwrap_or(size_mm / 2.0);
        pen_x += advance;
    }
    out
}

/// Collects flattened glyph contours in millimeters.
struct ContourCollector {
    scale: Real,
    offset_x: Real,
    contours: Vec<Vec<[Real; 2]>>,
    current: Vec<[Real; 2]>,
    cursor: [Real; 2],
}

impl ContourCollector {
    fn new(scale: Real, offset_x: Real) -> Self {
        ContourCollector {
            scale,
            offset_x,
            contours: Vec::new(),
            current: Vec::new(),
            cursor: [0.0, 0.0],
        }
    }

    fn map(&self, x: f32, y: f32) -> [Real; 2] {
        [x as Real * self.scale + self.offset_x, y as Real * self.scale]
    }

    fn finish_contour(&mut self) {
        if self.current.len() >= 3 {
            self.contours.push(std::mem::take(&mut self.current));
        } else {
            self.current.clear();
        }
    }
}

impl OutlineBuilder for ContourCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        self.finish_contour();
        self.cursor = self.map(x, y);
        self.current.push(self.cursor);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.cursor = self.map(x, y);
        self.current.push(self.cursor);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let p0 = self.cursor;
        let p1 = self.map(x1, y1);
        let p2 = self.map(x, y);
        for step in 1..=CURVE_STEPS {
            let t = step as Real / CURVE_STEPS as Real;
            let u = 1.0 - t;
            let point = [
                u * u * p0[0] + 2.0 * u * t * p1[0] + t * t * p2[0],
                u * u * p0[1] + 2.0 * u * t * p1[1] + t * t * p2[1],
            ];
            self.current.push(point);
        }
        self.cursor = p2;
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let p0 = self.cursor;
        let p1 = self.map(x1, y1);
        let p2 = self.map(x2, y2);
        let p3 = self.map(x, y);
        for step in 1..=CURVE_STEPS {
            let t = step as Real / CURVE_STEPS as Real;
            let u = 1.0 - t;
            let point = [
                u * u * u * p0[0]
                    + 3.0 * u * u * t * p1[0]
                    + 3.0 * u * t * t * p2[0]
                    + t * t * t * p3[0],
                u * u * u * p0[1]
                    + 3.0 * u * u * t * p1[1]
                    + 3.0 * u * t * t * p2[1]
                    + t * t * t * p3[1],
            ];
            self.current.push(point);
        }
        self.cursor = p3;
    }

    fn close(&mut self) {
        self.finish_contour();
    }
}

fn signed_area(ring: &[[Real; 2]]) -> Real {
    let mut area = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        area += a[0] * b[1] - b[0] * a[1];
    }
    area / 2.0
}

fn point_in_ring(point: [Real; 2], ring: &[[Real; 2]]) -> bool {
    let mut inside = false;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        if (a[1] > point[1]) != (b[1] > point[1]) {
            let x = a[0] + (point[1] - a[1]) / (b[1] - a[1]) * (b[0] - a[0]);
            if point[0] < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Split a glyph's contours into outer rings with holes (by containment
/// depth, robust against per-font winding conventions) and ear-clip each.
fn triangulate_contours(contours: Vec<Vec<[Real; 2]>>) -> Vec<GlyphTriangulation> {
    let depth_of = |idx: usize| -> usize {
        let probe = contours[idx][0];
        contours
            .iter()
            .enumerate()
            .filter(|(j, ring)| *j != idx && point_in_ring(probe, ring))
            .count()
    };

    let mut outers: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut holes: Vec<usize> = Vec::new();
    for idx in 0..contours.len() {
        if depth_of(idx) % 2 == 0 {
            outers.push((idx, Vec::new()));
        } else {
            holes.push(idx);
        }
    }
    for hole in holes {
        let probe = contours[hole][0];
        let owner = outers
            .iter_mut()
            .filter(|(outer, _)| point_in_ring(probe, &contours[*outer]))
            .min_by(|(a, _), (b, _)| {
                let area_a = signed_area(&contours[*a]).abs();
                let area_b = signed_area(&contours[*b]).abs();
                area_a.partial_cmp(&area_b).unwrap_or(std::cmp::Ordering::Equal)
            });
        if let Some((_, assigned)) = owner {
            assigned.push(hole);
        } else {
            warn!("glyph hole contour without an enclosing outline; dropped");
        }
    }

    let to_line_string = |ring: &[[Real; 2]]| {
        LineString::from(
            ring.iter()
                .map(|p| Coord { x: p[0], y: p[1] })
                .collect::<Vec<_>>(),
        )
    };

    let mut out = Vec::new();
    for (outer, hole_ids) in outers {
        let polygon = GeoPolygon::new(
            to_line_string(&contours[outer]),
            hole_ids
                .iter()
                .map(|&h| to_line_string(&contours[h]))
                .collect(),
        );
        let raw = polygon.earcut_triangles_raw();
        let vertices: Vec<[Real; 2]> = raw
            .vertices
            .chunks_exact(2)
            .map(|c| [c[0], c[1]])
            .collect();
        let mut triangles = Vec::with_capacity(raw.triangle_indices.len() / 3);
        for tri in raw.triangle_indices.chunks_exact(3) {
            let (a, b, c) = (tri[0], tri[1], tri[2]);
            let ring = [vertices[a], vertices[b], vertices[c]];
            // Normalize to CCW so extrusion walls face outward.
            if signed_area(&ring) >= 0.0 {
                triangles.push([a, b, c]);
            } else {
                triangles.push([a, c, b]);
            }
        }
        out.push(GlyphTriangulation {
            vertices,
            triangles,
        });
    }
    out
}
