//! Print-texture compositing: the card face as a raster, pixel-registered
//! with the 3D placement.
//!
//! Artwork is painted over each piece's pre-trim placement rectangle using
//! the exact same millimeter coordinates the placement pipeline produced, so
//! a UV print lands on the relief it belongs to. The canvas is sized from the
//! physical card dimensions at the configured DPI and the PNG carries that
//! density in its pHYs chunk.

use crate::config::{BackgroundSpec, CardSpec, background_color};
use crate::errors::CardError;
use crate::float_types::{MM_PER_INCH, Real};
use crate::placement::PlacementRecord;
use crate::text::TextPanel;
use image::{Rgba, RgbaImage, imageops};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, warn};

/// One piece's artwork and where it goes.
pub struct ArtLayer {
    pub record: PlacementRecord,
    pub image: RgbaImage,
}

/// Canvas size in pixels: physical card dimensions at `dpi`, rounded to the
/// nearest pixel per axis.
pub fn canvas_dims(card: &CardSpec, dpi: u32) -> (u32, u32) {
    let px = |mm: Real| (mm / MM_PER_INCH * dpi as Real).round() as u32;
    (px(card.width_mm), px(card.height_mm))
}

/// Compose the full card face: background, artwork layers in order, then
/// lettering on top.
pub fn compose(
    card: &CardSpec,
    dpi: u32,
    background: &BackgroundSpec,
    layers: &[ArtLayer],
    lettering: Option<(&TextPanel, [u8; 4])>,
) -> RgbaImage {
    let (w, h) = canvas_dims(card, dpi);
    let mut canvas = paint_background(background, w, h);

    let frame = MmFrame::new(card, w, h);
    for layer in layers {
        paint_layer(&mut canvas, &frame, layer);
    }
    if let Some((panel, rgba)) = lettering {
        paint_lettering(&mut canvas, &frame, panel, rgba);
    }
    info!(width = w, height = h, layers = layers.len(), "composed print texture");
    canvas
}

/// Write the canvas as RGBA PNG with physical pixel density metadata.
pub fn write_png_with_dpi(img: &RgbaImage, dpi: u32, path: &Path) -> Result<(), CardError> {
    let file = File::create(path).map_err(|e| CardError::io(path, e))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), img.width(), img.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    // pHYs stores pixels per meter.
    let ppu = (dpi as Real / 0.0254).round() as u32;
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: ppu,
        yppu: ppu,
        unit: png::Unit::Meter,
    }));
    let mut writer = encoder.write_header()?;
    writer.write_image_data(img.as_raw())?;
    Ok(())
}

/// Millimeter card coordinates (+Y up, origin centered) to pixel rows/cols.
struct MmFrame {
    card_w: Real,
    card_h: Real,
    px_w: Real,
    px_h: Real,
}

impl MmFrame {
    fn new(card: &CardSpec, w: u32, h: u32) -> Self {
        MmFrame {
            card_w: card.width_mm,
            card_h: card.height_mm,
            px_w: w as Real,
            px_h: h as Real,
        }
    }

    fn to_px(&self, x_mm: Real, y_mm: Real) -> (Real, Real) {
        (
            (x_mm + self.card_w / 2.0) / self.card_w * self.px_w,
            (self.card_h / 2.0 - y_mm) / self.card_h * self.px_h,
        )
    }
}

fn paint_background(background: &BackgroundSpec, w: u32, h: u32) -> RgbaImage {
    match background {
        BackgroundSpec::Transparent => RgbaImage::new(w, h),
        BackgroundSpec::Solid(name) => match background_color(name) {
            Some([r, g, b]) => RgbaImage::from_pixel(w, h, Rgba([r, g, b, 255])),
            None => RgbaImage::new(w, h),
        },
        BackgroundSpec::Image(path) => match image::open(path) {
            Ok(img) => {
                imageops::resize(&img.to_rgba8(), w, h, imageops::FilterType::Lanczos3)
            },
            Err(err) => {
                warn!(path = %path.display(), %err, "background image unreadable; using transparent");
                RgbaImage::new(w, h)
            },
        },
    }
}

/// Paint one artwork layer into its pre-trim rectangle: the source keeps its
/// own aspect ratio, fit within the rectangle and centered.
fn paint_layer(canvas: &mut RgbaImage, frame: &MmFrame, layer: &ArtLayer) {
    let rec = &layer.record;
    if rec.width_mm <= 0.0 || rec.height_mm <= 0.0 {
        return;
    }
    let (src_w, src_h) = layer.image.dimensions();
    if src_w == 0 || src_h == 0 {
        return;
    }
    let fit = (rec.width_mm / src_w as Real).min(rec.height_mm / src_h as Real);
    let draw_w = src_w as Real * fit;
    let draw_h = src_h as Real * fit;
    let cx = rec.min_x_mm + rec.width_mm / 2.0;
    let cy = rec.min_y_mm + rec.height_mm / 2.0;

    let (x0, y1) = frame.to_px(cx - draw_w / 2.0, cy - draw_h / 2.0);
    let (x1, y0) = frame.to_px(cx + draw_w / 2.0, cy + draw_h / 2.0);
    let col_min = (x0.floor().max(0.0)) as u32;
    let col_max = (x1.ceil().min(canvas.width() as Real)) as u32;
    let row_min = (y0.floor().max(0.0)) as u32;
    let row_max = (y1.ceil().min(canvas.height() as Real)) as u32;

    for row in row_min..row_max {
        for col in col_min..col_max {
            let u = ((col as Real + 0.5 - x0) / (x1 - x0)).clamp(0.0, 1.0);
            let v = ((row as Real + 0.5 - y0) / (y1 - y0)).clamp(0.0, 1.0);
            let src = sample_rgba(&layer.image, src_w, src_h, u, v);
            blend_over(canvas.get_pixel_mut(col, row), src);
        }
    }
}

fn sample_rgba(img: &RgbaImage, w: u32, h: u32, u: Real, v: Real) -> [Real; 4] {
    let fx = u * (w.saturating_sub(1)) as Real;
    let fy = v * (h.saturating_sub(1)) as Real;
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = fx - x0 as Real;
    let ty = fy - y0 as Real;

    let mut out = [0.0; 4];
    for ch in 0..4 {
        let p00 = img.get_pixel(x0, y0).0[ch] as Real;
        let p10 = img.get_pixel(x1, y0).0[ch] as Real;
        let p01 = img.get_pixel(x0, y1).0[ch] as Real;
        let p11 = img.get_pixel(x1, y1).0[ch] as Real;
        let top = p00 * (1.0 - tx) + p10 * tx;
        let bottom = p01 * (1.0 - tx) + p11 * tx;
        out[ch] = top * (1.0 - ty) + bottom * ty;
    }
    out
}

fn blend_over(dst: &mut Rgba<u8>, src: [Real; 4]) {
    let sa = src[3] / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as Real / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    for ch in 0..3 {
        let s = src[ch];
        let d = dst.0[ch] as Real;
        dst.0[ch] = ((s * sa + d * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Rasterize the lettering triangulation in the text color.
fn paint_lettering(canvas: &mut RgbaImage, frame: &MmFrame, panel: &TextPanel, rgba: [u8; 4]) {
    let src = [rgba[0] as Real, rgba[1] as Real, rgba[2] as Real, rgba[3] as Real];
    for glyph in &panel.glyphs {
        for &[a, b, c] in &glyph.triangles {
            let pts = [glyph.vertices[a], glyph.vertices[b], glyph.vertices[c]];
            let px: Vec<(Real, Real)> = pts
                .iter()
                .map(|p| frame.to_px(p[0], p[1]))
                .collect();

            let min_col = px.iter().map(|p| p.0).fold(Real::MAX, Real::min).floor().max(0.0) as u32;
            let max_col = (px.iter().map(|p| p.0).fold(-Real::MAX, Real::max).ceil())
                .min(canvas.width() as Real) as u32;
            let min_row = px.iter().map(|p| p.1).fold(Real::MAX, Real::min).floor().max(0.0) as u32;
            let max_row = (px.iter().map(|p| p.1).fold(-Real::MAX, Real::max).ceil())
                .min(canvas.height() as Real) as u32;

            let edge = |a: (Real, Real), b: (Real, Real), p: (Real, Real)| {
                (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
            };
            for row in min_row..max_row {
                for col in min_col..max_col {
                    let p = (col as Real + 0.5, row as Real + 0.5);
                    let e0 = edge(px[0], px[1], p);
                    let e1 = edge(px[1], px[2], p);
                    let e2 = edge(px[2], px[0], p);
                    let inside = (e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0)
                        || (e0 <= 0.0 && e1 <= 0.0 && e2 <= 0.0);
                    if inside {
                        blend_over(canvas.get_pixel_mut(col, row), src);
                    }
                }
            }
        }
    }
}
