//! Fixed product constants and the per-job configuration surface.
//!
//! Everything here is a constant for a given product SKU; callers only
//! parameterize title/subtitle, text color, background, and the input pairs.

use crate::float_types::Real;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Physical card: origin at the geometric center, top surface at Z=0,
/// extending down to `-thickness`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CardSpec {
    pub width_mm: Real,
    pub height_mm: Real,
    pub thickness_mm: Real,
}

impl Default for CardSpec {
    fn default() -> Self {
        CardSpec {
            width_mm: 130.0,
            height_mm: 170.0,
            thickness_mm: 3.0,
        }
    }
}

/// Text sizing/positioning constants (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextConfig {
    /// Initial glyph size before fit-to-box down-scaling.
    pub size_mm: Real,
    /// Subtitle starts at this fraction of the title size.
    pub subtitle_scale: Real,
    pub extrude_mm: Real,
    /// Lift above the card surface so lettering never z-fights the top face.
    pub lift_mm: Real,
    pub top_margin_mm: Real,
    pub gap_mm: Real,
    pub title_max_width_mm: Real,
    pub title_max_height_mm: Real,
    pub subtitle_max_width_mm: Real,
    pub subtitle_max_height_mm: Real,
}

impl Default for TextConfig {
    fn default() -> Self {
        TextConfig {
            size_mm: 20.0,
            subtitle_scale: 0.7,
            extrude_mm: 0.8,
            lift_mm: 0.1,
            top_margin_mm: 10.0,
            gap_mm: 2.0,
            title_max_width_mm: 114.0,
            title_max_height_mm: 11.7,
            subtitle_max_width_mm: 64.6,
            subtitle_max_height_mm: 7.43,
        }
    }
}

/// All tunables of the card pipeline with the production defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub card: CardSpec,

    /// Grid cuts per axis of the relief plane.
    pub subdivide_cuts: u32,
    /// Undisplaced relief plane footprint (mm); the real size comes from
    /// fitting the target cell, not from the source image aspect.
    pub relief_plane_width_mm: Real,
    pub relief_plane_height_mm: Real,
    /// Displacement strengths in meters. Figures read better as flatter
    /// reliefs than the chunkier accessories.
    pub displacement_strength_figure: Real,
    pub displacement_strength_accessories: Real,
    pub smooth_iterations: u32,
    pub smooth_factor: Real,
    pub shade_angle_deg: Real,

    // Layout ratios.
    pub upper_ratio: Real,
    pub figure_width_ratio: Real,
    pub accessory_height_ratio: Real,

    // Placement.
    pub margin_figure_mm: Real,
    pub margin_accessories_mm: Real,
    pub size_boost_figure: Real,
    pub size_boost_accessories: Real,
    pub sink_depth_mm: Real,

    // Export.
    pub decimate_ratio: Real,
    pub decimate_threshold: usize,

    pub text: TextConfig,

    /// Print texture resolution.
    pub dpi: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            card: CardSpec::default(),
            subdivide_cuts: 100,
            relief_plane_width_mm: 80.0,
            relief_plane_height_mm: 120.0,
            displacement_strength_figure: 0.010,
            displacement_strength_accessories: 0.025,
            smooth_iterations: 5,
            smooth_factor: 0.5,
            shade_angle_deg: 30.0,
            upper_ratio: 0.15,
            figure_width_ratio: 3.0 / 5.0,
            accessory_height_ratio: 2.0 / 3.0,
            margin_figure_mm: 5.0,
            margin_accessories_mm: 3.0,
            size_boost_figure: 1.32,
            size_boost_accessories: 1.62,
            sink_depth_mm: 1.0,
            decimate_ratio: 0.3,
            decimate_threshold: 1000,
            text: TextConfig::default(),
            dpi: 300,
        }
    }
}

/// Background of the print texture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackgroundSpec {
    Transparent,
    /// Named color from [`background_color`]'s palette.
    Solid(String),
    /// Stretched to fill the canvas; falls back to transparent if unloadable.
    Image(PathBuf),
}

impl Default for BackgroundSpec {
    fn default() -> Self {
        BackgroundSpec::Transparent
    }
}

/// Lettering palette (RGBA, 0..1). Unknown names fall back to red.
pub fn text_color(name: &str) -> [f32; 4] {
    match name.to_ascii_lowercase().as_str() {
        "blue" => [0.0, 0.3, 0.8, 1.0],
        "green" => [0.0, 0.6, 0.2, 1.0],
        "white" => [1.0, 1.0, 1.0, 1.0],
        "black" => [0.0, 0.0, 0.0, 1.0],
        "yellow" => [1.0, 0.85, 0.0, 1.0],
        "orange" => [1.0, 0.5, 0.0, 1.0],
        "purple" => [0.6, 0.2, 0.8, 1.0],
        "pink" => [1.0, 0.4, 0.7, 1.0],
        "gold" => [0.85, 0.65, 0.13, 1.0],
        _ => [1.0, 0.0, 0.0, 1.0],
    }
}

/// Solid-background palette (RGB, 0..255). `transparent` yields `None`;
/// unknown names fall back to white.
pub fn background_color(name: &str) -> Option<[u8; 3]> {
    match name.to_ascii_lowercase().as_str() {
        "transparent" => None,
        "black" => Some([0, 0, 0]),
        "red" => Some([255, 0, 0]),
        "blue" => Some([0, 77, 204]),
        "green" => Some([0, 153, 51]),
        "yellow" => Some([255, 217, 0]),
        "orange" => Some([255, 128, 0]),
        "purple" => Some([153, 51, 204]),
        "pink" => Some([255, 102, 178]),
        "gray" => Some([128, 128, 128]),
        "navy" => Some([0, 0, 128]),
        "teal" => Some([0, 128, 128]),
        "maroon" => Some([128, 0, 0]),
        "olive" => Some([128, 128, 0]),
        "silver" => Some([192, 192, 192]),
        _ => Some([255, 255, 255]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_text_color_falls_back_to_red() {
        assert_eq!(text_color("chartreuse"), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(text_color("GOLD"), text_color("gold"));
    }

    #[test]
    fn background_transparent_is_none() {
        assert_eq!(background_color("transparent"), None);
        assert_eq!(background_color("unheard-of"), Some([255, 255, 255]));
    }
}
