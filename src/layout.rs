//! Card layout: pure cell arithmetic from the card dimensions and ratios.
//!
//! Deterministic and content-independent so the print-texture compositor can
//! reconstruct the exact same geometry as the 3D placement pipeline.

use crate::config::PipelineConfig;
use crate::float_types::Real;
use serde::{Deserialize, Serialize};

/// A rectangular slot on the card: center and size, millimeters, card
/// centered at the origin with +Y up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub x: Real,
    pub y: Real,
    pub width: Real,
    pub height: Real,
}

/// Named cells of the card face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CardLayout {
    /// Left portion of the lower band.
    pub figure: Cell,
    /// Right column, stacked top to bottom.
    pub accessories: [Cell; 3],
    /// Top strip reserved for the title/subtitle.
    pub text_band: Cell,
}

impl CardLayout {
    pub fn compute(config: &PipelineConfig) -> Self {
        let card_w = config.card.width_mm;
        let card_h = config.card.height_mm;

        let upper_h = card_h * config.upper_ratio;
        let lower_h = card_h - upper_h;
        let lower_y_min = -card_h / 2.0;
        let lower_y_center = lower_y_min + lower_h / 2.0;

        let figure_w = card_w * config.figure_width_ratio;
        let figure = Cell {
            x: -card_w / 2.0 + figure_w / 2.0,
            y: lower_y_center,
            width: figure_w,
            height: lower_h,
        };

        let column_w = card_w - figure_w;
        let column_x = card_w / 2.0 - column_w / 2.0;
        // The accessory stack spans a fraction of the *full* card height,
        // vertically centered within the lower band.
        let stack_h = card_h * config.accessory_height_ratio;
        let cell_h = stack_h / 3.0;
        let start_y = lower_y_center + stack_h / 2.0 - cell_h / 2.0;
        let accessories = std::array::from_fn(|i| Cell {
            x: column_x,
            y: start_y - i as Real * cell_h,
            width: column_w,
            height: cell_h,
        });

        let text_band = Cell {
            x: 0.0,
            y: card_h / 2.0 - upper_h / 2.0,
            width: card_w,
            height: upper_h,
        };

        CardLayout {
            figure,
            accessories,
            text_band,
        }
    }
}
