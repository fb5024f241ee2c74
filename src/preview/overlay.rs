// SPDX-License-Identifier: GPL-3.0-only

//! Capture guide drawn over the preview
//!
//! Everything outside the guide is veiled in translucent black and the guide
//! itself gets a solid outline centred on its edge. The guide is placed
//! with the same crop strategy the photo will be cut with, so the outline
//! frames exactly the pixels that end up in the cropped photo.

use crate::constants::overlay;
use crate::pipelines::photo::{CropRect, CropStrategy, GuideRect};
use image::RgbaImage;

/// How the guide is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Opacity of the veil outside the guide (0 = none, 1 = black)
    pub dim_alpha: f32,
    /// Outline colour
    pub color: [u8; 4],
    /// Outline thickness in pixels
    pub stroke: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            dim_alpha: overlay::DIM_ALPHA,
            color: overlay::GUIDE_COLOR,
            stroke: overlay::DEFAULT_STROKE,
        }
    }
}

/// Draw the guide onto an upright preview frame
///
/// Returns the guide's pixel rectangle, or `None` for an empty frame.
pub fn render_guide_overlay(
    frame: &mut RgbaImage,
    guide: &GuideRect,
    strategy: CropStrategy,
    style: &OverlayStyle,
) -> Option<CropRect> {
    let (width, height) = frame.dimensions();
    let rect = strategy.crop_rect(width, height, guide)?;
    let keep = 1.0 - style.dim_alpha.clamp(0.0, 1.0);

    // Half the stroke lies outside the edge, the rest inside
    let outer = i64::from(style.stroke / 2);
    let inner = i64::from(style.stroke) - outer;
    let (left, top) = (i64::from(rect.left), i64::from(rect.top));
    let (right, bottom) = (i64::from(rect.right()), i64::from(rect.bottom()));
    let within = |x: i64, y: i64, grow: i64| {
        x >= left - grow && x < right + grow && y >= top - grow && y < bottom + grow
    };

    for (x, y, pixel) in frame.enumerate_pixels_mut() {
        let (x, y) = (i64::from(x), i64::from(y));
        if within(x, y, outer) && !within(x, y, -inner) {
            pixel.0 = style.color;
        } else if !within(x, y, 0) {
            for channel in &mut pixel.0[..3] {
                *channel = (f32::from(*channel) * keep).round() as u8;
            }
        }
    }

    Some(rect)
}
