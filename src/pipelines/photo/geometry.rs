// SPDX-License-Identifier: GPL-3.0-only

//! Guide rectangle to pixel crop mapping
//!
//! The on-screen guide is expressed in fractions of the (upright, zoomed)
//! preview viewport. A captured photo can have any resolution, so the guide
//! is mapped into pixel space per capture. The mapping never leaves the image
//! and never produces an empty rectangle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fractional rectangle describing the capture guide in the preview viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Why a guide rectangle was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A component is NaN or infinite
    NotFinite,
    /// Offset below zero
    NegativeOffset { left: f64, top: f64 },
    /// Width or height not strictly positive
    EmptyExtent { width: f64, height: f64 },
    /// Rectangle extends past the right or bottom edge of the viewport
    OutOfViewport { right: f64, bottom: f64 },
    /// Digital zoom below 1x
    InvalidZoom(f32),
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::NotFinite => write!(f, "guide rectangle has non-finite values"),
            GeometryError::NegativeOffset { left, top } => {
                write!(f, "guide offset must be >= 0 (left={}, top={})", left, top)
            }
            GeometryError::EmptyExtent { width, height } => write!(
                f,
                "guide size must be > 0 (width={}, height={})",
                width, height
            ),
            GeometryError::OutOfViewport { right, bottom } => write!(
                f,
                "guide exceeds viewport (right={}, bottom={})",
                right, bottom
            ),
            GeometryError::InvalidZoom(zoom) => write!(f, "zoom must be >= 1.0, got {}", zoom),
        }
    }
}

impl std::error::Error for GeometryError {}

/// Tolerance for `left + width <= 1` checks on values typed as decimals
const VIEWPORT_EPSILON: f64 = 1e-9;

impl GuideRect {
    /// Guide used by the meter capture screen
    pub const METER_DEFAULT: GuideRect = GuideRect {
        left: 0.16,
        top: 0.34,
        width: 0.68,
        height: 0.18,
    };

    /// Create a validated guide rectangle
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Result<Self, GeometryError> {
        let rect = Self {
            left,
            top,
            width,
            height,
        };
        rect.validate()?;
        Ok(rect)
    }

    /// Check the viewport invariants
    ///
    /// Offsets may be zero; extents must be positive and the rectangle must fit
    /// inside the unit square.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let values = [self.left, self.top, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GeometryError::NotFinite);
        }
        if self.left < 0.0 || self.top < 0.0 {
            return Err(GeometryError::NegativeOffset {
                left: self.left,
                top: self.top,
            });
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(GeometryError::EmptyExtent {
                width: self.width,
                height: self.height,
            });
        }
        let right = self.left + self.width;
        let bottom = self.top + self.height;
        if right > 1.0 + VIEWPORT_EPSILON || bottom > 1.0 + VIEWPORT_EPSILON {
            return Err(GeometryError::OutOfViewport { right, bottom });
        }
        Ok(())
    }
}

impl Default for GuideRect {
    fn default() -> Self {
        Self::METER_DEFAULT
    }
}

/// Pixel-space rectangle inside a concrete image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }

    /// Whether the rectangle is non-empty and lies within a `width`x`height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width >= 1
            && self.height >= 1
            && u64::from(self.left) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.top) + u64::from(self.height) <= u64::from(height)
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// How the guide rectangle is placed on the photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropStrategy {
    /// Guide `left`/`top` are absolute offsets from the top-left corner
    #[default]
    Offset,
    /// Guide `width`/`height` are used as a rectangle centred on the image;
    /// `left`/`top` are ignored
    Centered,
}

impl CropStrategy {
    pub const ALL: [CropStrategy; 2] = [CropStrategy::Offset, CropStrategy::Centered];

    pub fn display_name(&self) -> &'static str {
        match self {
            CropStrategy::Offset => "offset",
            CropStrategy::Centered => "centered",
        }
    }

    /// Map `guide` into an `image_width`x`image_height` image
    ///
    /// Returns `None` only for an image with a zero dimension.
    pub fn crop_rect(
        &self,
        image_width: u32,
        image_height: u32,
        guide: &GuideRect,
    ) -> Option<CropRect> {
        match self {
            CropStrategy::Offset => compute_crop_rect(image_width, image_height, guide),
            CropStrategy::Centered => compute_centered_crop_rect(image_width, image_height, guide),
        }
    }
}

impl std::str::FromStr for CropStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offset" => Ok(CropStrategy::Offset),
            "centered" | "centred" | "center" => Ok(CropStrategy::Centered),
            other => Err(format!("unknown crop strategy '{}'", other)),
        }
    }
}

impl fmt::Display for CropStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Round `extent * fraction` to the nearest pixel, saturating into `u32`
fn scale(extent: u32, fraction: f64) -> u32 {
    let scaled = (f64::from(extent) * fraction).round();
    if scaled <= 0.0 {
        0
    } else if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Map one axis of an offset guide: returns (start, length)
fn offset_axis(extent: u32, start_fraction: f64, length_fraction: f64) -> (u32, u32) {
    // Start stops one pixel short of the edge so a 1px extent always fits.
    let start = scale(extent, start_fraction).min(extent - 1);
    let length = scale(extent, length_fraction).clamp(1, extent - start);
    (start, length)
}

/// Map one axis of a centred guide: returns (start, length)
fn centered_axis(extent: u32, length_fraction: f64) -> (u32, u32) {
    let length = scale(extent, length_fraction).clamp(1, extent);
    ((extent - length) / 2, length)
}

/// Offset-rectangle crop
///
/// `left = round(W * guide.left)` clamped into the image, `width =
/// round(W * guide.width)` clamped to `[1, W - left]`; the vertical axis is
/// analogous.
pub fn compute_crop_rect(
    image_width: u32,
    image_height: u32,
    guide: &GuideRect,
) -> Option<CropRect> {
    if image_width == 0 || image_height == 0 {
        return None;
    }
    let (left, width) = offset_axis(image_width, guide.left, guide.width);
    let (top, height) = offset_axis(image_height, guide.top, guide.height);
    Some(CropRect {
        left,
        top,
        width,
        height,
    })
}

/// Centred-rectangle crop: guide extents centred on the image
pub fn compute_centered_crop_rect(
    image_width: u32,
    image_height: u32,
    guide: &GuideRect,
) -> Option<CropRect> {
    if image_width == 0 || image_height == 0 {
        return None;
    }
    let (left, width) = centered_axis(image_width, guide.width);
    let (top, height) = centered_axis(image_height, guide.height);
    Some(CropRect {
        left,
        top,
        width,
        height,
    })
}

/// Region of a sensor frame kept by a centred digital zoom
///
/// A zoom of 2.0 keeps the central half of each axis. Because the region is
/// centred and scaled equally on both axes it is the same whether applied
/// before or after an orientation transform.
pub fn digital_zoom_rect(
    image_width: u32,
    image_height: u32,
    zoom: f32,
) -> Result<CropRect, GeometryError> {
    if !zoom.is_finite() || zoom < 1.0 {
        return Err(GeometryError::InvalidZoom(zoom));
    }
    let fraction = 1.0 / f64::from(zoom);
    compute_centered_crop_rect(
        image_width.max(1),
        image_height.max(1),
        &GuideRect {
            left: 0.0,
            top: 0.0,
            width: fraction,
            height: fraction,
        },
    )
    .ok_or(GeometryError::InvalidZoom(zoom))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_guide_on_portrait_photo() {
        let rect = compute_crop_rect(1080, 1920, &GuideRect::METER_DEFAULT).unwrap();
        assert_eq!(
            rect,
            CropRect {
                left: 173,
                top: 653,
                width: 734,
                height: 346
            }
        );
    }

    #[test]
    fn test_tiny_guide_floors_to_one_pixel() {
        let guide = GuideRect::new(0.0, 0.0, 0.05, 0.05).unwrap();
        let rect = compute_crop_rect(10, 10, &guide).unwrap();
        assert_eq!(
            rect,
            CropRect {
                left: 0,
                top: 0,
                width: 1,
                height: 1
            }
        );
    }

    #[test]
    fn test_offset_at_far_edge_still_fits() {
        // left rounds to the full width on a 3px image
        let guide = GuideRect {
            left: 0.9,
            top: 0.9,
            width: 0.1,
            height: 0.1,
        };
        let rect = compute_crop_rect(3, 3, &guide).unwrap();
        assert!(rect.fits_within(3, 3), "{rect}");
        assert_eq!(rect.left, 2);
        assert_eq!(rect.width, 1);
    }

    #[test]
    fn test_single_pixel_image() {
        for strategy in CropStrategy::ALL {
            let rect = strategy.crop_rect(1, 1, &GuideRect::METER_DEFAULT).unwrap();
            assert_eq!(
                rect,
                CropRect {
                    left: 0,
                    top: 0,
                    width: 1,
                    height: 1
                }
            );
        }
    }

    #[test]
    fn test_zero_sized_image_has_no_crop() {
        assert_eq!(compute_crop_rect(0, 100, &GuideRect::METER_DEFAULT), None);
        assert_eq!(
            compute_centered_crop_rect(100, 0, &GuideRect::METER_DEFAULT),
            None
        );
    }

    #[test]
    fn test_centered_ignores_offsets() {
        let rect = compute_centered_crop_rect(1000, 500, &GuideRect::METER_DEFAULT).unwrap();
        assert_eq!(rect.width, 680);
        assert_eq!(rect.height, 90);
        assert_eq!(rect.left, 160);
        assert_eq!(rect.top, 205);
    }

    #[test]
    fn test_guide_validation() {
        assert!(GuideRect::new(0.16, 0.34, 0.68, 0.18).is_ok());
        assert!(matches!(
            GuideRect::new(-0.1, 0.0, 0.5, 0.5),
            Err(GeometryError::NegativeOffset { .. })
        ));
        assert!(matches!(
            GuideRect::new(0.1, 0.1, 0.0, 0.5),
            Err(GeometryError::EmptyExtent { .. })
        ));
        assert!(matches!(
            GuideRect::new(0.6, 0.1, 0.5, 0.5),
            Err(GeometryError::OutOfViewport { .. })
        ));
        assert_eq!(
            GuideRect::new(f64::NAN, 0.1, 0.5, 0.5),
            Err(GeometryError::NotFinite)
        );
    }

    #[test]
    fn test_crop_is_always_inside_image() {
        let guides = [
            GuideRect::METER_DEFAULT,
            GuideRect::new(0.0, 0.0, 1.0, 1.0).unwrap(),
            GuideRect::new(0.999, 0.999, 0.001, 0.001).unwrap(),
            GuideRect::new(0.5, 0.25, 0.5, 0.75).unwrap(),
            GuideRect::new(0.0, 0.0, 0.0001, 0.0001).unwrap(),
        ];
        let sizes = [1u32, 2, 3, 7, 10, 99, 1080, 1920, 4032];
        for guide in &guides {
            for &w in &sizes {
                for &h in &sizes {
                    for strategy in CropStrategy::ALL {
                        let rect = strategy.crop_rect(w, h, guide).unwrap();
                        assert!(
                            rect.fits_within(w, h),
                            "{strategy} {guide:?} on {w}x{h} gave {rect}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_digital_zoom_rect() {
        let rect = digital_zoom_rect(1920, 1080, 2.0).unwrap();
        assert_eq!(
            rect,
            CropRect {
                left: 480,
                top: 270,
                width: 960,
                height: 540
            }
        );
        let identity = digital_zoom_rect(640, 480, 1.0).unwrap();
        assert_eq!(identity.width, 640);
        assert_eq!(identity.height, 480);
        assert!(digital_zoom_rect(640, 480, 0.5).is_err());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("offset".parse::<CropStrategy>(), Ok(CropStrategy::Offset));
        assert_eq!("Centered".parse::<CropStrategy>(), Ok(CropStrategy::Centered));
        assert!("diagonal".parse::<CropStrategy>().is_err());
    }
}
