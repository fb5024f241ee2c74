// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Preview and capture aspect ratio, as `width:height` of the landscape sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// 16:9, the ratio the meter preview is bound at
    pub const WIDESCREEN: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };

    /// 4:3
    pub const STANDARD: AspectRatio = AspectRatio {
        width: 4,
        height: 3,
    };

    /// Long side over short side
    pub fn ratio(&self) -> f64 {
        let long = self.width.max(self.height).max(1);
        let short = self.width.min(self.height).max(1);
        f64::from(long) / f64::from(short)
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::WIDESCREEN
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| format!("aspect ratio must look like 16:9, got '{}'", s))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("bad width '{}'", w))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("bad height '{}'", h))?;
        if width == 0 || height == 0 {
            return Err(format!("aspect ratio '{}' has a zero side", s));
        }
        Ok(AspectRatio { width, height })
    }
}

/// Capture defaults and file layout
pub mod capture {
    /// Digital zoom applied when the preview is bound
    pub const DEFAULT_ZOOM: f32 = 2.0;

    /// JPEG quality for both full and cropped photos
    pub const DEFAULT_JPEG_QUALITY: u8 = 92;

    /// Directory name under the data and config dirs
    pub const APP_DIR_NAME: &str = "meter-capture";

    /// Photo directory under the app data dir
    pub const CAPTURE_DIR_NAME: &str = "app_images";

    /// Config file name under the app config dir
    pub const CONFIG_FILE_NAME: &str = "config.json";

    /// Prefix of every photo file name
    pub const FILE_PREFIX: &str = "meter";

    /// Suffix of the full-resolution photo
    pub const FULL_SUFFIX: &str = "full";

    /// Suffix of the cropped photo
    pub const CROP_SUFFIX: &str = "crop";

    /// chrono format of the timestamp in photo names (millisecond precision)
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";
}

/// Guide overlay drawing
pub mod overlay {
    /// Opacity of the black veil outside the guide
    pub const DIM_ALPHA: f32 = 0.35;

    /// Guide outline colour (#22C55E)
    pub const GUIDE_COLOR: [u8; 4] = [0x22, 0xC5, 0x5E, 0xFF];

    /// Outline thickness in pixels
    pub const DEFAULT_STROKE: u32 = 4;
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Frames are discarded for this long after binding while exposure settles
    pub const PREVIEW_WARMUP: Duration = Duration::from_millis(500);

    /// How long to wait for a preview frame before giving up
    pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Supported file formats for the file-source camera
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    use std::path::Path;

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }

    /// Check if the application is running inside a Flatpak sandbox
    pub fn is_flatpak() -> bool {
        Path::new("/.flatpak-info").exists()
    }

    /// Get the runtime environment string (e.g., "Flatpak" or "Native")
    pub fn runtime_environment() -> &'static str {
        if is_flatpak() { "Flatpak" } else { "Native" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!("16:9".parse::<AspectRatio>(), Ok(AspectRatio::WIDESCREEN));
        assert_eq!(" 4 : 3 ".trim().parse::<AspectRatio>(), Ok(AspectRatio::STANDARD));
        assert!("16x9".parse::<AspectRatio>().is_err());
        assert!("16:0".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_aspect_ratio_ignores_orientation() {
        let portrait = AspectRatio {
            width: 9,
            height: 16,
        };
        assert_eq!(portrait.ratio(), AspectRatio::WIDESCREEN.ratio());
        assert_eq!(AspectRatio::default().to_string(), "16:9");
    }

    #[test]
    fn test_image_extensions() {
        assert!(file_formats::is_image_extension("JPG"));
        assert!(!file_formats::is_image_extension("mp4"));
    }
}
