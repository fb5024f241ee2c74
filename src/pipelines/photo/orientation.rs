// SPDX-License-Identifier: GPL-3.0-only

//! EXIF orientation handling
//!
//! Cameras frequently store pixels in sensor order and record how the image
//! should be displayed in EXIF tag 0x0112. Guide fractions are defined on the
//! upright picture, so the photo has to be normalised before it is cropped.

use image::DynamicImage;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use tracing::debug;

/// The eight EXIF orientations
///
/// Each variant names the transform that turns the stored buffer into the
/// upright picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    /// 1: stored upright
    #[default]
    Normal,
    /// 2: mirrored left-right
    FlipHorizontal,
    /// 3: upside down
    Rotate180,
    /// 4: mirrored top-bottom
    FlipVertical,
    /// 5: mirrored across the main diagonal
    Transpose,
    /// 6: rotate 90 degrees clockwise to display
    Rotate90,
    /// 7: mirrored across the anti-diagonal
    Transverse,
    /// 8: rotate 270 degrees clockwise to display
    Rotate270,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::Normal,
        Orientation::FlipHorizontal,
        Orientation::Rotate180,
        Orientation::FlipVertical,
        Orientation::Transpose,
        Orientation::Rotate90,
        Orientation::Transverse,
        Orientation::Rotate270,
    ];

    /// Parse an EXIF orientation value; unknown values read as `Normal`
    pub fn from_exif(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    /// EXIF value for this orientation
    pub fn exif_value(&self) -> u16 {
        match self {
            Orientation::Normal => 1,
            Orientation::FlipHorizontal => 2,
            Orientation::Rotate180 => 3,
            Orientation::FlipVertical => 4,
            Orientation::Transpose => 5,
            Orientation::Rotate90 => 6,
            Orientation::Transverse => 7,
            Orientation::Rotate270 => 8,
        }
    }

    /// Orientation a sensor mounted at `degrees` clockwise records
    pub fn from_rotation_degrees(degrees: u32) -> Self {
        match degrees % 360 {
            90 => Orientation::Rotate90,
            180 => Orientation::Rotate180,
            270 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    /// Whether displaying the buffer swaps its width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90
                | Orientation::Transverse
                | Orientation::Rotate270
        )
    }

    /// Upright dimensions of a `width`x`height` stored buffer
    pub fn display_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Turn a stored buffer into the upright picture
    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Normal => image,
            Orientation::FlipHorizontal => image.fliph(),
            Orientation::Rotate180 => image.rotate180(),
            Orientation::FlipVertical => image.flipv(),
            Orientation::Transpose => image.rotate90().fliph(),
            Orientation::Rotate90 => image.rotate90(),
            Orientation::Transverse => image.rotate270().fliph(),
            Orientation::Rotate270 => image.rotate270(),
        }
    }

    /// Turn an upright picture back into the buffer a sensor with this
    /// orientation would have stored
    pub fn unapply(&self, image: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Rotate90 => image.rotate270(),
            Orientation::Rotate270 => image.rotate90(),
            // The mirrors, 180 and the two diagonal reflections are involutions
            other => other.apply(image),
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.exif_value())
    }
}

fn orientation_from_reader<R: std::io::BufRead + std::io::Seek>(reader: &mut R) -> Orientation {
    let exif = match exif::Reader::new().read_from_container(reader) {
        Ok(exif) => exif,
        Err(_) => return Orientation::Normal,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .map(Orientation::from_exif)
        .unwrap_or_default()
}

/// Read the orientation tag of an image file
///
/// Missing files, missing EXIF data and unknown tag values all read as
/// `Normal`; decoding errors are reported later by [`normalize`].
pub fn read_orientation(path: &Path) -> Orientation {
    match File::open(path) {
        Ok(file) => orientation_from_reader(&mut BufReader::new(file)),
        Err(_) => Orientation::Normal,
    }
}

/// Read the orientation tag from in-memory image bytes
pub fn read_orientation_from_bytes(bytes: &[u8]) -> Orientation {
    orientation_from_reader(&mut Cursor::new(bytes))
}

/// Decode an image file into its upright pixel buffer
pub fn normalize(path: &Path) -> Result<DynamicImage, String> {
    let orientation = read_orientation(path);

    let image = image::ImageReader::open(path)
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?
        .with_guessed_format()
        .map_err(|e| format!("Failed to probe {}: {}", path.display(), e))?
        .decode()
        .map_err(|e| format!("Failed to decode {}: {}", path.display(), e))?;

    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        %orientation,
        "Normalizing orientation"
    );

    Ok(orientation.apply(image))
}
