//! Pixel offset of a centroid from the reference position

use serde::{Deserialize, Serialize};

use crate::image_size::ImageSize;

/// Where the star should sit when the telescope is perfectly pointed.
///
/// Expressed in pixels relative to the subframe center, not to pixel (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReferencePosition {
    pub x: f64,
    pub y: f64,
}

impl ReferencePosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Displacement of the source from the reference position, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelOffset {
    /// Column displacement
    pub dx: f64,
    /// Row displacement
    pub dy: f64,
}

impl PixelOffset {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

/// Offset of a centroid from the reference position of a subframe.
///
/// `dx = cx - ref.x - width / 2`, `dy = cy - ref.y - height / 2`, with the
/// half sizes floored the same way the centered subframe crop floors them.
pub fn calc_offset(
    centroid_x: f64,
    centroid_y: f64,
    subframe: ImageSize,
    reference: ReferencePosition,
) -> PixelOffset {
    let (cx, cy) = subframe.center();
    PixelOffset {
        dx: centroid_x - reference.x - cx as f64,
        dy: centroid_y - reference.y - cy as f64,
    }
}
