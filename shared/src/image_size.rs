//! Frame and subframe dimensions

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height of a frame or subframe, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Image width in pixels (columns)
    pub width: usize,
    /// Image height in pixels (rows)
    pub height: usize,
}

impl ImageSize {
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Size of an ndarray frame.
    ///
    /// Frames are row-major: shape is (height, width).
    pub fn of<T>(frame: &ArrayView2<T>) -> Self {
        let (height, width) = frame.dim();
        Self { width, height }
    }

    /// Geometric center using integer floor division.
    ///
    /// This is the convention used both when cropping a centered subframe and
    /// when computing offsets, so the two never disagree by half a pixel.
    pub fn center(&self) -> (usize, usize) {
        (self.width / 2, self.height / 2)
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
