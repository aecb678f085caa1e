//! Subframe (region of interest) extraction
//!
//! A subframe is a half-open box `[x0, x1) x [y0, y1)` in full-frame pixel
//! coordinates, where x is the column and y is the row. Extraction borrows
//! from the parent frame; nothing is copied.

use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image_size::ImageSize;

/// Errors from subframe construction or extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubframeError {
    #[error("Subframe box is empty or inverted: x {x0}..{x1}, y {y0}..{y1}")]
    Empty {
        x0: usize,
        x1: usize,
        y0: usize,
        y1: usize,
    },

    #[error("Subframe {requested} does not fit inside frame {frame}")]
    OutOfBounds { requested: String, frame: ImageSize },
}

/// Rectangular crop of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubframeBox {
    /// First column (inclusive)
    pub x0: usize,
    /// Last column (exclusive)
    pub x1: usize,
    /// First row (inclusive)
    pub y0: usize,
    /// Last row (exclusive)
    pub y1: usize,
}

impl SubframeBox {
    /// Create an explicit box, rejecting empty or inverted ranges.
    pub fn new(x0: usize, x1: usize, y0: usize, y1: usize) -> Result<Self, SubframeError> {
        if x1 <= x0 || y1 <= y0 {
            return Err(SubframeError::Empty { x0, x1, y0, y1 });
        }
        Ok(Self { x0, x1, y0, y1 })
    }

    /// Square box of half-size `side / 2` around the frame center.
    ///
    /// The box spans `center - side/2 .. center + side/2` on both axes, so an
    /// odd `side` yields a box one pixel smaller than requested. The frame
    /// center uses the same floor division as [`ImageSize::center`].
    pub fn centered(frame: ImageSize, side: usize) -> Result<Self, SubframeError> {
        let r = side / 2;
        let (cx, cy) = frame.center();

        if r == 0 {
            return Err(SubframeError::Empty {
                x0: cx,
                x1: cx,
                y0: cy,
                y1: cy,
            });
        }
        if r > cx || r > cy || cx + r > frame.width || cy + r > frame.height {
            return Err(SubframeError::OutOfBounds {
                requested: format!("centered {side}x{side}"),
                frame,
            });
        }

        Self::new(cx - r, cx + r, cy - r, cy + r)
    }

    /// Width and height of the box
    pub fn size(&self) -> ImageSize {
        ImageSize::from_width_height(self.x1 - self.x0, self.y1 - self.y0)
    }

    /// Top-left corner in full-frame coordinates
    pub fn origin(&self) -> (usize, usize) {
        (self.x0, self.y0)
    }

    /// Check that this box lies inside a frame of the given size.
    pub fn validate_for_frame(&self, frame: ImageSize) -> Result<(), SubframeError> {
        if self.x1 > frame.width || self.y1 > frame.height {
            return Err(SubframeError::OutOfBounds {
                requested: format!("x {}..{}, y {}..{}", self.x0, self.x1, self.y0, self.y1),
                frame,
            });
        }
        Ok(())
    }

    /// Borrow the boxed region of `frame`.
    pub fn extract<'a, T>(&self, frame: ArrayView2<'a, T>) -> Result<ArrayView2<'a, T>, SubframeError> {
        self.validate_for_frame(ImageSize::of(&frame))?;
        Ok(frame.slice_move(s![self.y0..self.y1, self.x0..self.x1]))
    }
}

/// How the guider chooses its subframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubframeSpec {
    /// Centered square with the given side length in pixels
    Centered { size: usize },
    /// Explicit box in full-frame coordinates
    Box(SubframeBox),
}

impl SubframeSpec {
    /// Resolve against an actual frame size.
    pub fn resolve(&self, frame: ImageSize) -> Result<SubframeBox, SubframeError> {
        match *self {
            SubframeSpec::Centered { size } => SubframeBox::centered(frame, size),
            SubframeSpec::Box(b) => {
                b.validate_for_frame(frame)?;
                Ok(b)
            }
        }
    }
}

impl Default for SubframeSpec {
    fn default() -> Self {
        SubframeSpec::Centered { size: 1500 }
    }
}
