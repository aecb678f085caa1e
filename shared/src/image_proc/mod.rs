//! Image processing for the guide camera
//!
//! Subframe extraction, Gaussian smoothing and the variance-profile centroid
//! estimator, plus the pixel offset math that turns a centroid into a
//! displacement from the reference position.

pub mod centroid;
pub mod convolve;
pub mod offset;
pub mod subframe;

pub use centroid::{axis_std_profiles, find_centroid, Centroid, CentroidConfig, Detection, NoDetection};
pub use convolve::{convolve_separable_same, gaussian_window};
pub use offset::{calc_offset, PixelOffset, ReferencePosition};
pub use subframe::{SubframeBox, SubframeError, SubframeSpec};
