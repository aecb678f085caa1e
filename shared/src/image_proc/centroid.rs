//! Variance-profile centroid estimator for a single guide star
//!
//! The subframe is smoothed with a wide Gaussian, then collapsed into two 1-D
//! profiles: the standard deviation of every column and of every row. A point
//! source makes the columns and rows that cross it much more variable than the
//! flat background, so the peak of each profile marks the source position.
//!
//! Each profile is normalized by subtracting the median of an assumed
//! background window and dividing by the profile maximum, which leaves the
//! background near zero and the source peak near one.
//!
//! # Assumptions
//!
//! Exactly one dominant point source is expected inside the subframe. With two
//! comparable sources the column and row peaks are picked independently, so the
//! reported position takes its x from one source and its y from either of them.
//! Callers that cannot guarantee a single source must select a tighter subframe.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

use super::convolve::{convolve_separable_same, gaussian_window};

/// Parameters of the centroid estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CentroidConfig {
    /// Length of each 1-D Gaussian window (samples)
    pub kernel_length: usize,
    /// Standard deviation of each 1-D Gaussian window (pixels)
    pub kernel_sigma: f64,
    /// First profile index of the background window (inclusive)
    pub background_start: usize,
    /// Last profile index of the background window (exclusive, clamped to the profile)
    pub background_end: usize,
    /// Normalized peak height at or below which a detection is low confidence
    pub min_contrast: f64,
}

impl Default for CentroidConfig {
    fn default() -> Self {
        Self {
            kernel_length: 70,
            kernel_sigma: 8.0,
            background_start: 100,
            background_end: 300,
            min_contrast: 0.0,
        }
    }
}

/// Source position in subframe pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    /// Column index
    pub x: usize,
    /// Row index
    pub y: usize,
    /// Smaller of the two normalized profile peaks (0 = background, 1 = ideal)
    pub contrast: f64,
}

/// Why no confident detection was produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoDetection {
    /// Subframe has no pixels
    EmptyFrame,
    /// A profile is too short to contain the background window
    NoBackgroundWindow { profile_len: usize, start: usize },
    /// No profile value rises above the background level
    NoPeak,
    /// A peak exists but does not clear the configured contrast
    LowContrast { centroid: Centroid, min_contrast: f64 },
}

/// Outcome of [`find_centroid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    Found(Centroid),
    NotFound(NoDetection),
}

impl Detection {
    /// The centroid, if the detection is confident.
    pub fn centroid(&self) -> Option<Centroid> {
        match self {
            Detection::Found(c) => Some(*c),
            Detection::NotFound(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Detection::Found(_))
    }
}

/// Per-column and per-row population standard deviation of a smoothed frame.
///
/// Returns `(column_std, row_std)`; `column_std` has one entry per column
/// (the x profile), `row_std` one entry per row (the y profile).
pub fn axis_std_profiles(smoothed: &ArrayView2<f64>) -> (Array1<f64>, Array1<f64>) {
    if smoothed.is_empty() {
        return (Array1::zeros(0), Array1::zeros(0));
    }
    (smoothed.std_axis(Axis(0), 0.0), smoothed.std_axis(Axis(1), 0.0))
}

/// Locate the dominant point source in a subframe.
///
/// The result is deterministic for a given input and configuration.
pub fn find_centroid<T>(subframe: &ArrayView2<T>, config: &CentroidConfig) -> Detection
where
    T: AsPrimitive<f64>,
{
    if subframe.is_empty() {
        return Detection::NotFound(NoDetection::EmptyFrame);
    }

    let image = subframe.mapv(|v| v.as_());
    let window = gaussian_window(config.kernel_length, config.kernel_sigma);
    let smoothed = convolve_separable_same(&image.view(), &window.view(), &window.view());
    let (x_profile, y_profile) = axis_std_profiles(&smoothed.view());

    let x_peak = match profile_peak(x_profile.view(), config) {
        Ok(peak) => peak,
        Err(reason) => return Detection::NotFound(reason),
    };
    let y_peak = match profile_peak(y_profile.view(), config) {
        Ok(peak) => peak,
        Err(reason) => return Detection::NotFound(reason),
    };

    let centroid = Centroid {
        x: x_peak.0,
        y: y_peak.0,
        contrast: x_peak.1.min(y_peak.1),
    };

    if centroid.contrast <= config.min_contrast {
        log::debug!(
            "Centroid at ({}, {}) has contrast {:.4} <= {:.4}",
            centroid.x,
            centroid.y,
            centroid.contrast,
            config.min_contrast
        );
        return Detection::NotFound(NoDetection::LowContrast {
            centroid,
            min_contrast: config.min_contrast,
        });
    }

    Detection::Found(centroid)
}

/// Normalize a profile against its background window and find the first maximum.
///
/// Returns `(index, normalized_peak)`.
fn profile_peak(profile: ArrayView1<f64>, config: &CentroidConfig) -> Result<(usize, f64), NoDetection> {
    let len = profile.len();
    let end = config.background_end.min(len);
    if config.background_start >= end {
        return Err(NoDetection::NoBackgroundWindow {
            profile_len: len,
            start: config.background_start,
        });
    }

    let background = median(profile.slice(ndarray::s![config.background_start..end]));
    let max = profile.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() || max <= 0.0 {
        return Err(NoDetection::NoPeak);
    }

    let mut best_index = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &v) in profile.iter().enumerate() {
        let normalized = (v - background) / max;
        if normalized > best_value {
            best_index = i;
            best_value = normalized;
        }
    }

    if best_value <= 0.0 {
        return Err(NoDetection::NoPeak);
    }
    Ok((best_index, best_value))
}

/// Median of a non-empty view; even lengths average the two middle values.
fn median(values: ArrayView1<f64>) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
