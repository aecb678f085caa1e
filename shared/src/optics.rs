//! Guider optics: plate scale and image-to-sky axis mapping.
//!
//! The guide camera sits behind a relay that re-images the telescope's prime
//! focus. The plate scale at the camera is
//!
//! ```text
//! arcsec/pixel = 206265 / focal_length_mm / relay_magnification * pixel_pitch_mm
//! ```
//!
//! and is applied isotropically to both axes.
//!
//! Two relay configurations have been used on the Hale guider, and mixing them
//! up silently miscalibrates every correction by 25%:
//!
//! | relay   | magnification | arcsec/pixel (3.45 µm pixels) |
//! |---------|---------------|-------------------------------|
//! | 150:100 | 1.5           | 0.028306                      |
//! | 150:80  | 1.875         | 0.022645                      |

use serde::{Deserialize, Serialize};

use crate::guide_config::ConfigError;
use crate::image_proc::PixelOffset;

/// Arcseconds per radian, as used for the guider plate scale.
pub const ARCSEC_PER_RADIAN: f64 = 206265.0;

/// Focal length of the Hale telescope prime focus in millimeters.
pub const HALE_FOCAL_LENGTH_MM: f64 = 16.76e3;

/// Pixel pitch of the guide camera in microns.
pub const GUIDER_PIXEL_PITCH_UM: f64 = 3.45;

/// Relay magnification of the 150 mm : 100 mm lens pair.
pub const RELAY_150_100: f64 = 150.0 / 100.0;

/// Relay magnification of the 150 mm : 80 mm lens pair.
pub const RELAY_150_80: f64 = 150.0 / 80.0;

/// Optical constants that determine the plate scale at the guide camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpticalTrain {
    /// Telescope focal length in millimeters
    pub focal_length_mm: f64,
    /// Ratio of guide lens focal length to collimator focal length
    pub relay_magnification: f64,
    /// Detector pixel pitch in microns
    pub pixel_pitch_um: f64,
}

impl OpticalTrain {
    /// Hale prime focus with the 150:100 relay.
    pub fn hale_relay_150_100() -> Self {
        Self {
            focal_length_mm: HALE_FOCAL_LENGTH_MM,
            relay_magnification: RELAY_150_100,
            pixel_pitch_um: GUIDER_PIXEL_PITCH_UM,
        }
    }

    /// Hale prime focus with the 150:80 relay.
    pub fn hale_relay_150_80() -> Self {
        Self {
            focal_length_mm: HALE_FOCAL_LENGTH_MM,
            relay_magnification: RELAY_150_80,
            pixel_pitch_um: GUIDER_PIXEL_PITCH_UM,
        }
    }

    /// Plate scale at prime focus in arcsec/mm
    pub fn prime_focus_scale(&self) -> f64 {
        ARCSEC_PER_RADIAN / self.focal_length_mm
    }

    /// Plate scale at the guide camera in arcsec/pixel
    pub fn plate_scale(&self) -> PlateScale {
        let arcsec_per_mm = self.prime_focus_scale() / self.relay_magnification;
        PlateScale::new(arcsec_per_mm * (self.pixel_pitch_um / 1000.0))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("focal_length_mm", self.focal_length_mm),
            ("relay_magnification", self.relay_magnification),
            ("pixel_pitch_um", self.pixel_pitch_um),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field: format!("optics.{name}"),
                    reason: format!("must be a positive number, got {value}"),
                });
            }
        }
        Ok(())
    }
}

impl Default for OpticalTrain {
    fn default() -> Self {
        Self::hale_relay_150_80()
    }
}

/// Angular size of one detector pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlateScale {
    pub arcsec_per_pixel: f64,
}

impl PlateScale {
    pub fn new(arcsec_per_pixel: f64) -> Self {
        Self { arcsec_per_pixel }
    }

    /// Convert a pixel displacement into arcseconds on both axes.
    pub fn pixel_to_arcsec(&self, offset: PixelOffset) -> AngularOffset {
        AngularOffset {
            dx_arcsec: offset.dx * self.arcsec_per_pixel,
            dy_arcsec: offset.dy * self.arcsec_per_pixel,
        }
    }
}

/// Pixel offset scaled to arcseconds, still in image axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AngularOffset {
    /// Column axis displacement in arcsec
    pub dx_arcsec: f64,
    /// Row axis displacement in arcsec
    pub dy_arcsec: f64,
}

/// Image axis feeding a telescope move axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageAxis {
    /// Across the guide image (dx)
    Column,
    /// Down the guide image (dy)
    Row,
}

/// Calibration of guide-image axes against the telescope's EW and NS moves.
///
/// The default is the convention in use at the telescope: the row axis drives
/// East-West and the column axis drives North-South with a sign flip. It has
/// not been confirmed on sky whether the TCS sign refers to the telescope or
/// to the star, so this must be re-verified for each optical train rather than
/// changed in code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxisMapping {
    pub ew_axis: ImageAxis,
    /// +1 or -1
    pub ew_sign: f64,
    pub ns_axis: ImageAxis,
    /// +1 or -1
    pub ns_sign: f64,
}

impl AxisMapping {
    /// `EW = +dy`, `NS = -dx`
    pub fn row_ew_column_ns() -> Self {
        Self {
            ew_axis: ImageAxis::Row,
            ew_sign: 1.0,
            ns_axis: ImageAxis::Column,
            ns_sign: -1.0,
        }
    }

    /// `EW = -dx`, `NS = -dy`, the convention of the offline command-file guider
    pub fn legacy_offline() -> Self {
        Self {
            ew_axis: ImageAxis::Column,
            ew_sign: -1.0,
            ns_axis: ImageAxis::Row,
            ns_sign: -1.0,
        }
    }

    /// Map an image-axis offset onto `(ew_arcsec, ns_arcsec)`.
    pub fn to_ew_ns(&self, offset: AngularOffset) -> (f64, f64) {
        let pick = |axis: ImageAxis| match axis {
            ImageAxis::Column => offset.dx_arcsec,
            ImageAxis::Row => offset.dy_arcsec,
        };
        (self.ew_sign * pick(self.ew_axis), self.ns_sign * pick(self.ns_axis))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ew_axis == self.ns_axis {
            return Err(ConfigError::Invalid {
                field: "axis_mapping".to_string(),
                reason: "EW and NS must come from different image axes".to_string(),
            });
        }
        for (name, sign) in [("ew_sign", self.ew_sign), ("ns_sign", self.ns_sign)] {
            if sign != 1.0 && sign != -1.0 {
                return Err(ConfigError::Invalid {
                    field: format!("axis_mapping.{name}"),
                    reason: format!("must be 1 or -1, got {sign}"),
                });
            }
        }
        Ok(())
    }
}

impl Default for AxisMapping {
    fn default() -> Self {
        Self::row_ew_column_ns()
    }
}
