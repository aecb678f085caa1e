//! `PT` offset command encoding

use std::fmt;

use shared::guide_config::TCS_MAX_OFFSET_ARCSEC;
use shared::optics::{AngularOffset, AxisMapping};

use super::{TcsError, TcsResult};

/// A validated two-axis telescope move.
///
/// Values are in arcseconds, finite, and within the ±6000 arcsec range the
/// TCS accepts per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TcsCommand {
    ew_arcsec: f64,
    ns_arcsec: f64,
}

impl TcsCommand {
    /// Build an offset move from East-West and North-South components.
    pub fn offset(ew_arcsec: f64, ns_arcsec: f64) -> TcsResult<Self> {
        for (axis, value) in [("EW", ew_arcsec), ("NS", ns_arcsec)] {
            if !value.is_finite() {
                return Err(TcsError::InvalidCommand(format!("{axis} offset is {value}")));
            }
            if value.abs() > TCS_MAX_OFFSET_ARCSEC {
                return Err(TcsError::InvalidCommand(format!(
                    "{axis} offset {value} arcsec exceeds ±{TCS_MAX_OFFSET_ARCSEC}"
                )));
            }
        }
        Ok(Self {
            ew_arcsec: normalize_zero(ew_arcsec),
            ns_arcsec: normalize_zero(ns_arcsec),
        })
    }

    /// Map an image-axis angular offset onto the telescope axes.
    pub fn from_angular(offset: AngularOffset, mapping: &AxisMapping) -> TcsResult<Self> {
        let (ew, ns) = mapping.to_ew_ns(offset);
        Self::offset(ew, ns)
    }

    pub fn ew_arcsec(&self) -> f64 {
        self.ew_arcsec
    }

    pub fn ns_arcsec(&self) -> f64 {
        self.ns_arcsec
    }

    /// Larger of the two axis magnitudes
    pub fn max_abs_arcsec(&self) -> f64 {
        self.ew_arcsec.abs().max(self.ns_arcsec.abs())
    }

    /// Exact bytes sent to the TCS: `PT <ew> <ns> \r`.
    ///
    /// Numbers use the shortest decimal text that round-trips, so whole
    /// values print without a fractional part (`-3`, not `-3.0`).
    pub fn to_wire(&self) -> String {
        format!("{self} \r")
    }
}

impl fmt::Display for TcsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PT {} {}", self.ew_arcsec, self.ns_arcsec)
    }
}

/// `-0.0` prints as `-0`; the TCS only needs to see `0`.
fn normalize_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}
