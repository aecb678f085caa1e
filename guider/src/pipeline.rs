//! One guide cycle, from frame to gate decision

use hardware::tcs::Telemetry;
use ndarray::ArrayView2;
use shared::guide_config::GuideConfig;
use shared::image_proc::{
    calc_offset, find_centroid, CentroidConfig, Detection, PixelOffset, ReferencePosition,
    SubframeBox, SubframeError, SubframeSpec,
};
use shared::image_size::ImageSize;
use shared::optics::{AngularOffset, AxisMapping, PlateScale};

use crate::gate::{GateDecision, SafetyGate};

/// Everything computed in one guide cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub frame_size: ImageSize,
    /// Subframe in full-frame coordinates
    pub subframe: SubframeBox,
    pub detection: Detection,
    /// Set when a centroid was found
    pub pixel_offset: Option<PixelOffset>,
    pub angular_offset: Option<AngularOffset>,
    pub decision: GateDecision,
    /// Set when telemetry was requested and fetched
    pub telemetry: Option<Telemetry>,
}

/// Stateless frame-to-correction pipeline built from a [`GuideConfig`].
#[derive(Debug, Clone)]
pub struct GuidePipeline {
    subframe: SubframeSpec,
    reference: ReferencePosition,
    centroid: CentroidConfig,
    plate_scale: PlateScale,
    axis_mapping: AxisMapping,
    gate: SafetyGate,
}

impl GuidePipeline {
    pub fn from_config(config: &GuideConfig) -> Self {
        Self {
            subframe: config.subframe,
            reference: config.reference,
            centroid: config.centroid,
            plate_scale: config.optics.plate_scale(),
            axis_mapping: config.axis_mapping,
            gate: SafetyGate::new(config.safety_bound_arcsec),
        }
    }

    pub fn plate_scale(&self) -> PlateScale {
        self.plate_scale
    }

    pub fn gate(&self) -> &SafetyGate {
        &self.gate
    }

    /// Crop, centroid, convert and gate one frame.
    ///
    /// Fails only when the configured subframe does not fit the frame.
    pub fn process(&self, frame: &ArrayView2<u16>) -> Result<CycleReport, SubframeError> {
        let frame_size = ImageSize::of(frame);
        let subframe = self.subframe.resolve(frame_size)?;
        let view = subframe.extract(frame.view())?;
        let detection = find_centroid(&view, &self.centroid);

        let centroid = match detection {
            Detection::Found(c) => c,
            Detection::NotFound(reason) => {
                return Ok(CycleReport {
                    frame_size,
                    subframe,
                    detection,
                    pixel_offset: None,
                    angular_offset: None,
                    decision: GateDecision::SkippedLowConfidence(reason),
                    telemetry: None,
                });
            }
        };

        let pixel = calc_offset(
            centroid.x as f64,
            centroid.y as f64,
            subframe.size(),
            self.reference,
        );
        let angular = self.plate_scale.pixel_to_arcsec(pixel);
        let (ew, ns) = self.axis_mapping.to_ew_ns(angular);

        Ok(CycleReport {
            frame_size,
            subframe,
            detection,
            pixel_offset: Some(pixel),
            angular_offset: Some(angular),
            decision: self.gate.evaluate(ew, ns),
            telemetry: None,
        })
    }
}
