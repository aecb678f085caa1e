//! CSV record of every guide cycle
//!
//! One row per completed cycle, written as the run progresses so a crashed
//! run still leaves a usable log. Fields that do not apply to a cycle (for
//! example offsets when no star was found) are left empty.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::gate::GateDecision;
use crate::pipeline::CycleReport;

const HEADER: [&str; 17] = [
    "cycle",
    "frame_width",
    "frame_height",
    "subframe_x0",
    "subframe_y0",
    "centroid_x",
    "centroid_y",
    "contrast",
    "dx_px",
    "dy_px",
    "dx_arcsec",
    "dy_arcsec",
    "ew_arcsec",
    "ns_arcsec",
    "decision",
    "target",
    "airmass",
];

/// Writes one CSV row per guide cycle.
pub struct CycleLog {
    writer: csv::Writer<Box<dyn Write>>,
}

impl CycleLog {
    /// Create (or truncate) a log file and write the header.
    pub fn create(path: &Path) -> Result<Self, csv::Error> {
        let file = File::create(path)?;
        Self::from_writer(file)
    }

    /// Log to any writer, e.g. stdout.
    pub fn from_writer(writer: impl Write + 'static) -> Result<Self, csv::Error> {
        let boxed: Box<dyn Write> = Box::new(writer);
        let mut writer = csv::Writer::from_writer(boxed);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    /// Append the row for one cycle and flush it.
    pub fn record(&mut self, cycle: u64, report: &CycleReport) -> Result<(), csv::Error> {
        let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();

        let centroid = report.detection.centroid();
        let (ew, ns) = match &report.decision {
            GateDecision::Send(cmd) => (Some(cmd.ew_arcsec()), Some(cmd.ns_arcsec())),
            GateDecision::SkippedOutOfBound {
                ew_arcsec, ns_arcsec, ..
            } => (Some(*ew_arcsec), Some(*ns_arcsec)),
            GateDecision::SkippedLowConfidence(_) => (None, None),
        };

        self.writer.write_record([
            cycle.to_string(),
            report.frame_size.width.to_string(),
            report.frame_size.height.to_string(),
            report.subframe.x0.to_string(),
            report.subframe.y0.to_string(),
            centroid.map(|c| c.x.to_string()).unwrap_or_default(),
            centroid.map(|c| c.y.to_string()).unwrap_or_default(),
            opt(centroid.map(|c| c.contrast)),
            opt(report.pixel_offset.map(|p| p.dx)),
            opt(report.pixel_offset.map(|p| p.dy)),
            opt(report.angular_offset.map(|a| a.dx_arcsec)),
            opt(report.angular_offset.map(|a| a.dy_arcsec)),
            opt(ew),
            opt(ns),
            report.decision.label().to_string(),
            report
                .telemetry
                .as_ref()
                .map(|t| t.target_name.clone())
                .unwrap_or_default(),
            opt(report.telemetry.as_ref().map(|t| t.position.airmass)),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}
