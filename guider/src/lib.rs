//! Closed-loop guider for the Hale telescope prime focus guide camera.
//!
//! Each guide cycle takes a frame, crops the subframe, finds the guide star,
//! converts its offset from the reference position into arcseconds, and sends
//! a `PT` correction to the telescope when it passes the safety gate:
//!
//! frame -> subframe -> centroid -> pixel offset -> arcsec -> gate -> TCS

pub mod cycle_log;
pub mod error;
pub mod gate;
pub mod guide_loop;
pub mod pipeline;
pub mod stop;

pub use cycle_log::CycleLog;
pub use error::{GuideError, GuideResult};
pub use gate::{GateDecision, SafetyGate};
pub use guide_loop::{GuideLoop, GuideState, RunSummary, StopReason};
pub use pipeline::{CycleReport, GuidePipeline};
pub use stop::StopSignal;
