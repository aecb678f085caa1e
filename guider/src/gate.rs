//! Safety gate between computed corrections and the telescope

use hardware::tcs::TcsCommand;
use shared::image_proc::NoDetection;

/// What happened to the correction computed in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Correction is within bounds and should be transmitted
    Send(TcsCommand),
    /// At least one axis reached the safety bound; nothing was sent
    SkippedOutOfBound {
        ew_arcsec: f64,
        ns_arcsec: f64,
        bound_arcsec: f64,
    },
    /// No confident centroid; nothing was sent
    SkippedLowConfidence(NoDetection),
}

impl GateDecision {
    /// The command to transmit, if any
    pub fn command(&self) -> Option<&TcsCommand> {
        match self {
            GateDecision::Send(cmd) => Some(cmd),
            _ => None,
        }
    }

    /// Short label for logs and CSV output
    pub fn label(&self) -> &'static str {
        match self {
            GateDecision::Send(_) => "sent",
            GateDecision::SkippedOutOfBound { .. } => "out_of_bound",
            GateDecision::SkippedLowConfidence(_) => "low_confidence",
        }
    }
}

/// Per-axis magnitude limit on corrections.
///
/// A correction passes only when both `|EW|` and `|NS|` are strictly below
/// the bound. A large offset almost always means the centroid latched onto
/// the wrong source or a cosmic ray, and moving the telescope by it would
/// lose the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyGate {
    bound_arcsec: f64,
}

impl SafetyGate {
    pub fn new(bound_arcsec: f64) -> Self {
        Self { bound_arcsec }
    }

    pub fn bound_arcsec(&self) -> f64 {
        self.bound_arcsec
    }

    /// True when both axes are strictly inside the bound. Non-finite values never pass.
    pub fn permits(&self, ew_arcsec: f64, ns_arcsec: f64) -> bool {
        ew_arcsec.abs() < self.bound_arcsec && ns_arcsec.abs() < self.bound_arcsec
    }

    /// Decide whether an EW/NS correction may be sent.
    pub fn evaluate(&self, ew_arcsec: f64, ns_arcsec: f64) -> GateDecision {
        let out_of_bound = GateDecision::SkippedOutOfBound {
            ew_arcsec,
            ns_arcsec,
            bound_arcsec: self.bound_arcsec,
        };
        if !self.permits(ew_arcsec, ns_arcsec) {
            return out_of_bound;
        }
        // Only reachable with a bound above the TCS protocol range
        match TcsCommand::offset(ew_arcsec, ns_arcsec) {
            Ok(cmd) => GateDecision::Send(cmd),
            Err(_) => out_of_bound,
        }
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new(10.0)
    }
}
