//! Guide loop state machine
//!
//! Runs repeated guide cycles against a frame source and a TCS backend:
//! Idle -> Connecting -> Running -> (Stopping | Failed) -> Disconnected
//!
//! Teardown of both collaborators happens exactly once per run on every exit
//! path, including a panic inside a cycle.

use std::fmt;

use hardware::TcsInterface;
use serde::{Deserialize, Serialize};
use shared::camera_interface::{CameraError, FrameSource};
use shared::guide_config::GuideConfig;

use crate::cycle_log::CycleLog;
use crate::error::{GuideError, GuideResult};
use crate::gate::GateDecision;
use crate::pipeline::{CycleReport, GuidePipeline};
use crate::stop::StopSignal;

/// Guide loop states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuideState {
    /// Constructed, not yet started
    Idle,
    /// Opening the camera and the TCS session
    Connecting,
    /// Guiding
    Running { cycles_completed: u64 },
    /// Stop requested or run complete; teardown pending
    Stopping,
    /// Unrecoverable error; teardown pending
    Failed { reason: String },
    /// Camera and TCS released
    Disconnected,
}

/// Events that trigger state transitions
#[derive(Debug)]
enum GuideEvent {
    Start,
    Connected,
    ConnectFailed(String),
    CycleDone,
    Stop,
    Fatal(String),
    TornDown,
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The stop signal was raised
    StopRequested,
    /// `max_cycles` cycles completed
    MaxCycles,
    /// The frame source has no more frames
    SourceExhausted,
    /// Connection or cycle error
    Failed(String),
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub cycles_completed: u64,
    pub commands_sent: u64,
    pub skipped_out_of_bound: u64,
    pub skipped_low_confidence: u64,
    /// Transient capture errors; these cycles were skipped
    pub capture_failures: u64,
    pub telemetry_failures: u64,
    /// Rows that could not be written to the cycle log
    pub cycle_log_failures: u64,
    pub stop_reason: Option<StopReason>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycles, {} commands sent, {} out of bound, {} low confidence, {} capture failures",
            self.cycles_completed,
            self.commands_sent,
            self.skipped_out_of_bound,
            self.skipped_low_confidence,
            self.capture_failures
        )?;
        if self.telemetry_failures > 0 {
            write!(f, ", {} telemetry failures", self.telemetry_failures)?;
        }
        if self.cycle_log_failures > 0 {
            write!(f, ", {} cycle log failures", self.cycle_log_failures)?;
        }
        Ok(())
    }
}

/// Closed-loop guider.
pub struct GuideLoop<C, T> {
    config: GuideConfig,
    pipeline: GuidePipeline,
    camera: C,
    tcs: T,
    camera_connected: bool,
    stop: StopSignal,
    state: GuideState,
    summary: RunSummary,
    cycle_log: Option<CycleLog>,
    last_report: Option<CycleReport>,
}

/// Releases camera and TCS when dropped, including during unwinding.
struct Teardown<'a, C: FrameSource, T: TcsInterface> {
    guide: &'a mut GuideLoop<C, T>,
}

impl<C: FrameSource, T: TcsInterface> Drop for Teardown<'_, C, T> {
    fn drop(&mut self) {
        self.guide.teardown();
    }
}

impl<C: FrameSource, T: TcsInterface> GuideLoop<C, T> {
    /// Create a guide loop. The configuration is validated here.
    pub fn new(config: GuideConfig, camera: C, tcs: T) -> GuideResult<Self> {
        config.validate()?;
        let pipeline = GuidePipeline::from_config(&config);
        log::info!(
            "Guide loop configured: plate scale {:.6} arcsec/px, safety bound {} arcsec",
            pipeline.plate_scale().arcsec_per_pixel,
            config.safety_bound_arcsec
        );

        Ok(Self {
            config,
            pipeline,
            camera,
            tcs,
            camera_connected: false,
            stop: StopSignal::new(),
            state: GuideState::Idle,
            summary: RunSummary::default(),
            cycle_log: None,
            last_report: None,
        })
    }

    /// Record every cycle to a CSV log.
    pub fn with_cycle_log(mut self, log: CycleLog) -> Self {
        self.cycle_log = Some(log);
        self
    }

    /// Use an existing stop signal instead of a private one.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Handle for stopping the loop from elsewhere.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Get the current state
    pub fn state(&self) -> &GuideState {
        &self.state
    }

    /// Counters of the current or most recent run
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }

    pub fn config(&self) -> &GuideConfig {
        &self.config
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn tcs(&self) -> &T {
        &self.tcs
    }

    pub fn into_parts(self) -> (C, T) {
        (self.camera, self.tcs)
    }

    /// Connect, guide until stopped or failed, then release everything.
    ///
    /// Blocks the calling thread. A stop request is honoured between cycles;
    /// a cycle that has started always completes. A run can be started again
    /// once the previous one has ended.
    ///
    /// # Errors
    ///
    /// Connection failures (after all configured attempts) and unrecoverable
    /// cycle errors. Transient capture errors only skip their cycle.
    pub fn run(&mut self) -> GuideResult<RunSummary> {
        match self.state {
            GuideState::Idle | GuideState::Disconnected => {}
            ref other => return Err(GuideError::InvalidState(other.clone())),
        }

        self.summary = RunSummary::default();
        self.last_report = None;
        self.transition(GuideEvent::Start);

        let result = {
            let mut guard = Teardown { guide: &mut *self };
            guard.guide.connect_and_guide()
        };

        match &result {
            Ok(()) => log::info!("Guiding session complete: {}", self.summary),
            Err(e) => log::error!("Guiding session failed after {}: {e}", self.summary),
        }
        result.map(|()| self.summary.clone())
    }

    fn connect_and_guide(&mut self) -> GuideResult<()> {
        if self.connect_with_retry()? {
            self.run_cycles()
        } else {
            Ok(())
        }
    }

    /// Returns false if a stop was requested while waiting to retry.
    fn connect_with_retry(&mut self) -> GuideResult<bool> {
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.connect_once() {
                Ok(()) => {
                    self.transition(GuideEvent::Connected);
                    return Ok(true);
                }
                Err(e) if attempt < attempts => {
                    log::warn!("Connection attempt {attempt}/{attempts} failed: {e}");
                    attempt += 1;
                    if self.stop.sleep(self.config.connect_retry_delay()) {
                        self.finish(StopReason::StopRequested);
                        return Ok(false);
                    }
                }
                Err(e) => {
                    self.summary.stop_reason = Some(StopReason::Failed(e.to_string()));
                    self.transition(GuideEvent::ConnectFailed(e.to_string()));
                    return Err(e);
                }
            }
        }
    }

    fn connect_once(&mut self) -> GuideResult<()> {
        if !self.camera_connected {
            self.camera.connect()?;
            self.camera_connected = true;
            log::info!("Connected to {}", self.camera.name());
        }
        self.tcs.connect()?;
        log::info!("Connected to {}", self.tcs.name());
        Ok(())
    }

    fn run_cycles(&mut self) -> GuideResult<()> {
        loop {
            if self.stop.is_stop_requested() {
                self.finish(StopReason::StopRequested);
                return Ok(());
            }

            match self.cycle() {
                Ok(()) => {}
                Err(GuideError::Camera(e)) if e.is_transient() => {
                    self.summary.capture_failures += 1;
                    log::warn!("Skipping cycle, capture failed: {e}");
                }
                Err(GuideError::Camera(CameraError::Exhausted)) => {
                    log::info!("{} has no more frames", self.camera.name());
                    self.finish(StopReason::SourceExhausted);
                    return Ok(());
                }
                Err(e) => {
                    self.summary.stop_reason = Some(StopReason::Failed(e.to_string()));
                    self.transition(GuideEvent::Fatal(e.to_string()));
                    return Err(e);
                }
            }

            if let Some(max) = self.config.max_cycles {
                if self.summary.cycles_completed >= max {
                    self.finish(StopReason::MaxCycles);
                    return Ok(());
                }
            }

            if self.stop.sleep(self.config.interval()) {
                self.finish(StopReason::StopRequested);
                return Ok(());
            }
        }
    }

    /// One guide cycle: acquire, process, gate and send, then optional
    /// telemetry and logging.
    fn cycle(&mut self) -> GuideResult<()> {
        let cycle = self.summary.cycles_completed;
        let frame = self.camera.next_frame()?;
        let mut report = self.pipeline.process(&frame.view())?;

        match &report.decision {
            GateDecision::Send(cmd) => {
                self.tcs.send_command(cmd)?;
                self.summary.commands_sent += 1;
                log::info!("Cycle {cycle}: sent {cmd}");
            }
            GateDecision::SkippedOutOfBound {
                ew_arcsec,
                ns_arcsec,
                bound_arcsec,
            } => {
                self.summary.skipped_out_of_bound += 1;
                log::warn!(
                    "Cycle {cycle}: offset EW {ew_arcsec:.3} NS {ns_arcsec:.3} arcsec is not below {bound_arcsec} arcsec, command not sent"
                );
            }
            GateDecision::SkippedLowConfidence(reason) => {
                self.summary.skipped_low_confidence += 1;
                log::warn!("Cycle {cycle}: no confident centroid ({reason:?}), command not sent");
            }
        }

        if self.config.fetch_telemetry {
            match self.tcs.telemetry() {
                Ok(telemetry) => report.telemetry = Some(telemetry),
                Err(e) => {
                    self.summary.telemetry_failures += 1;
                    log::warn!("Cycle {cycle}: telemetry unavailable: {e}");
                }
            }
        }

        if let Some(log) = self.cycle_log.as_mut() {
            if let Err(e) = log.record(cycle, &report) {
                self.summary.cycle_log_failures += 1;
                log::warn!("Cycle {cycle}: could not write cycle log: {e}");
            }
        }

        self.summary.cycles_completed += 1;
        self.last_report = Some(report);
        self.transition(GuideEvent::CycleDone);
        Ok(())
    }

    fn finish(&mut self, reason: StopReason) {
        self.summary.stop_reason = Some(reason);
        self.transition(GuideEvent::Stop);
    }

    fn teardown(&mut self) {
        if let Err(e) = self.camera.disconnect() {
            log::warn!("Error disconnecting {}: {e}", self.camera.name());
        }
        self.camera_connected = false;
        self.tcs.disconnect();
        self.transition(GuideEvent::TornDown);
    }

    /// Process an event and transition states
    fn transition(&mut self, event: GuideEvent) {
        use GuideState::*;

        let new_state = match (&self.state, event) {
            (Idle | Disconnected, GuideEvent::Start) => {
                log::info!("Starting guide loop, connecting");
                Connecting
            }

            (Connecting, GuideEvent::Connected) => {
                log::info!("Connected, entering Running state");
                Running {
                    cycles_completed: 0,
                }
            }
            (Connecting, GuideEvent::ConnectFailed(reason)) => {
                log::error!("Connection failed: {reason}");
                Failed { reason }
            }

            (Running { cycles_completed }, GuideEvent::CycleDone) => Running {
                cycles_completed: cycles_completed + 1,
            },
            (Running { .. }, GuideEvent::Fatal(reason)) => Failed { reason },
            (Connecting | Running { .. }, GuideEvent::Stop) => {
                log::info!("Stopping guide loop");
                Stopping
            }

            (Stopping | Failed { .. }, GuideEvent::TornDown) => {
                log::info!("Camera and TCS released");
                Disconnected
            }
            (state, GuideEvent::TornDown) => {
                log::warn!("Run interrupted in state {state:?}, camera and TCS released");
                Disconnected
            }

            // Invalid transitions
            (state, event) => {
                log::warn!("Invalid guide loop transition from {state:?} on {event:?}");
                self.state.clone()
            }
        };

        self.state = new_state;
    }
}
