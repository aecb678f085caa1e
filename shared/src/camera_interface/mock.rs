use std::collections::VecDeque;

use ndarray::Array2;

use super::{CameraError, CameraResult, FrameSource};

/// Scripted frame source for tests and offline simulation.
///
/// Serves queued outcomes in order, then repeats the configured frame (if
/// any) or reports [`CameraError::Exhausted`].
pub struct MockFrameSource {
    outcomes: VecDeque<CameraResult<Array2<u16>>>,
    repeat: Option<Array2<u16>>,
    connect_failures: usize,
    connected: bool,
    connect_calls: usize,
    disconnect_calls: usize,
    frames_served: usize,
}

impl MockFrameSource {
    pub fn new(frames: Vec<Array2<u16>>) -> Self {
        Self::from_outcomes(frames.into_iter().map(Ok).collect())
    }

    /// Serve the same frame forever
    pub fn new_repeating(frame: Array2<u16>) -> Self {
        let mut mock = Self::new(Vec::new());
        mock.repeat = Some(frame);
        mock
    }

    /// Serve a scripted mix of frames and capture errors
    pub fn from_outcomes(outcomes: Vec<CameraResult<Array2<u16>>>) -> Self {
        Self {
            outcomes: outcomes.into(),
            repeat: None,
            connect_failures: 0,
            connected: false,
            connect_calls: 0,
            disconnect_calls: 0,
            frames_served: 0,
        }
    }

    /// Fail the first `count` connection attempts.
    pub fn with_connect_failures(mut self, count: usize) -> Self {
        self.connect_failures = count;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls
    }

    pub fn frames_served(&self) -> usize {
        self.frames_served
    }
}

impl FrameSource for MockFrameSource {
    fn connect(&mut self) -> CameraResult<()> {
        self.connect_calls += 1;
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(CameraError::ConnectionFailed("mock camera offline".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> CameraResult<Array2<u16>> {
        if !self.connected {
            return Err(CameraError::NotConnected);
        }

        let outcome = match self.outcomes.pop_front() {
            Some(outcome) => outcome,
            None => match &self.repeat {
                Some(frame) => Ok(frame.clone()),
                None => Err(CameraError::Exhausted),
            },
        };
        if outcome.is_ok() {
            self.frames_served += 1;
        }
        outcome
    }

    fn disconnect(&mut self) -> CameraResult<()> {
        self.disconnect_calls += 1;
        self.connected = false;
        Ok(())
    }

    fn name(&self) -> String {
        "mock camera".to_string()
    }
}
