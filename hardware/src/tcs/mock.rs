use std::collections::VecDeque;

use super::{TcsCommand, TcsError, TcsResult, Telemetry, TelescopePosition};
use crate::tcs_interface::TcsInterface;

/// In-memory TCS double that records every command it receives.
#[derive(Debug, Default)]
pub struct MockTcs {
    connected: bool,
    connect_failures: usize,
    connect_calls: usize,
    disconnect_calls: usize,
    sent: Vec<TcsCommand>,
    send_failures: VecDeque<usize>,
    telemetry: Option<Telemetry>,
}

impl MockTcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `count` connection attempts.
    pub fn with_connect_failures(mut self, count: usize) -> Self {
        self.connect_failures = count;
        self
    }

    /// Fail the send with this zero-based index.
    pub fn with_send_failure_at(mut self, index: usize) -> Self {
        self.send_failures.push_back(index);
        self
    }

    /// Answer telemetry requests with this record.
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
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

    /// Commands accepted so far, in order
    pub fn sent(&self) -> &[TcsCommand] {
        &self.sent
    }

    /// Wire text of every accepted command
    pub fn sent_wire(&self) -> Vec<String> {
        self.sent.iter().map(TcsCommand::to_wire).collect()
    }

    /// A plausible telemetry record for tests.
    pub fn sample_telemetry() -> Telemetry {
        Telemetry {
            position: TelescopePosition {
                utc: "123 04:05:06.7".to_string(),
                lst: "08:09:10.1".to_string(),
                ra: "12:34:56.78".to_string(),
                dec: "+12:34:56.7".to_string(),
                ha: "W01:02:03.4".to_string(),
                airmass: 1.234,
            },
            target_name: "HD 189733".to_string(),
        }
    }
}

impl TcsInterface for MockTcs {
    fn connect(&mut self) -> TcsResult<()> {
        self.connect_calls += 1;
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(TcsError::ConnectionFailed("mock TCS unreachable".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    fn send_command(&mut self, command: &TcsCommand) -> TcsResult<()> {
        if !self.connected {
            return Err(TcsError::NotConnected);
        }
        let attempt = self.sent.len();
        if self.send_failures.front() == Some(&attempt) {
            self.send_failures.pop_front();
            return Err(TcsError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock link dropped",
            )));
        }
        self.sent.push(*command);
        Ok(())
    }

    fn telemetry(&mut self) -> TcsResult<Telemetry> {
        if !self.connected {
            return Err(TcsError::NotConnected);
        }
        self.telemetry.clone().ok_or(TcsError::Unsupported("telemetry"))
    }

    fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
    }

    fn name(&self) -> String {
        "mock TCS".to_string()
    }
}
