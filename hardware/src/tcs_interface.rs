//! TCS interface trait for the guide loop.

use crate::tcs::{TcsCommand, TcsResult, Telemetry};

/// Interface for telescope control
///
/// Abstracts the TCS connection so the guide loop can run against the live
/// telescope, an offline command file, or a test double.
pub trait TcsInterface {
    /// Open the connection. Not retried by implementations.
    fn connect(&mut self) -> TcsResult<()>;

    /// Transmit a validated offset command.
    fn send_command(&mut self, command: &TcsCommand) -> TcsResult<()>;

    /// Fetch current telescope position and target name.
    fn telemetry(&mut self) -> TcsResult<Telemetry>;

    /// Close the connection. Never fails; safe to call repeatedly.
    fn disconnect(&mut self);

    /// Short human-readable description for log messages
    fn name(&self) -> String;
}

#[cfg(feature = "tcs")]
impl TcsInterface for crate::tcs::TcsSession {
    fn connect(&mut self) -> TcsResult<()> {
        crate::tcs::TcsSession::connect(self)
    }

    fn send_command(&mut self, command: &TcsCommand) -> TcsResult<()> {
        crate::tcs::TcsSession::send_command(self, command)
    }

    fn telemetry(&mut self) -> TcsResult<Telemetry> {
        self.get_telemetry()
    }

    fn disconnect(&mut self) {
        crate::tcs::TcsSession::disconnect(self)
    }

    fn name(&self) -> String {
        format!("TCS at {}", self.config().address())
    }
}

impl<T: TcsInterface + ?Sized> TcsInterface for Box<T> {
    fn connect(&mut self) -> TcsResult<()> {
        (**self).connect()
    }

    fn send_command(&mut self, command: &TcsCommand) -> TcsResult<()> {
        (**self).send_command(command)
    }

    fn telemetry(&mut self) -> TcsResult<Telemetry> {
        (**self).telemetry()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}
