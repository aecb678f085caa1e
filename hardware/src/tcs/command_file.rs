//! Offline command output
//!
//! When guiding from archived frames there is no telescope to move. The sink
//! writes the most recent `PT` command to a text file instead, overwriting
//! the previous one, so the operator can forward it by hand.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{TcsCommand, TcsError, TcsResult, Telemetry};
use crate::tcs_interface::TcsInterface;

/// Default file name used by the offline guider.
pub const DEFAULT_COMMAND_FILE: &str = "guide_to_TCS.txt";

/// Writes each command to a local file in place of the TCS.
#[derive(Debug, Clone)]
pub struct CommandFileSink {
    path: PathBuf,
    commands_written: u64,
}

impl CommandFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            commands_written: 0,
        }
    }

    /// Sink writing [`DEFAULT_COMMAND_FILE`] inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DEFAULT_COMMAND_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commands_written(&self) -> u64 {
        self.commands_written
    }

    /// Replace the file contents with the wire form of `command`.
    pub fn write(&mut self, command: &TcsCommand) -> TcsResult<()> {
        std::fs::write(&self.path, command.to_wire())?;
        self.commands_written += 1;
        debug!("Wrote {} to {}", command, self.path.display());
        Ok(())
    }
}

impl TcsInterface for CommandFileSink {
    fn connect(&mut self) -> TcsResult<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.is_dir() {
            return Err(TcsError::ConnectionFailed(format!(
                "{} is not a directory",
                parent.display()
            )));
        }
        info!("Writing guide commands to {}", self.path.display());
        Ok(())
    }

    fn send_command(&mut self, command: &TcsCommand) -> TcsResult<()> {
        self.write(command)
    }

    fn telemetry(&mut self) -> TcsResult<Telemetry> {
        Err(TcsError::Unsupported("telemetry"))
    }

    fn disconnect(&mut self) {}

    fn name(&self) -> String {
        format!("command file {}", self.path.display())
    }
}
