//! Hale Telescope Control System (TCS) protocol
//!
//! The TCS accepts ASCII requests over a plain TCP socket (telnet style).
//!
//! # Requests
//!
//! Every request is a token terminated with a carriage return:
//!
//! | request            | reply                                   |
//! |--------------------|-----------------------------------------|
//! | `PT <ew> <ns> \r`  | none                                    |
//! | `REQPOS\r`         | three lines of position telemetry       |
//! | `NAME\r`           | one line with the current target name   |
//!
//! `PT` moves the telescope by `<ew>` arcsec East-West and `<ns>` arcsec
//! North-South. Each axis accepts at most ±6000 arcsec per move. Note the
//! space before the carriage return; the TCS expects it.
//!
//! # Replies
//!
//! Replies are newline-terminated lines:
//!
//! ```text
//! UTC = ddd hh:mm:ss.s, LST = hh:mm:ss.s
//! RA = hh:mm:ss.ss, DEC = [+/-]dd:mm:ss.s, HA = [W/E]hh:mm:ss.s
//! air mass = aa.aaa
//! NAME = <target>
//! ```

pub mod command;
#[cfg(feature = "command-file")]
pub mod command_file;
pub mod mock;
#[cfg(feature = "tcs")]
pub mod session;
pub mod telemetry;

use thiserror::Error;

pub use command::TcsCommand;
#[cfg(feature = "command-file")]
pub use command_file::{CommandFileSink, DEFAULT_COMMAND_FILE};
pub use mock::MockTcs;
#[cfg(feature = "tcs")]
pub use session::TcsSession;
pub use telemetry::{parse_name_reply, parse_position_reply, Telemetry, TelemetryParseError, TelescopePosition};

/// Errors that can occur while talking to the TCS.
#[derive(Error, Debug)]
pub enum TcsError {
    /// Low-level I/O error (socket read/write failure).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to establish the TCP connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation attempted before `connect` or after `disconnect`.
    #[error("Not connected to the TCS")]
    NotConnected,

    /// No reply received within the session timeout.
    #[error("Timeout waiting for reply")]
    Timeout,

    /// The TCS closed the connection mid-reply.
    #[error("Connection closed by the TCS")]
    ConnectionClosed,

    /// Command values the TCS would reject.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Telemetry reply did not have the expected format.
    #[error("Telemetry parse error: {0}")]
    Parse(#[from] TelemetryParseError),

    /// The backend cannot perform this request.
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
}

/// Result type for TCS operations.
pub type TcsResult<T> = Result<T, TcsError>;
