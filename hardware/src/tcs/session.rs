//! TCP session with the TCS
//!
//! A [`TcsSession`] holds one long-lived socket for a whole guiding run.
//! Connection failures are reported once and never retried here; retry
//! policy belongs to the caller.
//!
//! # Example
//!
//! ```no_run
//! use hardware::tcs::{TcsCommand, TcsSession};
//! use shared::guide_config::TcsConfig;
//!
//! let mut session = TcsSession::new(TcsConfig::default());
//! session.connect()?;
//!
//! let telemetry = session.get_telemetry()?;
//! println!("Guiding on {}", telemetry.target_name);
//!
//! session.send_command(&TcsCommand::offset(0.5, -0.25)?)?;
//! session.disconnect();
//! # Ok::<(), hardware::tcs::TcsError>(())
//! ```

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use shared::guide_config::TcsConfig;
use tracing::{debug, trace, warn};

use super::telemetry::{parse_name_reply, parse_position_reply, Telemetry};
use super::{TcsCommand, TcsError, TcsResult};

/// Position request token
const REQPOS: &str = "REQPOS";
/// Target name request token
const NAME: &str = "NAME";
/// Lines in a `REQPOS` reply
const REQPOS_LINES: usize = 3;

/// Connection to the telescope control system.
pub struct TcsSession {
    config: TcsConfig,
    stream: Option<TcpStream>,
}

impl TcsSession {
    /// Create an unconnected session for the given endpoint.
    pub fn new(config: TcsConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    pub fn config(&self) -> &TcsConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the TCP connection.
    ///
    /// Every resolved address is tried with the configured timeout. Calling
    /// this on a connected session does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`TcsError::ConnectionFailed`] if no address accepts the connection.
    pub fn connect(&mut self) -> TcsResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let address = self.config.address();
        let timeout = self.config.timeout();
        let addrs = address
            .to_socket_addrs()
            .map_err(|e| TcsError::ConnectionFailed(format!("Cannot resolve {address}: {e}")))?;

        let mut last_error = format!("{address} resolved to no addresses");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    debug!("Connected to TCS at {addr}");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    trace!("TCS connect to {addr} failed: {e}");
                    last_error = format!("Failed to connect to {addr}: {e}");
                }
            }
        }

        Err(TcsError::ConnectionFailed(last_error))
    }

    fn stream(&mut self) -> TcsResult<&mut TcpStream> {
        self.stream.as_mut().ok_or(TcsError::NotConnected)
    }

    /// Write raw bytes to the TCS. No terminator is added.
    pub fn send(&mut self, raw: &str) -> TcsResult<()> {
        debug!("TCS send: {:?}", raw);
        let stream = self.stream()?;
        stream.write_all(raw.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    /// Send a `PT` offset command. The TCS does not reply to it.
    pub fn send_command(&mut self, command: &TcsCommand) -> TcsResult<()> {
        self.send(&command.to_wire())
    }

    /// Read one newline-terminated reply line, without its terminator.
    fn read_line(&mut self) -> TcsResult<String> {
        let stream = self.stream()?;
        let mut buf = [0u8; 1];
        let mut bytes = Vec::new();

        loop {
            match stream.read(&mut buf) {
                Ok(0) => return Err(TcsError::ConnectionClosed),
                Ok(_) => {
                    if buf[0] == b'\n' {
                        break;
                    }
                    bytes.push(buf[0]);
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    return Err(TcsError::Timeout);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        // TCS replies are ASCII; map bytes directly so stray high bytes still parse
        let line: String = bytes.iter().map(|&b| b as char).collect();
        trace!("TCS recv: {:?}", line);
        Ok(line)
    }

    /// Discard reply bytes left over from an earlier request, so a reply
    /// with extra lines cannot shift every later one.
    fn discard_pending(&mut self) -> TcsResult<()> {
        let stream = self.stream()?;
        stream.set_nonblocking(true)?;

        let mut buf = [0u8; 256];
        let mut discarded = 0;
        let result = loop {
            match stream.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => discarded += n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        stream.set_nonblocking(false)?;
        result?;

        if discarded > 0 {
            warn!("Discarded {discarded} unexpected bytes from the TCS");
        }
        Ok(())
    }

    /// Send a request token and collect a fixed number of reply lines.
    fn request(&mut self, token: &str, lines: usize) -> TcsResult<String> {
        self.discard_pending()?;
        self.send(&format!("{token}\r"))?;
        let mut reply = String::new();
        for _ in 0..lines {
            reply.push_str(&self.read_line()?);
            reply.push('\n');
        }
        Ok(reply)
    }

    /// Request telescope position and target name.
    ///
    /// # Errors
    ///
    /// Returns [`TcsError::Parse`] if either reply deviates from the expected format.
    pub fn get_telemetry(&mut self) -> TcsResult<Telemetry> {
        let position_reply = self.request(REQPOS, REQPOS_LINES)?;
        let name_reply = self.request(NAME, 1)?;

        Ok(Telemetry {
            position: parse_position_reply(&position_reply)?,
            target_name: parse_name_reply(&name_reply)?,
        })
    }

    /// Close the connection. Safe to call any number of times; a failed close
    /// is logged, not returned.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => debug!("Disconnected from TCS"),
                Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {
                    debug!("TCS connection already closed by peer")
                }
                Err(e) => warn!("Error closing TCS connection: {e}"),
            }
        }
    }
}

impl Drop for TcsSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
