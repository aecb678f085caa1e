//! Telescope control drivers for the guider.
//!
//! This crate talks to the Hale Telescope Control System (TCS): it encodes
//! offset commands, parses telemetry replies, and manages the TCP session.
//! Each transport is feature-gated for optional compilation.
//!
//! # Features
//!
//! - `tcs` - TCP session with the live TCS
//! - `command-file` - Offline sink that writes commands to a text file

pub mod tcs;
pub mod tcs_interface;

pub use tcs_interface::TcsInterface;
