//! Frame sources for the guide loop
//!
//! The loop only needs three things from a camera: open it, pull the next
//! frame, and close it. [`FrameSource`] abstracts that so the loop can be
//! driven by real hardware, by a directory another process writes images
//! into, or by scripted frames in tests.

pub mod mock;
#[cfg(feature = "watch-dir")]
pub mod watch_dir;

use std::time::Duration;

use ndarray::Array2;
use thiserror::Error;

pub use mock::MockFrameSource;
#[cfg(feature = "watch-dir")]
pub use watch_dir::{load_frame, DirectoryFrameSource};

/// Error type for frame source operations
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Frame source is not connected")]
    NotConnected,

    #[error("No frame arrived within {0:?}")]
    Timeout(Duration),

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("Frame source exhausted")]
    Exhausted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CameraError {
    /// True for failures that only cost the current cycle.
    ///
    /// The guide loop skips the cycle and tries again on a transient error,
    /// and stops on any other.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CameraError::Timeout(_) | CameraError::CaptureError(_) | CameraError::Decode { .. }
        )
    }
}

/// Result type for frame source operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Trait for anything that delivers guide frames.
///
/// Frames are `(rows, columns)` arrays of raw detector counts.
pub trait FrameSource {
    /// Open the source. Called once before the first frame.
    fn connect(&mut self) -> CameraResult<()>;

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> CameraResult<Array2<u16>>;

    /// Release the source. Safe to call when not connected.
    fn disconnect(&mut self) -> CameraResult<()>;

    /// Short human-readable description for log messages
    fn name(&self) -> String;
}

impl<F: FrameSource + ?Sized> FrameSource for Box<F> {
    fn connect(&mut self) -> CameraResult<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> CameraResult<Array2<u16>> {
        (**self).next_frame()
    }

    fn disconnect(&mut self) -> CameraResult<()> {
        (**self).disconnect()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CameraError::Timeout(Duration::from_millis(5)).is_transient());
        assert!(CameraError::CaptureError("dropped".into()).is_transient());
        assert!(CameraError::Decode {
            path: "a.tif".into(),
            reason: "truncated".into()
        }
        .is_transient());

        assert!(!CameraError::ConnectionFailed("no device".into()).is_transient());
        assert!(!CameraError::NotConnected.is_transient());
        assert!(!CameraError::Exhausted.is_transient());
    }
}
