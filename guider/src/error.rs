use hardware::tcs::TcsError;
use shared::camera_interface::CameraError;
use shared::guide_config::ConfigError;
use shared::image_proc::SubframeError;
use thiserror::Error;

use crate::guide_loop::GuideState;

/// Errors that end a guiding run.
#[derive(Error, Debug)]
pub enum GuideError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("TCS error: {0}")]
    Tcs(#[from] TcsError),

    #[error("Subframe error: {0}")]
    Subframe(#[from] SubframeError),

    #[error("Cycle log error: {0}")]
    CycleLog(#[from] csv::Error),

    #[error("Cannot start a run from state {0:?}")]
    InvalidState(GuideState),
}

pub type GuideResult<T> = Result<T, GuideError>;
