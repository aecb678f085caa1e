//! Shared components for the telescope guider.
//!
//! This crate holds the pieces of the guiding pipeline that do not talk to the
//! telescope: frame sources, subframe extraction, centroiding, offset and
//! plate-scale math, and the validated guider configuration.

pub mod camera_interface;
#[cfg(feature = "config-storage")]
pub mod config_storage;
pub mod guide_config;
pub mod image_proc;
pub mod image_size;
pub mod optics;
pub mod test_util;
