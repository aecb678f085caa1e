//! Configuration storage for the guider.
//!
//! Keeps the guide configuration in a fixed location so an observing session
//! can be restarted with the calibration of the previous night.
//! All config is stored in ~/.guider_config/ by default.

use std::path::{Path, PathBuf};

use crate::guide_config::{ConfigError, GuideConfig};

/// Configuration storage manager.
///
/// Manages loading and saving of guider configuration files from a
/// centralized directory (defaults to ~/.guider_config/).
#[derive(Debug, Clone)]
pub struct ConfigStorage {
    root_path: PathBuf,
}

impl ConfigStorage {
    /// Create a new config storage with default path (~/.guider_config)
    pub fn new() -> std::io::Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        Ok(Self {
            root_path: PathBuf::from(home).join(".guider_config"),
        })
    }

    /// Create a new config storage with custom root path
    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn guide_config_path(&self) -> PathBuf {
        self.root_path.join("guide_config.json")
    }

    /// Get the stored guide configuration.
    ///
    /// Returns None if no configuration has been saved.
    /// Returns Some(Err) if the file exists but cannot be loaded or is invalid.
    pub fn get_guide_config(&self) -> Option<Result<GuideConfig, ConfigError>> {
        let path = self.guide_config_path();

        if !path.exists() {
            return None;
        }

        Some(GuideConfig::load_from_file(&path))
    }

    /// Stored configuration, or the defaults when nothing has been saved.
    pub fn guide_config_or_default(&self) -> Result<GuideConfig, ConfigError> {
        self.get_guide_config()
            .unwrap_or_else(|| Ok(GuideConfig::default()))
    }

    /// Validate and save the guide configuration.
    ///
    /// Creates the config directory if it doesn't exist.
    /// Returns the path where the configuration was saved.
    pub fn save_guide_config(&self, config: &GuideConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        std::fs::create_dir_all(&self.root_path)?;

        let path = self.guide_config_path();
        config.save_to_file(&path)?;
        log::info!("Saved guide configuration to {}", path.display());
        Ok(path)
    }

    /// Delete the stored guide configuration.
    ///
    /// Returns Ok(true) if the file was deleted, Ok(false) if it didn't exist.
    pub fn delete_guide_config(&self) -> std::io::Result<bool> {
        let path = self.guide_config_path();

        if !path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(path)?;
        Ok(true)
    }
}

impl Default for ConfigStorage {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_path(PathBuf::from(".guider_config")))
    }
}
