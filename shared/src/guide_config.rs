//! Guide loop configuration.
//!
//! Every tunable of the guider lives in one [`GuideConfig`], which is
//! deserialized from JSON with per-field defaults and checked with
//! [`GuideConfig::validate`] before any component is built from it.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image_proc::{CentroidConfig, ReferencePosition, SubframeSpec};
use crate::optics::{AxisMapping, OpticalTrain};

/// Largest per-axis offset the TCS accepts in a single `PT` move.
pub const TCS_MAX_OFFSET_ARCSEC: f64 = 6000.0;

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Network endpoint of the telescope control system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TcsConfig {
    pub host: String,
    pub port: u16,
    /// Connect and read/write timeout in milliseconds
    pub timeout_ms: u64,
}

impl TcsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `host:port` string for socket address resolution
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("tcs.host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid("tcs.port", "must not be 0"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("tcs.timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

impl Default for TcsConfig {
    fn default() -> Self {
        Self {
            host: "10.200.99.2".to_string(),
            port: 49200,
            timeout_ms: 100_000,
        }
    }
}

/// Complete guider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuideConfig {
    pub tcs: TcsConfig,
    /// Target star position relative to the subframe center
    pub reference: ReferencePosition,
    pub subframe: SubframeSpec,
    pub optics: OpticalTrain,
    pub axis_mapping: AxisMapping,
    pub centroid: CentroidConfig,
    /// Commands with either axis at or above this magnitude are not sent
    pub safety_bound_arcsec: f64,
    /// Pause between guide cycles in milliseconds
    pub interval_ms: u64,
    /// Request telescope position and target name every cycle
    pub fetch_telemetry: bool,
    /// Number of connection attempts before the loop gives up
    pub connect_attempts: u32,
    pub connect_retry_delay_ms: u64,
    /// Stop after this many cycles; run until stopped if unset
    pub max_cycles: Option<u64>,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            tcs: TcsConfig::default(),
            reference: ReferencePosition::default(),
            subframe: SubframeSpec::default(),
            optics: OpticalTrain::default(),
            axis_mapping: AxisMapping::default(),
            centroid: CentroidConfig::default(),
            safety_bound_arcsec: 10.0,
            interval_ms: 0,
            fetch_telemetry: false,
            connect_attempts: 1,
            connect_retry_delay_ms: 1000,
            max_cycles: None,
        }
    }
}

impl GuideConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }

    /// Check every field for values the guide loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tcs.validate()?;
        self.optics.validate()?;
        self.axis_mapping.validate()?;

        if !(self.reference.x.is_finite() && self.reference.y.is_finite()) {
            return Err(ConfigError::invalid("reference", "must be finite"));
        }

        match self.subframe {
            SubframeSpec::Centered { size } if size < 2 => {
                return Err(ConfigError::invalid(
                    "subframe.size",
                    format!("must be at least 2, got {size}"),
                ));
            }
            _ => {}
        }

        let c = &self.centroid;
        if c.kernel_length == 0 {
            return Err(ConfigError::invalid("centroid.kernel_length", "must be positive"));
        }
        if !(c.kernel_sigma.is_finite() && c.kernel_sigma > 0.0) {
            return Err(ConfigError::invalid(
                "centroid.kernel_sigma",
                format!("must be a positive number, got {}", c.kernel_sigma),
            ));
        }
        if c.background_start >= c.background_end {
            return Err(ConfigError::invalid(
                "centroid.background_start",
                format!(
                    "must be below background_end ({} >= {})",
                    c.background_start, c.background_end
                ),
            ));
        }
        if !c.min_contrast.is_finite() {
            return Err(ConfigError::invalid("centroid.min_contrast", "must be finite"));
        }

        if !(self.safety_bound_arcsec > 0.0 && self.safety_bound_arcsec <= TCS_MAX_OFFSET_ARCSEC) {
            return Err(ConfigError::invalid(
                "safety_bound_arcsec",
                format!(
                    "must be in (0, {TCS_MAX_OFFSET_ARCSEC}], got {}",
                    self.safety_bound_arcsec
                ),
            ));
        }

        if self.connect_attempts == 0 {
            return Err(ConfigError::invalid("connect_attempts", "must be at least 1"));
        }
        if self.max_cycles == Some(0) {
            return Err(ConfigError::invalid("max_cycles", "must be at least 1 when set"));
        }

        Ok(())
    }

    /// Save as pretty-printed JSON
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from a JSON file and validate. Missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: GuideConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_proc::SubframeBox;
    use crate::optics::RELAY_150_100;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = GuideConfig::default();
        assert_eq!(config.tcs.address(), "10.200.99.2:49200");
        assert_eq!(config.tcs.timeout(), Duration::from_secs(100));
        assert_eq!(config.subframe, SubframeSpec::Centered { size: 1500 });
        assert_eq!(config.safety_bound_arcsec, 10.0);
        assert_eq!(config.connect_attempts, 1);
        assert!(config.max_cycles.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: GuideConfig = serde_json::from_str(
            r#"{
                "tcs": {"host": "localhost"},
                "optics": {"relay_magnification": 1.5},
                "safety_bound_arcsec": 5.0
            }"#,
        )
        .unwrap();

        assert_eq!(config.tcs.host, "localhost");
        assert_eq!(config.tcs.port, 49200);
        assert_eq!(config.optics.relay_magnification, RELAY_150_100);
        assert_eq!(config.optics.pixel_pitch_um, 3.45);
        assert_eq!(config.safety_bound_arcsec, 5.0);
        assert_eq!(config.centroid.kernel_length, 70);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.json");

        let config = GuideConfig {
            subframe: SubframeSpec::Box(SubframeBox::new(100, 400, 50, 350).unwrap()),
            max_cycles: Some(25),
            fetch_telemetry: true,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = GuideConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.json");
        std::fs::write(&path, r#"{"safety_bound_arcsec": 7000.0}"#).unwrap();

        match GuideConfig::load_from_file(&path) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "safety_bound_arcsec"),
            other => panic!("expected invalid field, got {other:?}"),
        }
    }

    #[test]
    fn test_load_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            GuideConfig::load_from_file(&path),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_misspelled_keys_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.json");

        for json in [
            r#"{"safety_bound_arcsecs": 2.0}"#,
            r#"{"tcs": {"hostname": "localhost"}}"#,
            r#"{"optics": {"focal_length": 16760.0}}"#,
            r#"{"axis_mapping": {"ew_sing": -1.0}}"#,
            r#"{"centroid": {"kernel_len": 50}}"#,
            r#"{"reference": {"x": 1.0, "z": 2.0}}"#,
        ] {
            std::fs::write(&path, json).unwrap();
            assert!(
                matches!(GuideConfig::load_from_file(&path), Err(ConfigError::Json(_))),
                "accepted {json}"
            );
        }
    }

    #[test]
    fn test_validation_failures() {
        let cases: Vec<(GuideConfig, &str)> = vec![
            (
                GuideConfig {
                    safety_bound_arcsec: 0.0,
                    ..Default::default()
                },
                "safety_bound_arcsec",
            ),
            (
                GuideConfig {
                    safety_bound_arcsec: f64::NAN,
                    ..Default::default()
                },
                "safety_bound_arcsec",
            ),
            (
                GuideConfig {
                    connect_attempts: 0,
                    ..Default::default()
                },
                "connect_attempts",
            ),
            (
                GuideConfig {
                    max_cycles: Some(0),
                    ..Default::default()
                },
                "max_cycles",
            ),
            (
                GuideConfig {
                    subframe: SubframeSpec::Centered { size: 1 },
                    ..Default::default()
                },
                "subframe.size",
            ),
            (
                GuideConfig {
                    tcs: TcsConfig {
                        port: 0,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                "tcs.port",
            ),
            (
                GuideConfig {
                    centroid: CentroidConfig {
                        background_start: 300,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                "centroid.background_start",
            ),
        ];

        for (config, expected) in cases {
            match config.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected {expected} to be invalid, got {other:?}"),
            }
        }
    }
}
