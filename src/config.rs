//! Detector configuration.
//!
//! Only structural parameters are configurable. The filter coefficient,
//! pattern variation window and calibration threshold rule are fixed
//! constants in `signal`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::signal::PATTERN_WINDOW;
use crate::types::ActivityMode;

/// Configuration for step detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples collected before the gravity baseline is fixed (~1s at 50Hz).
    pub calibration_samples: usize,
    /// Capacity of the filtered magnitude history.
    pub history_capacity: usize,
    /// Peak threshold used until calibration replaces it (m/s²).
    pub initial_threshold: f64,
    /// Preset whose timing windows apply from construction.
    pub activity_mode: ActivityMode,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            calibration_samples: 50,
            history_capacity: 10,
            initial_threshold: 12.0,
            activity_mode: ActivityMode::Default,
        }
    }
}

impl DetectorConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: DetectorConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.calibration_samples < 2 {
            return Err(ConfigError::Validation(format!(
                "calibration_samples must be at least 2, got {}",
                self.calibration_samples
            )));
        }
        if self.history_capacity < PATTERN_WINDOW {
            return Err(ConfigError::Validation(format!(
                "history_capacity must be at least {PATTERN_WINDOW}, got {}",
                self.history_capacity
            )));
        }
        if !self.initial_threshold.is_finite() || self.initial_threshold <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "initial_threshold must be finite and positive, got {}",
                self.initial_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.calibration_samples, 50);
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.initial_threshold, 12.0);
    }

    #[test]
    fn test_toml_partial_override() {
        let config = DetectorConfig::from_toml_str(
            r#"
            calibration_samples = 25
            activity_mode = "hiking"
            "#,
        )
        .unwrap();
        assert_eq!(config.calibration_samples, 25);
        assert_eq!(config.activity_mode, ActivityMode::Hiking);
        assert_eq!(config.history_capacity, 10);
    }

    #[test]
    fn test_toml_empty_is_default() {
        assert_eq!(
            DetectorConfig::from_toml_str("").unwrap(),
            DetectorConfig::default()
        );
    }

    #[test]
    fn test_toml_unknown_mode_is_parse_error() {
        let err = DetectorConfig::from_toml_str(r#"activity_mode = "swimming""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_errors() {
        let small_history = DetectorConfig {
            history_capacity: 4,
            ..DetectorConfig::default()
        };
        assert!(matches!(
            small_history.validate(),
            Err(ConfigError::Validation(_))
        ));

        let bad_threshold = DetectorConfig {
            initial_threshold: f64::NAN,
            ..DetectorConfig::default()
        };
        assert!(bad_threshold.validate().is_err());

        let one_sample = DetectorConfig {
            calibration_samples: 1,
            ..DetectorConfig::default()
        };
        assert!(one_sample.validate().is_err());
    }
}
