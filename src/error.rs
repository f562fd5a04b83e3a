//! Error types for the fallible edges of the crate.
//!
//! The detector itself never fails: samples and peaks are either accepted
//! or silently rejected. Only configuration loading and strict mode parsing
//! can return errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Returned by `ActivityMode::from_str` for names outside the preset table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown activity mode '{0}'")]
pub struct ParseModeError(pub String);
