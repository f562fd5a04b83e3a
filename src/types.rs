//! Core data types for the step detection engine.
//!
//! This module defines the values that cross the engine boundary: raw
//! acceleration samples going in, step events and diagnostic snapshots
//! coming out, and the activity presets that tune detection.
//!
//! Design principle: Types should make intent obvious. If a concept exists,
//! it gets a type. Never pass raw tuples or untyped collections across boundaries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseModeError;

/// Standard gravity in m/s². Baseline before calibration completes.
pub const STANDARD_GRAVITY: f64 = 9.81;

/// A single raw accelerometer sample.
///
/// This is the minimal input contract: three axes in m/s² and a
/// monotonic timestamp. Samples are consumed one at a time and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// X axis in m/s².
    pub x: f64,
    /// Y axis in m/s².
    pub y: f64,
    /// Z axis in m/s².
    pub z: f64,
}

impl AccelSample {
    /// Creates a new sample.
    pub fn new(timestamp_ms: u64, x: f64, y: f64, z: f64) -> Self {
        Self { timestamp_ms, x, y, z }
    }

    /// Euclidean norm of the acceleration vector in m/s².
    ///
    /// Overflows to infinity when an axis exceeds roughly 1e154.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// True when the magnitude is a finite number.
    ///
    /// This rejects NaN and infinite axes as well as finite axes large enough
    /// to overflow the norm. Such samples must never reach the filter: a
    /// single NaN propagates through every later low-pass computation.
    pub fn is_finite(&self) -> bool {
        self.magnitude().is_finite()
    }
}

/// An accepted step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Timestamp (ms) of the sample that confirmed the step.
    pub timestamp_ms: u64,
    /// Total steps accepted since the last reset, including this one.
    pub step_count: u64,
    /// Steps accepted since the last idle period, including this one.
    pub consecutive_peaks: u32,
    /// Filtered, gravity-removed magnitude of the confirmed peak (m/s²).
    pub peak_magnitude: f64,
    /// Time since the previous accepted step. None for the first step of a session.
    pub interval_ms: Option<u64>,
}

/// Operator-selected activity preset.
///
/// The engine never infers the activity; it only applies the preset it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityMode {
    Walking,
    Running,
    Hiking,
    #[default]
    Default,
}

impl ActivityMode {
    /// All modes, in table order.
    pub const ALL: [ActivityMode; 4] = [
        ActivityMode::Walking,
        ActivityMode::Running,
        ActivityMode::Hiking,
        ActivityMode::Default,
    ];

    /// Lenient lookup: unknown names fall back to `Default`.
    pub fn from_name(name: &str) -> Self {
        match name.parse() {
            Ok(mode) => mode,
            Err(err) => {
                log::warn!("{err}, falling back to default profile");
                ActivityMode::Default
            }
        }
    }

    /// Lowercase name as accepted by `from_name`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityMode::Walking => "walking",
            ActivityMode::Running => "running",
            ActivityMode::Hiking => "hiking",
            ActivityMode::Default => "default",
        }
    }

    /// The fixed tuning triple for this mode.
    pub fn profile(&self) -> ActivityProfile {
        match self {
            ActivityMode::Walking => ActivityProfile::new(1.5, 400, 2000),
            ActivityMode::Running => ActivityProfile::new(2.5, 200, 1000),
            ActivityMode::Hiking => ActivityProfile::new(2.0, 500, 3000),
            ActivityMode::Default => ActivityProfile::new(1.8, 250, 2000),
        }
    }
}

impl fmt::Display for ActivityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walking" => Ok(ActivityMode::Walking),
            "running" => Ok(ActivityMode::Running),
            "hiking" => Ok(ActivityMode::Hiking),
            "default" => Ok(ActivityMode::Default),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Detection parameters for one activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityProfile {
    /// Minimum filtered magnitude (m/s²) for a peak to qualify.
    pub threshold: f64,
    /// Minimum time between accepted steps (debounce).
    pub step_timeout_ms: u64,
    /// Longest gap a walking streak tolerates before going idle.
    pub max_step_timeout_ms: u64,
}

impl ActivityProfile {
    pub const fn new(threshold: f64, step_timeout_ms: u64, max_step_timeout_ms: u64) -> Self {
        Self {
            threshold,
            step_timeout_ms,
            max_step_timeout_ms,
        }
    }

    /// `threshold > 0` and `step_timeout < max_step_timeout`.
    pub fn is_valid(&self) -> bool {
        self.threshold.is_finite()
            && self.threshold > 0.0
            && self.step_timeout_ms < self.max_step_timeout_ms
    }
}

impl Default for ActivityProfile {
    fn default() -> Self {
        ActivityMode::Default.profile()
    }
}

/// Coarse lifecycle state of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorPhase {
    /// No samples collected since construction or full reset.
    Uncalibrated,
    /// Collecting the gravity baseline. No steps can be emitted.
    Calibrating,
    /// Calibrated, no recent steps.
    Idle,
    /// Calibrated, a step was accepted within the last `max_step_timeout_ms`.
    Walking,
}

/// Read-only diagnostic snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub phase: DetectorPhase,
    pub is_calibrated: bool,
    /// Calibration samples collected so far.
    pub calibration_collected: usize,
    /// Calibration samples required.
    pub calibration_target: usize,
    pub baseline_acceleration: f64,
    pub threshold: f64,
    pub step_timeout_ms: u64,
    pub max_step_timeout_ms: u64,
    pub activity_mode: ActivityMode,
    pub is_walking: bool,
    pub consecutive_peaks: u32,
    pub total_steps: u64,
    pub history_len: usize,
    pub last_step_time_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_magnitude() {
        let sample = AccelSample::new(0, 3.0, 4.0, 0.0);
        assert_eq!(sample.magnitude(), 5.0);
    }

    #[test]
    fn test_sample_finiteness() {
        assert!(AccelSample::new(0, 0.0, 0.0, 9.81).is_finite());
        assert!(!AccelSample::new(0, f64::NAN, 0.0, 9.81).is_finite());
        assert!(!AccelSample::new(0, 0.0, f64::INFINITY, 9.81).is_finite());
        assert!(!AccelSample::new(0, 0.0, 0.0, -f64::INFINITY).is_finite());
    }

    #[test]
    fn test_overflowing_magnitude_is_not_finite() {
        let sample = AccelSample::new(0, 1e200, 0.0, 0.0);
        assert!(sample.magnitude().is_infinite());
        assert!(!sample.is_finite());

        assert!(AccelSample::new(0, 1e150, -1e150, 1e150).is_finite());
    }

    #[test]
    fn test_profile_table() {
        let expected = [
            (ActivityMode::Walking, ActivityProfile::new(1.5, 400, 2000)),
            (ActivityMode::Running, ActivityProfile::new(2.5, 200, 1000)),
            (ActivityMode::Hiking, ActivityProfile::new(2.0, 500, 3000)),
            (ActivityMode::Default, ActivityProfile::new(1.8, 250, 2000)),
        ];
        for (mode, profile) in expected {
            assert_eq!(mode.profile(), profile, "{mode}");
        }
    }

    #[test]
    fn test_all_profiles_valid() {
        for mode in ActivityMode::ALL {
            assert!(mode.profile().is_valid(), "{mode} profile invalid");
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("running".parse(), Ok(ActivityMode::Running));
        assert_eq!(" Hiking ".parse(), Ok(ActivityMode::Hiking));
        assert!("swimming".parse::<ActivityMode>().is_err());
    }

    #[test]
    fn test_unknown_mode_falls_back() {
        assert_eq!(ActivityMode::from_name("swimming"), ActivityMode::Default);
        assert_eq!(ActivityMode::from_name(""), ActivityMode::Default);
        assert_eq!(ActivityMode::from_name("walking"), ActivityMode::Walking);
    }

    #[test]
    fn test_mode_name_roundtrip() {
        for mode in ActivityMode::ALL {
            assert_eq!(ActivityMode::from_name(mode.as_str()), mode);
        }
    }

    #[test]
    fn test_invalid_profile() {
        assert!(!ActivityProfile::new(0.0, 250, 2000).is_valid());
        assert!(!ActivityProfile::new(1.0, 2000, 2000).is_valid());
        assert!(!ActivityProfile::new(f64::NAN, 250, 2000).is_valid());
    }
}
