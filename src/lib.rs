//! Stepsense Step Detection Library
//!
//! A streaming step-detection kernel that converts raw 3-axis accelerometer
//! samples into discrete, debounced step events in real time, calibrating
//! itself to the device's at-rest noise.
//!
//! # Design Philosophy
//!
//! - **Streaming only**: one sample in, at most one step out. O(1) work and
//!   no allocation per sample.
//! - **Silent degradation**: invalid samples and implausible peaks are
//!   dropped, never surfaced as errors.
//! - **Explicit ownership**: all calibration and detection state lives in
//!   one `StepDetector`; there are no statics and no background tasks.
//! - **Session scoped**: nothing is persisted across process restarts.
//!
//! # Example
//!
//! ```
//! use stepsense::{ActivityMode, StepDetector};
//!
//! let mut detector = StepDetector::default();
//! detector.set_activity_mode(ActivityMode::Walking);
//!
//! // First 50 samples learn the gravity baseline.
//! for i in 0..50 {
//!     assert!(detector.process_sample(0.0, 0.0, 9.81, i * 20).is_none());
//! }
//! assert!(detector.is_calibrated());
//! ```

pub mod config;
pub mod error;
pub mod ffi;
pub mod signal;
pub mod step_detection;
pub mod types;


// Re-export commonly used types
pub use config::DetectorConfig;
pub use error::{ConfigError, ParseModeError};
pub use step_detection::{StepCounter, StepDetector};
pub use types::{
    AccelSample, ActivityMode, ActivityProfile, DetectorPhase, EngineStats, StepEvent,
    STANDARD_GRAVITY,
};
