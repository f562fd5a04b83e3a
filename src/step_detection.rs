//! Step Detection Module.
//!
//! Converts a live stream of 3-axis accelerometer samples into debounced
//! step events:
//! - Gravity baseline learned from the first N samples (self-calibration)
//! - Gravity removal and low-pass filtering of the acceleration magnitude
//! - Peak detection with a one-sample confirmation lag
//! - Timing (debounce / idle) and step-pattern validation
//! - Activity presets that swap threshold and timing windows
//!
//! Idle handling is purely timestamp driven. There are no timers and no
//! background work; every call to `process_sample` is O(1) and allocation free.

use crate::config::DetectorConfig;
use crate::signal::{self, GravityCalibrator, MagnitudeHistory};
use crate::types::{
    AccelSample, ActivityMode, ActivityProfile, DetectorPhase, EngineStats, StepEvent,
};

/// Why a confirmed peak did not become a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    TooSoon,
    TooLate,
    Pattern,
}

/// Streaming step detector.
///
/// Owns all calibration and detection state. Calls must be sequential; hosts
/// that receive samples on another thread should funnel them through a queue.
#[derive(Debug, Clone)]
pub struct StepDetector {
    // Calibration state (survives `reset`)
    calibrator: GravityCalibrator,
    initial_threshold: f64,

    // Active tuning
    mode: ActivityMode,
    profile: ActivityProfile,

    // Detection state
    history: MagnitudeHistory,
    last_step_time_ms: Option<u64>,
    last_process_time_ms: Option<u64>,
    is_walking: bool,
    consecutive_peaks: u32,

    // Statistics
    total_steps: u64,
    non_finite_reported: bool,
}

impl StepDetector {
    /// Create a detector from a configuration.
    ///
    /// An unusable `initial_threshold` (non-finite or not positive) is
    /// replaced by the default sensitivity.
    pub fn new(config: DetectorConfig) -> Self {
        let usable = config.initial_threshold.is_finite() && config.initial_threshold > 0.0;
        let initial_threshold = if usable {
            config.initial_threshold
        } else {
            let fallback = DetectorConfig::default().initial_threshold;
            log::warn!(
                "initial threshold {} unusable, using {fallback}",
                config.initial_threshold
            );
            fallback
        };
        let mut profile = config.activity_mode.profile();
        profile.threshold = initial_threshold;

        Self {
            calibrator: GravityCalibrator::new(config.calibration_samples),
            initial_threshold,
            mode: config.activity_mode,
            profile,
            history: MagnitudeHistory::new(config.history_capacity),
            last_step_time_ms: None,
            last_process_time_ms: None,
            is_walking: false,
            consecutive_peaks: 0,
            total_steps: 0,
            non_finite_reported: false,
        }
    }

    /// Create a detector with an explicit pre-calibration sensitivity.
    pub fn with_threshold(initial_threshold: f64) -> Self {
        Self::new(DetectorConfig {
            initial_threshold,
            ..DetectorConfig::default()
        })
    }

    /// Process one accelerometer reading.
    ///
    /// Returns a `StepEvent` if this sample confirmed a step. Readings with
    /// a non-finite magnitude are dropped without touching any state.
    pub fn process_sample(&mut self, x: f64, y: f64, z: f64, now_ms: u64) -> Option<StepEvent> {
        self.process(&AccelSample::new(now_ms, x, y, z))
    }

    /// Same as `process_sample`, taking a sample struct.
    pub fn process(&mut self, sample: &AccelSample) -> Option<StepEvent> {
        let raw_magnitude = sample.magnitude();
        if !raw_magnitude.is_finite() {
            self.report_non_finite(sample);
            return None;
        }

        let now = sample.timestamp_ms;
        self.check_idle_gap(now);
        self.last_process_time_ms = Some(now);

        if !self.calibrator.is_complete() {
            self.calibrate(raw_magnitude);
            return None;
        }

        let magnitude = (raw_magnitude - self.calibrator.baseline()).abs();
        let filtered = signal::low_pass(self.history.latest(), magnitude);
        self.history.push(filtered);

        let step = signal::confirmed_peak(&self.history, self.profile.threshold)
            .and_then(|peak| self.validate_peak(peak, now));

        self.decay_walking_state(now);
        step
    }

    /// Process a batch of samples and return all detected steps.
    pub fn process_batch(&mut self, samples: &[AccelSample]) -> Vec<StepEvent> {
        samples.iter().filter_map(|s| self.process(s)).collect()
    }

    /// Swap in the preset for `mode`. Calibration and history are untouched.
    pub fn set_activity_mode(&mut self, mode: ActivityMode) {
        self.mode = mode;
        self.profile = mode.profile();
        log::debug!(
            "activity mode {}: threshold={} step_timeout={}ms max_step_timeout={}ms",
            mode,
            self.profile.threshold,
            self.profile.step_timeout_ms,
            self.profile.max_step_timeout_ms
        );
    }

    /// Lenient variant of `set_activity_mode`: unknown names select `Default`.
    pub fn set_activity_mode_str(&mut self, name: &str) -> ActivityMode {
        let mode = ActivityMode::from_name(name);
        self.set_activity_mode(mode);
        mode
    }

    /// Reset the detection state (call at the start of a new session).
    ///
    /// Calibration is kept, so the same device does not need to recalibrate.
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_step_time_ms = None;
        self.last_process_time_ms = None;
        self.is_walking = false;
        self.consecutive_peaks = 0;
        self.total_steps = 0;
        self.non_finite_reported = false;
        log::debug!("detector reset, calibration kept");
    }

    /// Reset detection state and discard the learned calibration.
    ///
    /// The threshold returns to the initial pre-calibration sensitivity.
    pub fn full_reset(&mut self) {
        self.reset();
        self.calibrator.reset();
        self.profile.threshold = self.initial_threshold;
        log::debug!("detector fully reset, recalibration required");
    }

    /// Diagnostic snapshot. No side effects.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            phase: self.phase(),
            is_calibrated: self.is_calibrated(),
            calibration_collected: self.calibrator.collected(),
            calibration_target: self.calibrator.target(),
            baseline_acceleration: self.calibrator.baseline(),
            threshold: self.profile.threshold,
            step_timeout_ms: self.profile.step_timeout_ms,
            max_step_timeout_ms: self.profile.max_step_timeout_ms,
            activity_mode: self.mode,
            is_walking: self.is_walking,
            consecutive_peaks: self.consecutive_peaks,
            total_steps: self.total_steps,
            history_len: self.history.len(),
            last_step_time_ms: self.last_step_time_ms,
        }
    }

    pub fn phase(&self) -> DetectorPhase {
        if self.calibrator.is_complete() {
            if self.is_walking {
                DetectorPhase::Walking
            } else {
                DetectorPhase::Idle
            }
        } else if self.calibrator.collected() == 0 {
            DetectorPhase::Uncalibrated
        } else {
            DetectorPhase::Calibrating
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrator.is_complete()
    }

    pub fn is_walking(&self) -> bool {
        self.is_walking
    }

    /// Learned at-rest magnitude, or standard gravity before calibration.
    pub fn baseline_acceleration(&self) -> f64 {
        self.calibrator.baseline()
    }

    pub fn activity_mode(&self) -> ActivityMode {
        self.mode
    }

    /// Currently applied threshold and timing windows.
    pub fn profile(&self) -> ActivityProfile {
        self.profile
    }

    /// Steps accepted since the last reset.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn consecutive_peaks(&self) -> u32 {
        self.consecutive_peaks
    }

    /// Number of filtered magnitudes currently held.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Newest filtered, gravity-removed magnitude, if any.
    pub fn latest_filtered(&self) -> Option<f64> {
        self.history.latest()
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    fn report_non_finite(&mut self, sample: &AccelSample) {
        if self.non_finite_reported {
            log::trace!("dropping non-finite sample at {}ms", sample.timestamp_ms);
        } else {
            self.non_finite_reported = true;
            log::warn!(
                "dropping non-finite sample at {}ms ({}, {}, {})",
                sample.timestamp_ms,
                sample.x,
                sample.y,
                sample.z
            );
        }
    }

    /// A long gap between samples invalidates the peak window.
    fn check_idle_gap(&mut self, now: u64) {
        let Some(last) = self.last_process_time_ms else {
            return;
        };
        let gap = now.saturating_sub(last);
        if gap > self.profile.max_step_timeout_ms && !self.history.is_empty() {
            log::debug!(
                "idle gap of {gap}ms, clearing {} history entries",
                self.history.len()
            );
            self.history.clear();
        }
    }

    fn calibrate(&mut self, magnitude: f64) {
        if let Some(calibration) = self.calibrator.push(magnitude) {
            self.profile.threshold = calibration.threshold;
            log::debug!(
                "calibrated from {} samples: baseline={:.4} stddev={:.4} threshold={:.4}",
                self.calibrator.collected(),
                calibration.baseline,
                calibration.std_dev,
                calibration.threshold
            );
        }
    }

    fn validate_peak(&mut self, peak: f64, now: u64) -> Option<StepEvent> {
        let since_last = now.saturating_sub(self.last_step_time_ms.unwrap_or(0));

        if let Err(reason) = self.check_timing(since_last) {
            log::trace!(
                "peak {peak:.3} at {now}ms rejected: {reason:?} (dt={since_last}ms)"
            );
            return None;
        }
        if !signal::is_valid_step_pattern(&self.history) {
            log::trace!(
                "peak {peak:.3} at {now}ms rejected: {:?} (variation={:?})",
                Rejection::Pattern,
                signal::average_variation(&self.history)
            );
            return None;
        }

        let interval_ms = self.last_step_time_ms.map(|_| since_last);
        self.last_step_time_ms = Some(now);
        self.consecutive_peaks = self.consecutive_peaks.saturating_add(1);
        self.is_walking = true;
        self.total_steps += 1;

        log::trace!("step {} at {now}ms, peak {peak:.3}", self.total_steps);

        Some(StepEvent {
            timestamp_ms: now,
            step_count: self.total_steps,
            consecutive_peaks: self.consecutive_peaks,
            peak_magnitude: peak,
            interval_ms,
        })
    }

    /// Debounce, plus an upper bound that only applies mid-streak.
    ///
    /// The first step of a session, or the first after going idle, is
    /// accepted however long the gap was.
    fn check_timing(&self, since_last: u64) -> Result<(), Rejection> {
        if since_last <= self.profile.step_timeout_ms {
            return Err(Rejection::TooSoon);
        }
        let first_step = self.last_step_time_ms.is_none();
        if since_last < self.profile.max_step_timeout_ms || first_step || !self.is_walking {
            Ok(())
        } else {
            Err(Rejection::TooLate)
        }
    }

    fn decay_walking_state(&mut self, now: u64) {
        if !self.is_walking {
            return;
        }
        let since_last = now.saturating_sub(self.last_step_time_ms.unwrap_or(0));
        if since_last > self.profile.max_step_timeout_ms {
            log::debug!(
                "no step for {since_last}ms, idle after {} consecutive steps",
                self.consecutive_peaks
            );
            self.is_walking = false;
            self.consecutive_peaks = 0;
        }
    }
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

/// Callback adapter over `StepDetector`.
///
/// Invokes `on_step` synchronously, exactly once per accepted step. The
/// callback receives the event and cannot reach the detector, so it cannot
/// re-enter `process_sample`.
pub struct StepCounter<F>
where
    F: FnMut(&StepEvent),
{
    detector: StepDetector,
    on_step: F,
}

impl<F> StepCounter<F>
where
    F: FnMut(&StepEvent),
{
    pub fn new(detector: StepDetector, on_step: F) -> Self {
        Self { detector, on_step }
    }

    /// Feed one sample; returns true if a step was emitted.
    pub fn process_sample(&mut self, x: f64, y: f64, z: f64, now_ms: u64) -> bool {
        match self.detector.process_sample(x, y, z, now_ms) {
            Some(event) => {
                (self.on_step)(&event);
                true
            }
            None => false,
        }
    }

    pub fn detector(&self) -> &StepDetector {
        &self.detector
    }

    /// Mode changes and resets go through the inner detector.
    pub fn detector_mut(&mut self) -> &mut StepDetector {
        &mut self.detector
    }

    pub fn into_inner(self) -> StepDetector {
        self.detector
    }
}

// ============================================================================
// TESTS
// ============================================================================
