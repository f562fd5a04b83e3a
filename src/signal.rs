//! Signal filtering, calibration and peak shape checks.
//!
//! This module provides the low-level streaming pieces the detector is
//! assembled from:
//! - Gravity baseline calibration from the first N magnitudes
//! - A fixed-capacity ring buffer of filtered magnitudes
//! - Single-pole low-pass filtering
//! - Peak and step-pattern checks over the newest history entries
//!
//! Design note: All updates are incremental (O(1) per sample). Buffers are
//! allocated once at construction and never grow.

use crate::types::STANDARD_GRAVITY;

/// Low-pass smoothing coefficient applied to gravity-removed magnitudes.
pub const FILTER_ALPHA: f64 = 0.8;

/// Calibrated thresholds never go below this (m/s²).
pub const MIN_CALIBRATED_THRESHOLD: f64 = 1.5;

/// Calibrated threshold = this many standard deviations of the at-rest noise.
pub const THRESHOLD_STDDEV_MULTIPLIER: f64 = 2.0;

/// History entries needed before a peak can be confirmed.
pub const PEAK_WINDOW: usize = 4;

/// History entries inspected by the step-pattern check.
pub const PATTERN_WINDOW: usize = 5;

/// Mean absolute variation at or below this is sensor noise, not a step.
pub const MIN_PATTERN_VARIATION: f64 = 0.3;

/// Mean absolute variation at or above this is erratic shaking, not a step.
pub const MAX_PATTERN_VARIATION: f64 = 10.0;

/// Result of a completed calibration phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Mean at-rest magnitude (m/s²).
    pub baseline: f64,
    /// Population standard deviation of the calibration magnitudes.
    pub std_dev: f64,
    /// Detection threshold derived from `std_dev`, floored at `MIN_CALIBRATED_THRESHOLD`.
    pub threshold: f64,
}

impl Calibration {
    /// Compute baseline and threshold from a set of magnitudes.
    ///
    /// Returns None for an empty slice.
    pub fn from_magnitudes(magnitudes: &[f64]) -> Option<Self> {
        if magnitudes.is_empty() {
            return None;
        }

        let n = magnitudes.len() as f64;
        let mean = magnitudes.iter().sum::<f64>() / n;

        // Deviations are scaled by the largest one so squaring cannot overflow.
        let scale = magnitudes
            .iter()
            .map(|m| (m - mean).abs())
            .fold(0.0, f64::max);
        let std_dev = if scale > 0.0 {
            let scaled_variance = magnitudes
                .iter()
                .map(|m| {
                    let d = (m - mean) / scale;
                    d * d
                })
                .sum::<f64>()
                / n;
            scale * scaled_variance.sqrt()
        } else {
            0.0
        };

        Some(Self {
            baseline: mean,
            std_dev,
            threshold: (THRESHOLD_STDDEV_MULTIPLIER * std_dev).max(MIN_CALIBRATED_THRESHOLD),
        })
    }
}

/// Collects the first N sample magnitudes and learns the gravity baseline.
///
/// The buffer is bounded by the target count; once full, the calibrator
/// is complete and ignores further input until `reset`.
#[derive(Debug, Clone)]
pub struct GravityCalibrator {
    samples: Vec<f64>,
    target: usize,
    result: Option<Calibration>,
}

impl GravityCalibrator {
    /// Create a calibrator that completes after `target` samples.
    pub fn new(target: usize) -> Self {
        let target = target.max(1);
        Self {
            samples: Vec::with_capacity(target),
            target,
            result: None,
        }
    }

    /// Add one raw magnitude.
    ///
    /// Returns the calibration exactly once, on the sample that fills the buffer.
    pub fn push(&mut self, magnitude: f64) -> Option<Calibration> {
        if self.result.is_some() {
            return None;
        }

        self.samples.push(magnitude);
        if self.samples.len() < self.target {
            return None;
        }

        self.result = Calibration::from_magnitudes(&self.samples);
        self.result
    }

    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }

    /// Number of magnitudes collected so far.
    pub fn collected(&self) -> usize {
        self.samples.len()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// The learned calibration, if complete.
    pub fn calibration(&self) -> Option<Calibration> {
        self.result
    }

    /// Baseline magnitude: the learned mean, or standard gravity before calibration.
    pub fn baseline(&self) -> f64 {
        self.result.map_or(STANDARD_GRAVITY, |c| c.baseline)
    }

    /// Discard everything learned.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.result = None;
    }
}

/// Fixed-capacity ring buffer of filtered magnitudes, newest last.
///
/// Storage is allocated once; pushes overwrite the oldest slot through a
/// write cursor instead of shifting.
#[derive(Debug, Clone)]
pub struct MagnitudeHistory {
    buffer: Vec<f64>,
    write_index: usize,
    len: usize,
}

impl MagnitudeHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0.0; capacity],
            write_index: 0,
            len: 0,
        }
    }

    /// Append a value, evicting the oldest entry when full.
    pub fn push(&mut self, value: f64) {
        let capacity = self.buffer.len();
        self.buffer[self.write_index] = value;
        self.write_index = (self.write_index + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
    }

    /// The `age`-th newest entry: 0 is the latest, 1 the one before it.
    pub fn back(&self, age: usize) -> Option<f64> {
        if age >= self.len {
            return None;
        }
        let capacity = self.buffer.len();
        let index = (self.write_index + capacity - 1 - age) % capacity;
        Some(self.buffer[index])
    }

    pub fn latest(&self) -> Option<f64> {
        self.back(0)
    }

    /// The newest `count` entries, oldest first. Shorter if fewer are stored.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = f64> + '_ {
        let count = count.min(self.len);
        (0..count).rev().filter_map(move |age| self.back(age))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.write_index = 0;
        self.len = 0;
    }
}

/// One low-pass step: `prev + α·(input − prev)`, or `input` when there is no history.
pub fn low_pass(previous: Option<f64>, input: f64) -> f64 {
    match previous {
        Some(prev) => prev + FILTER_ALPHA * (input - prev),
        None => input,
    }
}

/// Return the confirmed peak value if the second-newest entry is a strict
/// local maximum over its three neighbours and above `threshold`.
///
/// Detection lags one sample: the peak is only confirmed once the signal
/// has started falling again.
pub fn confirmed_peak(history: &MagnitudeHistory, threshold: f64) -> Option<f64> {
    if history.len() < PEAK_WINDOW {
        return None;
    }

    let curr = history.back(0)?;
    let prev = history.back(1)?;
    let prev2 = history.back(2)?;
    let prev3 = history.back(3)?;

    let is_peak = prev > curr && prev > prev2 && prev > prev3 && prev > threshold;
    is_peak.then_some(prev)
}

/// Mean absolute difference between consecutive entries of the newest
/// `PATTERN_WINDOW` values. None while the history is shorter than that.
pub fn average_variation(history: &MagnitudeHistory) -> Option<f64> {
    if history.len() < PATTERN_WINDOW {
        return None;
    }

    let mut total = 0.0;
    let mut previous: Option<f64> = None;
    for value in history.recent(PATTERN_WINDOW) {
        if let Some(p) = previous {
            total += (value - p).abs();
        }
        previous = Some(value);
    }
    Some(total / (PATTERN_WINDOW - 1) as f64)
}

/// Rejects both near-silence and wild, non-periodic motion.
///
/// With too little history there is nothing to reject on, so the pattern
/// counts as valid.
pub fn is_valid_step_pattern(history: &MagnitudeHistory) -> bool {
    match average_variation(history) {
        Some(variation) => variation > MIN_PATTERN_VARIATION && variation < MAX_PATTERN_VARIATION,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn history_of(values: &[f64], capacity: usize) -> MagnitudeHistory {
        let mut history = MagnitudeHistory::new(capacity);
        for &v in values {
            history.push(v);
        }
        history
    }

    #[test]
    fn test_calibration_constant_input() {
        let calibration = Calibration::from_magnitudes(&[9.81; 50]).unwrap();
        assert_relative_eq!(calibration.baseline, 9.81, epsilon = 1e-9);
        assert!(calibration.std_dev < 1e-9);
        assert_eq!(calibration.threshold, MIN_CALIBRATED_THRESHOLD);
    }

    #[test]
    fn test_calibration_noisy_input_raises_threshold() {
        // Alternating ±1 around 9.81 has a population stddev of exactly 1.
        let magnitudes: Vec<f64> = (0..50)
            .map(|i| if i % 2 == 0 { 8.81 } else { 10.81 })
            .collect();
        let calibration = Calibration::from_magnitudes(&magnitudes).unwrap();
        assert_relative_eq!(calibration.baseline, 9.81, epsilon = 1e-9);
        assert_relative_eq!(calibration.std_dev, 1.0, epsilon = 1e-9);
        assert_relative_eq!(calibration.threshold, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_calibration_extreme_spread_stays_finite() {
        // Largest magnitudes a sample can produce without overflowing the norm.
        let magnitudes: Vec<f64> = (0..50)
            .map(|i| if i % 2 == 0 { 0.0 } else { 1e154 })
            .collect();
        let calibration = Calibration::from_magnitudes(&magnitudes).unwrap();
        assert_relative_eq!(calibration.baseline, 5e153, max_relative = 1e-9);
        assert_relative_eq!(calibration.std_dev, 5e153, max_relative = 1e-9);
        assert!(calibration.threshold.is_finite());
    }

    #[test]
    fn test_calibration_empty() {
        assert!(Calibration::from_magnitudes(&[]).is_none());
    }

    #[test]
    fn test_calibrator_completes_once() {
        let mut calibrator = GravityCalibrator::new(3);
        assert_eq!(calibrator.baseline(), STANDARD_GRAVITY);
        assert!(calibrator.push(9.0).is_none());
        assert!(calibrator.push(10.0).is_none());
        let calibration = calibrator.push(11.0).expect("third sample completes");
        assert_relative_eq!(calibration.baseline, 10.0);
        assert!(calibrator.is_complete());

        // Further input is ignored and the buffer stays bounded.
        assert!(calibrator.push(50.0).is_none());
        assert_eq!(calibrator.collected(), 3);
        assert_relative_eq!(calibrator.baseline(), 10.0);
    }

    #[test]
    fn test_calibrator_reset() {
        let mut calibrator = GravityCalibrator::new(2);
        calibrator.push(9.0);
        calibrator.push(9.0);
        calibrator.reset();
        assert!(!calibrator.is_complete());
        assert_eq!(calibrator.collected(), 0);
        assert_eq!(calibrator.baseline(), STANDARD_GRAVITY);
    }

    #[test]
    fn test_history_eviction() {
        let history = history_of(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(history.len(), 3);
        assert_eq!(history.latest(), Some(5.0));
        assert_eq!(history.back(2), Some(3.0));
        assert_eq!(history.back(3), None);
        assert_eq!(history.recent(10).collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_history_clear() {
        let mut history = history_of(&[1.0, 2.0], 4);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.latest(), None);
        history.push(7.0);
        assert_eq!(history.recent(4).collect::<Vec<_>>(), vec![7.0]);
    }

    #[test]
    fn test_low_pass() {
        assert_eq!(low_pass(None, 3.0), 3.0);
        assert_relative_eq!(low_pass(Some(0.0), 2.0), 1.6);
        assert_relative_eq!(low_pass(Some(1.6), 5.0), 4.32);
    }

    #[test]
    fn test_peak_requires_four_entries() {
        let history = history_of(&[0.0, 5.0, 1.0], 10);
        assert!(confirmed_peak(&history, 1.5).is_none());
    }

    #[test]
    fn test_peak_detected_on_fall() {
        let history = history_of(&[0.0, 1.6, 4.32, 2.464], 10);
        assert_relative_eq!(confirmed_peak(&history, 1.5).unwrap(), 4.32);
    }

    #[test]
    fn test_peak_below_threshold() {
        let history = history_of(&[0.0, 0.5, 1.0, 0.5], 10);
        assert!(confirmed_peak(&history, 1.5).is_none());
    }

    #[test]
    fn test_rising_edge_is_not_peak() {
        let history = history_of(&[0.0, 1.0, 2.0, 3.0], 10);
        assert!(confirmed_peak(&history, 1.5).is_none());
    }

    #[test]
    fn test_pattern_short_history_is_valid() {
        let history = history_of(&[0.0, 0.0, 0.0, 0.0], 10);
        assert!(average_variation(&history).is_none());
        assert!(is_valid_step_pattern(&history));
    }

    #[test]
    fn test_pattern_uses_newest_five() {
        // The leading 100.0 falls outside the window.
        let history = history_of(&[100.0, 0.0, 1.0, 0.0, 1.0, 0.0], 10);
        assert_relative_eq!(average_variation(&history).unwrap(), 1.0);
        assert!(is_valid_step_pattern(&history));
    }

    #[test]
    fn test_pattern_rejects_silence_and_shaking() {
        let quiet = history_of(&[3.0, 3.1, 3.0, 3.1, 3.0], 10);
        assert!(!is_valid_step_pattern(&quiet));

        let violent = history_of(&[0.0, 24.0, 4.8, 24.96, 4.992], 10);
        assert!(!is_valid_step_pattern(&violent));
    }

    #[test]
    fn test_pattern_bounds_are_exclusive() {
        let at_floor = history_of(&[0.0, 0.3, 0.0, 0.3, 0.0], 10);
        assert!(!is_valid_step_pattern(&at_floor));

        let at_ceiling = history_of(&[0.0, 10.0, 0.0, 10.0, 0.0], 10);
        assert!(!is_valid_step_pattern(&at_ceiling));
    }
}
