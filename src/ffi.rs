//! C FFI Bindings for Mobile Integration
//!
//! This module exposes the step detector to mobile platforms via C ABI.
//! Native bridges (Swift, Kotlin/JNI, React Native) call these functions
//! from the sensor delivery thread.
//!
//! Memory Safety:
//! - All returned strings must be freed with `stepsense_free_string()`
//! - The engine instance must be freed with `stepsense_engine_destroy()`
//! - NULL checks are performed on all inputs
//!
//! Thread Safety:
//! - The engine is NOT thread-safe. Use a single thread or mutex.
//! - The step callback runs synchronously inside `stepsense_process_sample()`
//!   and must not call back into the engine.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::DetectorConfig;
use crate::step_detection::StepDetector;
use crate::types::{ActivityMode, DetectorPhase, StepEvent};

// ============================================================================
// OPAQUE HANDLE TYPES
// ============================================================================

/// Invoked once per accepted step with the host's `user_data` and the
/// total step count since the last reset.
pub type StepsenseStepCallback =
    Option<unsafe extern "C" fn(user_data: *mut c_void, step_count: u64)>;

/// Opaque handle to the step detection engine.
pub struct StepsenseEngine {
    detector: StepDetector,
    callback: StepsenseStepCallback,
    user_data: *mut c_void,
}

impl StepsenseEngine {
    fn emit(&self, event: &StepEvent) {
        if let Some(callback) = self.callback {
            // SAFETY: the host registered this callback together with
            // `user_data` and guarantees both outlive the engine.
            unsafe { callback(self.user_data, event.step_count) };
        }
    }
}

/// Result status codes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepsenseStatus {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer provided.
    NullPointer = 1,
    /// Invalid parameter value.
    InvalidParameter = 2,
}

/// Configuration for the engine. Zero fields take their defaults.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct StepsenseConfig {
    /// Samples used to learn the gravity baseline (0 = default 50).
    pub calibration_samples: u32,
    /// Filtered history capacity (0 = default 10).
    pub history_capacity: u32,
    /// Pre-calibration threshold in m/s² (0 = default 12.0).
    pub initial_threshold: f64,
    /// Activity mode name, null-terminated. NULL selects "default".
    pub activity_mode: *const c_char,
}

/// Output from a single sample processing.
#[repr(C)]
#[derive(Debug, Clone, Default)]
pub struct StepsenseSampleOutput {
    /// Timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Step detected this sample (0 or 1).
    pub step_detected: i32,
    /// Total steps since the last reset.
    pub step_count: u64,
    /// Steps since the last idle period.
    pub consecutive_peaks: u32,
    /// Filtered peak magnitude of the detected step (0 if none).
    pub peak_magnitude: f64,
    /// 1 once calibration has completed.
    pub is_calibrated: i32,
    /// 1 while a walking streak is active.
    pub is_walking: i32,
}

/// Diagnostic snapshot.
#[repr(C)]
#[derive(Debug, Clone, Default)]
pub struct StepsenseStats {
    /// 0=Uncalibrated, 1=Calibrating, 2=Idle, 3=Walking.
    pub phase: i32,
    pub is_calibrated: i32,
    pub calibration_collected: u32,
    pub calibration_target: u32,
    pub baseline_acceleration: f64,
    pub threshold: f64,
    pub step_timeout_ms: u64,
    pub max_step_timeout_ms: u64,
    /// 0=Walking, 1=Running, 2=Hiking, 3=Default.
    pub activity_mode: i32,
    pub is_walking: i32,
    pub consecutive_peaks: u32,
    pub total_steps: u64,
}

unsafe fn read_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn phase_code(phase: DetectorPhase) -> i32 {
    match phase {
        DetectorPhase::Uncalibrated => 0,
        DetectorPhase::Calibrating => 1,
        DetectorPhase::Idle => 2,
        DetectorPhase::Walking => 3,
    }
}

fn mode_code(mode: ActivityMode) -> i32 {
    match mode {
        ActivityMode::Walking => 0,
        ActivityMode::Running => 1,
        ActivityMode::Hiking => 2,
        ActivityMode::Default => 3,
    }
}

// ============================================================================
// ENGINE LIFECYCLE
// ============================================================================

/// Create a new engine instance.
///
/// # Safety
/// - `config` must be NULL or a valid pointer to StepsenseConfig.
/// - `config.activity_mode` must be NULL or a valid null-terminated C string.
/// - `callback`, if set, must be safe to call with `user_data` until the
///   engine is destroyed.
/// - The returned pointer must be freed with `stepsense_engine_destroy()`.
///
/// # Returns
/// - Pointer to StepsenseEngine on success.
/// - NULL if the configuration is invalid.
#[no_mangle]
pub unsafe extern "C" fn stepsense_engine_create(
    config: *const StepsenseConfig,
    callback: StepsenseStepCallback,
    user_data: *mut c_void,
) -> *mut StepsenseEngine {
    let mut detector_config = DetectorConfig::default();

    if !config.is_null() {
        let config = &*config;
        if config.calibration_samples > 0 {
            detector_config.calibration_samples = config.calibration_samples as usize;
        }
        if config.history_capacity > 0 {
            detector_config.history_capacity = config.history_capacity as usize;
        }
        if config.initial_threshold != 0.0 {
            detector_config.initial_threshold = config.initial_threshold;
        }
        if let Some(name) = read_c_str(config.activity_mode) {
            detector_config.activity_mode = ActivityMode::from_name(name);
        }
    }

    if let Err(err) = detector_config.validate() {
        log::error!("stepsense_engine_create: {err}");
        return ptr::null_mut();
    }

    let engine = Box::new(StepsenseEngine {
        detector: StepDetector::new(detector_config),
        callback,
        user_data,
    });

    Box::into_raw(engine)
}

/// Destroy an engine instance.
///
/// # Safety
/// - `engine` must be a valid pointer from `stepsense_engine_create()`.
/// - Must not be called more than once for the same pointer.
#[no_mangle]
pub unsafe extern "C" fn stepsense_engine_destroy(engine: *mut StepsenseEngine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Reset session state, keeping calibration.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn stepsense_engine_reset(engine: *mut StepsenseEngine) -> StepsenseStatus {
    if engine.is_null() {
        return StepsenseStatus::NullPointer;
    }

    (*engine).detector.reset();
    StepsenseStatus::Ok
}

/// Reset session state and discard calibration.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn stepsense_engine_full_reset(
    engine: *mut StepsenseEngine,
) -> StepsenseStatus {
    if engine.is_null() {
        return StepsenseStatus::NullPointer;
    }

    (*engine).detector.full_reset();
    StepsenseStatus::Ok
}

// ============================================================================
// SAMPLE PROCESSING
// ============================================================================

/// Process a single accelerometer sample.
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `output` must be NULL or a valid pointer to receive results.
///
/// # Parameters
/// - `timestamp_ms`: Sample timestamp in milliseconds.
/// - `x/y/z`: Accelerometer readings in m/s².
///
/// Non-finite readings are dropped and reported as "no step".
#[no_mangle]
pub unsafe extern "C" fn stepsense_process_sample(
    engine: *mut StepsenseEngine,
    timestamp_ms: u64,
    x: f64,
    y: f64,
    z: f64,
    output: *mut StepsenseSampleOutput,
) -> StepsenseStatus {
    if engine.is_null() {
        return StepsenseStatus::NullPointer;
    }

    let engine = &mut *engine;
    let step = engine.detector.process_sample(x, y, z, timestamp_ms);

    if let Some(ref event) = step {
        engine.emit(event);
    }

    if !output.is_null() {
        let output = &mut *output;
        output.timestamp_ms = timestamp_ms;
        output.step_detected = i32::from(step.is_some());
        output.step_count = engine.detector.total_steps();
        output.consecutive_peaks = engine.detector.consecutive_peaks();
        output.peak_magnitude = step.map_or(0.0, |e| e.peak_magnitude);
        output.is_calibrated = i32::from(engine.detector.is_calibrated());
        output.is_walking = i32::from(engine.detector.is_walking());
    }

    StepsenseStatus::Ok
}

/// Select an activity mode by name. Unknown names select "default".
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `mode` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn stepsense_set_activity_mode(
    engine: *mut StepsenseEngine,
    mode: *const c_char,
) -> StepsenseStatus {
    if engine.is_null() || mode.is_null() {
        return StepsenseStatus::NullPointer;
    }

    let Some(name) = read_c_str(mode) else {
        return StepsenseStatus::InvalidParameter;
    };
    (*engine).detector.set_activity_mode_str(name);
    StepsenseStatus::Ok
}

// ============================================================================
// STATUS QUERIES
// ============================================================================

/// Fill `out` with the current diagnostic snapshot.
///
/// # Safety
/// - `engine` and `out` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn stepsense_get_stats(
    engine: *const StepsenseEngine,
    out: *mut StepsenseStats,
) -> StepsenseStatus {
    if engine.is_null() || out.is_null() {
        return StepsenseStatus::NullPointer;
    }

    let stats = (*engine).detector.stats();
    let out = &mut *out;
    out.phase = phase_code(stats.phase);
    out.is_calibrated = i32::from(stats.is_calibrated);
    out.calibration_collected = saturating_u32(stats.calibration_collected);
    out.calibration_target = saturating_u32(stats.calibration_target);
    out.baseline_acceleration = stats.baseline_acceleration;
    out.threshold = stats.threshold;
    out.step_timeout_ms = stats.step_timeout_ms;
    out.max_step_timeout_ms = stats.max_step_timeout_ms;
    out.activity_mode = mode_code(stats.activity_mode);
    out.is_walking = i32::from(stats.is_walking);
    out.consecutive_peaks = stats.consecutive_peaks;
    out.total_steps = stats.total_steps;

    StepsenseStatus::Ok
}

/// Get the diagnostic snapshot as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer.
///
/// # Returns
/// - JSON string (MUST be freed with `stepsense_free_string()`).
/// - NULL on error.
#[no_mangle]
pub unsafe extern "C" fn stepsense_stats_json(engine: *const StepsenseEngine) -> *mut c_char {
    if engine.is_null() {
        return ptr::null_mut();
    }

    let stats = (*engine).detector.stats();
    match serde_json::to_string(&stats) {
        Ok(json) => match CString::new(json) {
            Ok(cstring) => cstring.into_raw(),
            Err(_) => ptr::null_mut(),
        },
        Err(err) => {
            log::error!("stats serialization failed: {err}");
            ptr::null_mut()
        }
    }
}

/// Get the total number of steps since the last reset.
///
/// # Safety
/// - `engine` must be NULL or a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn stepsense_get_step_count(engine: *const StepsenseEngine) -> i64 {
    if engine.is_null() {
        return -1;
    }

    (*engine).detector.total_steps() as i64
}

/// Free a string returned by this library.
///
/// # Safety
/// - `ptr` must be a string returned by a stepsense_* function.
/// - Must not be called more than once for the same pointer.
#[no_mangle]
pub unsafe extern "C" fn stepsense_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Get the library version string.
///
/// # Returns
/// - Static string, do NOT free.
#[no_mangle]
pub extern "C" fn stepsense_version() -> *const c_char {
    static VERSION: &str = concat!("stepsense/", env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// TESTS
// ============================================================================
