//! C ABI for driving a touch tracker from a sensor driver.
//!
//! A handle owns one tracker and its state. Handles are independent and
//! must not be used from more than one thread at a time.

use std::ptr;

use microtouch::{ConfigError, FrameStatus, TouchTracker, TrackerConfig, TrackerState, OUTPUT_COLUMNS};

/// `microtouch_process` status: the output buffer is too small for the configured touches.
pub const MICROTOUCH_DISABLED: i32 = -1;
/// `microtouch_process` status: the frame has the wrong size or contains non-finite samples.
pub const MICROTOUCH_BAD_FRAME: i32 = -2;
/// `microtouch_process` status: the frame was consumed by calibration.
pub const MICROTOUCH_CALIBRATING: i32 = -3;
/// Returned by functions taking a handle when the handle is null.
pub const MICROTOUCH_NULL_HANDLE: i32 = -4;

pub struct MicrotouchHandle {
    tracker: TouchTracker,
    state: TrackerState,
}

/// Creates a tracker for a `width` x `height` sensor with default tuning.
/// Returns null if the configuration is rejected.
#[no_mangle]
pub extern "C" fn microtouch_create(width: usize, height: usize, max_touches: usize) -> *mut MicrotouchHandle {
    let config = TrackerConfig {
        width,
        height,
        max_touches,
        ..TrackerConfig::default()
    };
    let mut tracker = match TouchTracker::new(config) {
        Ok(tracker) => tracker,
        Err(_) => return ptr::null_mut(),
    };
    let state = tracker.new_state();
    if tracker.bind_output(max_touches * OUTPUT_COLUMNS).is_err() {
        return ptr::null_mut();
    }
    Box::into_raw(Box::new(MicrotouchHandle { tracker, state }))
}

/// Destroys a handle created by `microtouch_create`. Null is ignored.
///
/// # Safety
/// `handle` must come from `microtouch_create` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn microtouch_destroy(handle: *mut MicrotouchHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Processes one row major frame of `frame_len` samples and writes one
/// `[x, y, z, dz, age]` row per touch to `output`. Returns the number of
/// active touches, or a negative status.
///
/// # Safety
/// `frame` must point to `frame_len` readable floats and `output` to
/// `output_len` writable floats.
#[no_mangle]
pub unsafe extern "C" fn microtouch_process(
    handle: *mut MicrotouchHandle,
    frame: *const f32,
    frame_len: usize,
    output: *mut f32,
    output_len: usize,
) -> i32 {
    let handle = match handle.as_mut() {
        Some(handle) => handle,
        None => return MICROTOUCH_NULL_HANDLE,
    };
    if frame.is_null() {
        return MICROTOUCH_BAD_FRAME;
    }
    if output.is_null() {
        return MICROTOUCH_DISABLED;
    }
    let frame = std::slice::from_raw_parts(frame, frame_len);
    let output = std::slice::from_raw_parts_mut(output, output_len);
    match handle.tracker.process(&mut handle.state, frame, output) {
        FrameStatus::Tracked { active } => active as i32,
        FrameStatus::Calibrating { .. } => MICROTOUCH_CALIBRATING,
        FrameStatus::Disabled => MICROTOUCH_DISABLED,
        FrameStatus::BadFrame => MICROTOUCH_BAD_FRAME,
    }
}

/// Sets the pressure thresholds. Returns 0, or -1 if `off` is not positive
/// and below `on`.
///
/// # Safety
/// `handle` must be null or come from `microtouch_create`.
#[no_mangle]
pub unsafe extern "C" fn microtouch_set_thresholds(handle: *mut MicrotouchHandle, on: f32, off: f32) -> i32 {
    match handle.as_mut() {
        Some(handle) => match handle.tracker.set_thresholds(on, off) {
            Ok(()) => 0,
            Err(_) => -1,
        },
        None => MICROTOUCH_NULL_HANDLE,
    }
}

/// Changes the number of touches and binds an output buffer of
/// `output_len` values, which must hold `max_touches * 5`. Returns the
/// number of touches, clamped to the tracker limit, or `MICROTOUCH_DISABLED`
/// if the buffer is too small. Tracking stays disabled until a later call
/// binds a large enough buffer.
///
/// # Safety
/// `handle` must be null or come from `microtouch_create`.
#[no_mangle]
pub unsafe extern "C" fn microtouch_set_max_touches(
    handle: *mut MicrotouchHandle,
    max_touches: usize,
    output_len: usize,
) -> i32 {
    let handle = match handle.as_mut() {
        Some(handle) => handle,
        None => return MICROTOUCH_NULL_HANDLE,
    };
    // The previous binding is replaced below, so only other errors count here.
    let result = match handle.tracker.set_max_touches(max_touches) {
        Ok(()) | Err(ConfigError::OutputTooSmall { .. }) => handle.tracker.bind_output(output_len),
        Err(error) => Err(error),
    };
    match result {
        Ok(()) => handle.tracker.max_touches() as i32,
        Err(error) => {
            log::warn!("microtouch_set_max_touches: {}", error);
            MICROTOUCH_DISABLED
        }
    }
}

/// Forgets all touches.
///
/// # Safety
/// `handle` must be null or come from `microtouch_create`.
#[no_mangle]
pub unsafe extern "C" fn microtouch_clear(handle: *mut MicrotouchHandle) {
    if let Some(handle) = handle.as_mut() {
        handle.tracker.clear(&mut handle.state);
    }
}

/// Installs a stored normalize map of `width * height` gains. Returns 0, or
/// -1 if the map has the wrong size, in which case neutral gains are used.
///
/// # Safety
/// `gains` must point to `len` readable floats.
#[no_mangle]
pub unsafe extern "C" fn microtouch_set_normalize_map(
    handle: *mut MicrotouchHandle,
    gains: *const f32,
    len: usize,
) -> i32 {
    let handle = match handle.as_mut() {
        Some(handle) => handle,
        None => return MICROTOUCH_NULL_HANDLE,
    };
    let gains = if gains.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(gains, len))
    };
    match handle.tracker.set_calibration_data(gains, None) {
        Ok(()) => 0,
        Err(error) => {
            log::warn!("microtouch_set_normalize_map: {}", error);
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_life_cycle() {
        unsafe {
            let handle = microtouch_create(64, 8, 4);
            assert!(!handle.is_null());

            let mut frame = vec![0.0f32; 64 * 8];
            frame[4 * 64 + 20] = 1.0;
            let mut output = vec![0.0f32; 4 * OUTPUT_COLUMNS];
            let mut active = 0;
            for _ in 0..20 {
                active = microtouch_process(handle, frame.as_ptr(), frame.len(), output.as_mut_ptr(), output.len());
            }
            assert_eq!(active, 1);
            assert!(output[4] > 0.0);

            assert_eq!(
                microtouch_process(handle, frame.as_ptr(), 10, output.as_mut_ptr(), output.len()),
                MICROTOUCH_BAD_FRAME
            );
            assert_eq!(
                microtouch_process(handle, frame.as_ptr(), frame.len(), output.as_mut_ptr(), 3),
                MICROTOUCH_DISABLED
            );
            assert_eq!(microtouch_set_thresholds(handle, 0.01, 0.02), -1);
            assert_eq!(microtouch_set_thresholds(handle, 0.03, 0.02), 0);

            microtouch_clear(handle);
            let silence = vec![0.0f32; 64 * 8];
            assert_eq!(
                microtouch_process(handle, silence.as_ptr(), silence.len(), output.as_mut_ptr(), output.len()),
                0
            );
            microtouch_destroy(handle);
        }
    }

    #[test]
    fn test_set_max_touches_binds_output() {
        unsafe {
            let handle = microtouch_create(64, 8, 2);
            assert!(!handle.is_null());
            let frame = vec![0.0f32; 64 * 8];
            let mut output = vec![0.0f32; 4 * OUTPUT_COLUMNS];

            assert_eq!(
                microtouch_set_max_touches(handle, 4, 4 * OUTPUT_COLUMNS - 1),
                MICROTOUCH_DISABLED
            );
            assert_eq!(
                microtouch_process(handle, frame.as_ptr(), frame.len(), output.as_mut_ptr(), output.len()),
                MICROTOUCH_DISABLED
            );

            assert_eq!(microtouch_set_max_touches(handle, 4, output.len()), 4);
            assert_eq!(
                microtouch_process(handle, frame.as_ptr(), frame.len(), output.as_mut_ptr(), output.len()),
                0
            );
            assert_eq!(
                microtouch_set_max_touches(ptr::null_mut(), 4, output.len()),
                MICROTOUCH_NULL_HANDLE
            );
            microtouch_destroy(handle);
        }
    }

    #[test]
    fn test_rejected_config() {
        assert!(microtouch_create(2, 8, 4).is_null());
        assert!(microtouch_create(64, 8, 100).is_null());
        unsafe {
            assert_eq!(microtouch_set_thresholds(ptr::null_mut(), 0.03, 0.02), MICROTOUCH_NULL_HANDLE);
            microtouch_destroy(ptr::null_mut());
        }
    }
}
