//! FFI bindings for Pulsetrace
//!
//! This module provides C-compatible functions for driving the processor
//! from a host application. Processors are opaque handles created with
//! [`pulsetrace_new`] and released with [`pulsetrace_free`]; JSON accessors
//! return allocated strings that must be freed with
//! [`pulsetrace_free_string`].

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::processor::EcgProcessor;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize a value to a newly allocated JSON C string.
fn to_json_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Processor Lifecycle
// ============================================================================

/// Create a processor for signals sampled at `sampling_rate` Hz.
///
/// # Safety
/// - The returned handle must be freed with `pulsetrace_free`.
/// - Returns NULL on a non-positive sampling rate; call
///   `pulsetrace_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_new(sampling_rate: f64) -> *mut EcgProcessor {
    clear_last_error();

    match EcgProcessor::new(sampling_rate) {
        Ok(processor) => Box::into_raw(Box::new(processor)),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor created with `pulsetrace_new`.
///
/// # Safety
/// - `processor` must be a valid handle returned by `pulsetrace_new`, or NULL.
/// - After calling this function, the handle is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_free(processor: *mut EcgProcessor) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Reset the processor to a fresh session on the same configuration.
///
/// # Safety
/// - `processor` must be a valid handle returned by `pulsetrace_new`.
/// - Must not be called while `pulsetrace_process_sample` is running on the
///   same handle.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_reset(processor: *mut EcgProcessor) {
    if let Some(p) = processor.as_mut() {
        p.reset();
    }
}

// ============================================================================
// Sample Processing
// ============================================================================

/// Process one raw sample.
///
/// Writes the smoothed display value to `out_filtered` (when non-NULL) and
/// returns 1 if the sample was accepted as an R-peak, 0 if not, -1 on a NULL
/// handle.
///
/// # Safety
/// - `processor` must be a valid handle returned by `pulsetrace_new`.
/// - `out_filtered` must be NULL or point to writable memory for one f64.
/// - Samples must be delivered from a single thread, in temporal order.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_process_sample(
    processor: *mut EcgProcessor,
    raw: f64,
    out_filtered: *mut f64,
) -> i32 {
    let Some(p) = processor.as_mut() else {
        set_last_error("NULL processor handle");
        return -1;
    };

    let (filtered, is_peak) = p.process_sample(raw);
    if !out_filtered.is_null() {
        *out_filtered = filtered;
    }
    i32::from(is_peak)
}

/// Current windowed-average heart rate in bpm; 0 while no RR data exists.
///
/// # Safety
/// - `processor` must be a valid handle returned by `pulsetrace_new`.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_calculate_bpm(processor: *const EcgProcessor) -> f64 {
    match processor.as_ref() {
        Some(p) => p.calculate_bpm(),
        None => 0.0,
    }
}

// ============================================================================
// JSON Accessors
// ============================================================================

/// Full peak history as a JSON array.
///
/// # Safety
/// - `processor` must be a valid handle returned by `pulsetrace_new`.
/// - Returns a newly allocated string that must be freed with
///   `pulsetrace_free_string`; NULL on error.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_detected_peaks_json(
    processor: *const EcgProcessor,
) -> *mut c_char {
    clear_last_error();
    let Some(p) = processor.as_ref() else {
        set_last_error("NULL processor handle");
        return ptr::null_mut();
    };
    to_json_cstr(&p.detected_peaks())
}

/// The most recent `count` peaks as a JSON array.
///
/// # Safety
/// - `processor` must be a valid handle returned by `pulsetrace_new`.
/// - Returns a newly allocated string that must be freed with
///   `pulsetrace_free_string`; NULL on error.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_recent_peaks_json(
    processor: *const EcgProcessor,
    count: usize,
) -> *mut c_char {
    clear_last_error();
    let Some(p) = processor.as_ref() else {
        set_last_error("NULL processor handle");
        return ptr::null_mut();
    };
    to_json_cstr(&p.recent_peaks(count))
}

/// Diagnostic session stats as a JSON object.
///
/// # Safety
/// - `processor` must be a valid handle returned by `pulsetrace_new`.
/// - Returns a newly allocated string that must be freed with
///   `pulsetrace_free_string`; NULL on error.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_session_stats_json(
    processor: *const EcgProcessor,
) -> *mut c_char {
    clear_last_error();
    let Some(p) = processor.as_ref() else {
        set_last_error("NULL processor handle");
        return ptr::null_mut();
    };
    to_json_cstr(&p.session_stats())
}

/// End-of-session summary as a JSON object.
///
/// # Safety
/// - `processor` must be a valid handle returned by `pulsetrace_new`.
/// - Returns a newly allocated string that must be freed with
///   `pulsetrace_free_string`; NULL on error.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_session_summary_json(
    processor: *const EcgProcessor,
) -> *mut c_char {
    clear_last_error();
    let Some(p) = processor.as_ref() else {
        set_last_error("NULL processor handle");
        return ptr::null_mut();
    };
    to_json_cstr(&p.session_summary())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Pulsetrace functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Pulsetrace function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Pulsetrace call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Pulsetrace library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulsetrace_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
