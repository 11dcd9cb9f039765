//! FFI bindings for Synheart Proctor
//!
//! This module provides C-compatible functions for driving the engine from
//! browser shells and mobile apps. Frames and focus notifications cross the
//! boundary as proctor.input_event.v1 JSON records. All functions use C
//! strings (null-terminated) and return allocated memory that must be freed
//! by the caller using `proctor_free_string`.
//!
//! Session handles are not thread-safe; serialize calls per handle.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::ProctorConfig;
use crate::error::ProctorError;
use crate::replay::{replay_ndjson, ReplaySession};
use crate::schema::InputEventAdapter;

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

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// NULL selects the default configuration
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<ProctorConfig, ProctorError> {
    if config_json.is_null() {
        return Ok(ProctorConfig::default());
    }
    match cstr_to_string(config_json) {
        Some(json) => ProctorConfig::from_json(&json),
        None => Err(ProctorError::InvalidConfig(
            "config is not valid UTF-8".to_string(),
        )),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay an NDJSON recording and return the report text.
///
/// # Safety
/// - `ndjson` and `student_id` must be valid null-terminated C strings.
/// - `config_json` must be a valid null-terminated C string or NULL.
/// - Returns a newly allocated string that must be freed with `proctor_free_string`.
/// - Returns NULL on error; call `proctor_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn proctor_replay_ndjson(
    ndjson: *const c_char,
    student_id: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let ndjson_str = match cstr_to_string(ndjson) {
        Some(s) => s,
        None => {
            set_last_error("Invalid NDJSON string pointer");
            return ptr::null_mut();
        }
    };

    let student_str = match cstr_to_string(student_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid student_id string pointer");
            return ptr::null_mut();
        }
    };

    let config = match config_from_ptr(config_json) {
        Ok(c) => c,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match replay_ndjson(&ndjson_str, &student_str, &config) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to a running session
pub struct ProctorSessionHandle {
    session: ReplaySession,
}

/// Start a new monitoring session.
///
/// # Safety
/// - `student_id` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string or NULL.
/// - Returns a pointer that must be freed with `proctor_session_free`.
/// - Returns NULL on error; call `proctor_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_new(
    student_id: *const c_char,
    config_json: *const c_char,
) -> *mut ProctorSessionHandle {
    clear_last_error();

    let student_str = match cstr_to_string(student_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid student_id string pointer");
            return ptr::null_mut();
        }
    };

    let config = match config_from_ptr(config_json) {
        Ok(c) => c,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match ReplaySession::start(&student_str, config) {
        Ok(session) => Box::into_raw(Box::new(ProctorSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session, releasing it if it is still running.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `proctor_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_free(handle: *mut ProctorSessionHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Push one proctor.input_event.v1 record.
///
/// Returns the live status as JSON for frame records and the JSON literal
/// `null` for focus records.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `proctor_session_new`.
/// - `event_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `proctor_free_string`.
/// - Returns NULL on error; call `proctor_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_push(
    handle: *mut ProctorSessionHandle,
    event_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &mut *handle;

    let event_str = match cstr_to_string(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return ptr::null_mut();
        }
    };

    let result = InputEventAdapter::parse_line(&event_str, 1)
        .and_then(|event| {
            event.ok_or_else(|| ProctorError::ParseError("empty event".to_string()))
        })
        .and_then(|event| handle.session.push(&event))
        .and_then(|status| serde_json::to_string(&status).map_err(ProctorError::from));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Entries logged so far, as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `proctor_session_new`.
/// - Returns a newly allocated string that must be freed with `proctor_free_string`.
/// - Returns NULL on error; call `proctor_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_entries(handle: *mut ProctorSessionHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &*handle;

    match serde_json::to_string(handle.session.controller().entries()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Stop the session and return the report text.
///
/// `end_ms` is the stop timestamp on the event clock; pass a negative value
/// to stop at the last pushed event. Calling it again returns the same text.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `proctor_session_new`.
/// - Returns a newly allocated string that must be freed with `proctor_free_string`.
/// - Returns NULL on error; call `proctor_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_stop(
    handle: *mut ProctorSessionHandle,
    end_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &mut *handle;
    let end = if end_ms < 0 { None } else { Some(end_ms) };

    match handle.session.finish(end) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// JSON summary of a stopped session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `proctor_session_new`.
/// - Returns a newly allocated string that must be freed with `proctor_free_string`.
/// - Returns NULL on error; call `proctor_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn proctor_session_summary(handle: *mut ProctorSessionHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &*handle;

    match handle.session.summary_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Proctor functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Proctor function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn proctor_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Proctor function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn proctor_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn proctor_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        proctor_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_replay_ndjson() {
        let ndjson = CString::new(
            r#"{"schema_version":"proctor.input_event.v1","timestamp_ms":45000,"kind":"page_hidden"}"#,
        )
        .unwrap();
        let student = CString::new("STU-9").unwrap();

        unsafe {
            let report = take_string(proctor_replay_ndjson(
                ndjson.as_ptr(),
                student.as_ptr(),
                ptr::null(),
            ));
            assert!(report.starts_with("EXAM INTEGRITY REPORT\nStudent ID: STU-9\n"));
            assert!(report.contains("TAB_SWITCH"));
        }
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        let student = CString::new("STU-9").unwrap();
        let config = CString::new(r#"{"gaze_tolerance_ms": 1000}"#).unwrap();

        unsafe {
            let handle = proctor_session_new(student.as_ptr(), config.as_ptr());
            assert!(!handle.is_null());

            let frame = CString::new(
                r#"{"schema_version":"proctor.input_event.v1","timestamp_ms":0,"kind":"frame","faces":[]}"#,
            )
            .unwrap();
            let status = take_string(proctor_session_push(handle, frame.as_ptr()));
            assert!(status.contains("User Missing"));

            let blur = CString::new(
                r#"{"schema_version":"proctor.input_event.v1","timestamp_ms":2000,"kind":"window_blur"}"#,
            )
            .unwrap();
            assert_eq!(take_string(proctor_session_push(handle, blur.as_ptr())), "null");

            let entries = take_string(proctor_session_entries(handle));
            assert!(entries.contains("tab_switch"));

            // Summary is only available once stopped
            assert!(proctor_session_summary(handle).is_null());

            let report = take_string(proctor_session_stop(handle, 61_000));
            assert!(report.contains("[01:01] | SYSTEM"));
            assert_eq!(take_string(proctor_session_stop(handle, -1)), report);

            let summary = take_string(proctor_session_summary(handle));
            assert!(summary.contains("\"total_events\": 2"));

            proctor_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let student = CString::new("STU-9").unwrap();
        let bad_config = CString::new(r#"{"max_faces": 1}"#).unwrap();

        unsafe {
            assert!(proctor_session_new(student.as_ptr(), bad_config.as_ptr()).is_null());
            let error = proctor_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("max_faces"));

            let handle = proctor_session_new(student.as_ptr(), ptr::null());
            let garbage = CString::new("not json").unwrap();
            assert!(proctor_session_push(handle, garbage.as_ptr()).is_null());
            assert!(!proctor_last_error().is_null());

            assert!(proctor_session_push(ptr::null_mut(), garbage.as_ptr()).is_null());
            proctor_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = proctor_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
