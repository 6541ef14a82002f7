//! C-ABI wrapper around `palmhttp-core`.
//!
//! # Overview
//! Exposes the blocking HTTP/1.0 client through `extern "C"` functions. A C
//! caller starts the library once, issues GET and POST requests whose bodies
//! are stored in named files, reads back the last status and error text for
//! diagnostics, and stops the library when done.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Requests return an `FfiHttpErr` code; richer detail is kept on the
//!   handle and fetched with `palmhttp_last_status` / `palmhttp_last_error`.
//! - Strings returned to C are owned by the caller and released with
//!   `palmhttp_free_string`. Strings passed in are only borrowed.
//! - `build.rs` writes the C header to `$OUT_DIR/palmhttp.h`, with every
//!   enumerator prefixed by its enum name (`FfiHttpErr_Ok`).

pub mod types;

use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::catch_unwind;

use palmhttp_core::{ClientConfig, FileSink, HttpClient};
use tracing::debug;

use types::*;

// ---------------------------------------------------------------------------
// Library lifecycle
// ---------------------------------------------------------------------------

/// Start the library with a request timeout in seconds.
///
/// Returns null if `timeout_secs` is zero or an internal panic occurs.
/// The caller must release the handle with `palmhttp_lib_stop`.
#[unsafe(no_mangle)]
pub extern "C" fn palmhttp_lib_start(timeout_secs: u64) -> *mut FfiHttpLib {
    catch_unwind(|| match ClientConfig::with_timeout_secs(timeout_secs) {
        Ok(config) => start(config),
        Err(e) => {
            debug!(error = %e, "rejected library configuration");
            std::ptr::null_mut()
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Start the library from a JSON configuration document.
///
/// Missing fields take their defaults. Returns null if `json` is null, is not
/// valid configuration, or an internal panic occurs.
#[unsafe(no_mangle)]
pub extern "C" fn palmhttp_lib_start_with_config(json: *const c_char) -> *mut FfiHttpLib {
    catch_unwind(|| {
        if json.is_null() {
            return std::ptr::null_mut();
        }
        let parsed = unsafe { c_str(json) }
            .and_then(|text| ClientConfig::from_json(text).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => start(config),
            Err(e) => {
                debug!(error = %e, "rejected library configuration");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

fn start(config: ClientConfig) -> *mut FfiHttpLib {
    debug!(timeout_secs = config.timeout_secs, user_agent = %config.user_agent, "library started");
    Box::into_raw(Box::new(FfiHttpLib::new(HttpClient::new(config))))
}

/// Release a handle created by `palmhttp_lib_start*`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn palmhttp_lib_stop(lib: *mut FfiHttpLib) {
    if !lib.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(lib) });
        });
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// GET `target` and store the body in the file at `sink_path`.
///
/// The file is created or truncated once the response headers are complete;
/// on failure any bytes already received stay in it.
#[unsafe(no_mangle)]
pub extern "C" fn palmhttp_get(
    lib: *mut FfiHttpLib,
    target: *const FfiTarget,
    sink_path: *const c_char,
) -> FfiHttpErr {
    catch_unwind(|| {
        if lib.is_null() {
            return FfiHttpErr::NullArg;
        }
        let lib = unsafe { &mut *lib };
        perform(lib, target, sink_path, None)
    })
    .unwrap_or(FfiHttpErr::Panic)
}

/// POST the NUL-terminated `data` to `target` and store the reply body in
/// the file at `sink_path`.
#[unsafe(no_mangle)]
pub extern "C" fn palmhttp_post(
    lib: *mut FfiHttpLib,
    target: *const FfiTarget,
    data: *const c_char,
    sink_path: *const c_char,
) -> FfiHttpErr {
    catch_unwind(|| {
        if lib.is_null() {
            return FfiHttpErr::NullArg;
        }
        let lib = unsafe { &mut *lib };
        if data.is_null() {
            lib.last_status = 0;
            lib.fail("null argument: data".to_string());
            return FfiHttpErr::NullArg;
        }
        let body = unsafe { std::ffi::CStr::from_ptr(data) }.to_bytes();
        perform(lib, target, sink_path, Some(body))
    })
    .unwrap_or(FfiHttpErr::Panic)
}

fn perform(
    lib: &mut FfiHttpLib,
    target: *const FfiTarget,
    sink_path: *const c_char,
    body: Option<&[u8]>,
) -> FfiHttpErr {
    lib.last_status = 0;
    if target.is_null() || sink_path.is_null() || unsafe { (*target).host.is_null() } {
        lib.fail("null argument: target or sink_path".to_string());
        return FfiHttpErr::NullArg;
    }

    let target = match unsafe { (*target).to_core() } {
        Ok(t) => t,
        Err(e) => {
            lib.fail(e);
            return FfiHttpErr::BuildError;
        }
    };
    let path = match unsafe { c_str(sink_path) } {
        Ok(p) => p,
        Err(e) => {
            lib.fail(e);
            return FfiHttpErr::BuildError;
        }
    };

    let mut sink = FileSink::new(path);
    let exchange = match body {
        None => lib.inner.get_exchange(&target, &mut sink),
        Some(body) => lib.inner.post_exchange(&target, body, &mut sink),
    };
    lib.record(exchange)
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Status code of the most recent request, or 0 if no status line was seen.
#[unsafe(no_mangle)]
pub extern "C" fn palmhttp_last_status(lib: *const FfiHttpLib) -> u16 {
    catch_unwind(|| {
        if lib.is_null() {
            return 0;
        }
        unsafe { &*lib }.last_status
    })
    .unwrap_or(0)
}

/// Error text of the most recent request, or null if it succeeded.
///
/// The caller must free the returned string with `palmhttp_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn palmhttp_last_error(lib: *const FfiHttpLib) -> *mut c_char {
    catch_unwind(|| {
        if lib.is_null() {
            return std::ptr::null_mut();
        }
        match &unsafe { &*lib }.last_error {
            Some(msg) => msg.clone().into_raw(),
            None => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn palmhttp_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
