//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! `FfiHttpLib` is the opaque library handle; it owns the client plus the
//! diagnostics of the most recent request. `FfiTarget` borrows C strings for
//! the duration of one call. Conversion helpers live here to keep `lib.rs`
//! focused on the `extern "C"` surface.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use palmhttp_core::{Exchange, HttpClient, HttpError, Target};
use tracing::warn;

/// Opaque handle returned by `palmhttp_lib_start`. C callers pass it back
/// into every request function and release it with `palmhttp_lib_stop`.
pub struct FfiHttpLib {
    pub(crate) inner: HttpClient,
    pub(crate) last_status: u16,
    pub(crate) last_error: Option<CString>,
}

impl FfiHttpLib {
    pub(crate) fn new(inner: HttpClient) -> Self {
        Self {
            inner,
            last_status: 0,
            last_error: None,
        }
    }

    /// Remember the outcome of a request and map it to a result code.
    pub(crate) fn record(&mut self, exchange: Exchange) -> FfiHttpErr {
        self.last_status = exchange.status_code.unwrap_or(0);
        match exchange.result {
            Ok(_) => {
                self.last_error = None;
                FfiHttpErr::Ok
            }
            Err(err) => {
                warn!(error = %err, status = self.last_status, "request failed");
                let code = FfiHttpErr::from(&err);
                self.fail(err.to_string());
                code
            }
        }
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.last_error = Some(CString::new(message).unwrap_or_default());
    }
}

/// Result codes returned by the request functions.
///
/// The first four values keep the numbering older callers switch on.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpErr {
    Ok = 0,
    ConnectError = 1,
    BuildError = 2,
    SizeMismatch = 3,
    Transport = 4,
    Malformed = 5,
    Sink = 6,
    NullArg = 7,
    Panic = 8,
}

impl From<&HttpError> for FfiHttpErr {
    fn from(err: &HttpError) -> Self {
        match err {
            HttpError::Connect { .. } => FfiHttpErr::ConnectError,
            HttpError::Build(_) => FfiHttpErr::BuildError,
            HttpError::SizeMismatch { .. } => FfiHttpErr::SizeMismatch,
            HttpError::Transport(_) => FfiHttpErr::Transport,
            HttpError::MalformedResponse(_) => FfiHttpErr::Malformed,
            HttpError::Sink(_) => FfiHttpErr::Sink,
        }
    }
}

/// A request target described with borrowed C strings.
///
/// A null `path` means `/`. The strings must stay valid for the call.
#[repr(C)]
pub struct FfiTarget {
    pub host: *const c_char,
    pub port: u16,
    pub path: *const c_char,
}

impl FfiTarget {
    /// Copy the borrowed fields into an owned `Target`.
    ///
    /// # Safety
    /// Non-null `host` and `path` must point to NUL-terminated strings.
    pub(crate) unsafe fn to_core(&self) -> Result<Target, String> {
        if self.host.is_null() {
            return Err("null argument: target.host".to_string());
        }
        let host = unsafe { c_str(self.host) }?;
        let path = if self.path.is_null() {
            "/"
        } else {
            unsafe { c_str(self.path) }?
        };
        Ok(Target::new(host, self.port, path))
    }
}

/// # Safety
/// `s` must be non-null and NUL-terminated.
pub(crate) unsafe fn c_str<'a>(s: *const c_char) -> Result<&'a str, String> {
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|e| format!("argument is not valid UTF-8: {e}"))
}
