//! Safe wrapper around a host C function pointer used as a listener.

use std::ffi::{CString, c_char, c_void};

/// Host callback signature: receives a UTF-8 JSON string (pointer + length) and opaque user data.
pub type EventCallback =
    unsafe extern "C" fn(json_ptr: *const c_char, json_len: usize, user_data: *mut c_void);

/// Wraps a host event callback with its user_data pointer.
///
/// The host is responsible for keeping the callback and user_data valid until
/// it unsubscribes or shuts the binding down.
pub struct CallbackSink {
    cb: EventCallback,
    user_data: *mut c_void,
}

// Safety: the sink is only ever invoked from `gb_pump`, on the host's pumping
// thread; it merely lives inside the process-wide facade slot.
unsafe impl Send for CallbackSink {}

impl CallbackSink {
    pub fn new(cb: EventCallback, user_data: *mut c_void) -> Self {
        Self { cb, user_data }
    }

    /// Pass a JSON document to the host callback as a NUL-terminated string.
    ///
    /// Returns `false` (and skips the call) if the string has an interior NUL.
    pub fn dispatch(&self, json: &str) -> bool {
        let Ok(cstr) = CString::new(json) else {
            tracing::warn!("event JSON contained interior NUL byte, dropping");
            return false;
        };
        unsafe {
            (self.cb)(cstr.as_ptr(), json.len(), self.user_data);
        }
        true
    }
}
