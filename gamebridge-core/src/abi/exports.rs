//! C ABI exports: the public surface consumed by native hosts.
//!
//! All functions are `extern "C"` and `#[no_mangle]`. The platform SDK allows
//! one instance per process, so there is a single facade slot; handles are
//! opaque `u64` ids that are never reused, so a handle from before a
//! shutdown is rejected with `InvalidHandle` rather than aliasing a new one.
//!
//! Host callbacks run inside `gb_pump` on the calling thread. While a pump is
//! running the slot is checked out, and `gb_*` calls made from inside a
//! callback fail with `Internal` instead of deadlocking.

use std::ffi::{CStr, CString, c_char, c_void};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::abi::callback::{CallbackSink, EventCallback};
use crate::abi::envelope::EventEnvelope;
use crate::abi::status::FfiResult;
use crate::bridge::SubscriptionId;
use crate::config::BindingConfig;
use crate::error::BindingError;
use crate::event::EventType;
use crate::facade::Facade;

#[derive(Default)]
struct Slot {
    /// Exported handle and the facade behind it.
    live: Option<(u64, Facade)>,
    pumping: bool,
    shut_down: bool,
}

static SLOT: Lazy<Mutex<Slot>> = Lazy::new(|| Mutex::new(Slot::default()));

/// Monotonic handle counter.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Status of the most recent failing call (or `Ok`).
static LAST_ERROR: AtomicI32 = AtomicI32::new(FfiResult::Ok as i32);

/// Helper: read a C string pointer into a Rust String, returning None on null or invalid UTF-8.
unsafe fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok().map(String::from)
}

fn ok() -> i32 {
    LAST_ERROR.store(FfiResult::Ok as i32, Ordering::Relaxed);
    FfiResult::Ok as i32
}

fn fail(code: FfiResult) -> i32 {
    LAST_ERROR.store(code as i32, Ordering::Relaxed);
    code as i32
}

fn report(op: &str, err: &BindingError) -> i32 {
    tracing::error!("{op}: {err}");
    fail(FfiResult::from(err))
}

/// Run `f` against the live facade if `handle` names it.
fn with_facade<R>(
    op: &str,
    handle: u64,
    f: impl FnOnce(&mut Facade) -> Result<R, BindingError>,
) -> Result<R, FfiResult> {
    let mut slot = SLOT.lock();
    if slot.pumping {
        tracing::error!("{op}: called from inside gb_pump");
        return Err(FfiResult::Internal);
    }
    let Some((live, facade)) = slot.live.as_mut() else {
        return Err(FfiResult::NotInitialized);
    };
    if *live != handle {
        return Err(FfiResult::InvalidHandle);
    }
    f(facade).map_err(|e| {
        tracing::error!("{op}: {e}");
        FfiResult::from(&e)
    })
}

fn init_with(app_id: u32, config: &BindingConfig) -> u64 {
    let mut slot = SLOT.lock();
    if slot.pumping {
        tracing::error!("gb_init: called from inside gb_pump");
        fail(FfiResult::Internal);
        return 0;
    }
    if slot.live.is_some() {
        report("gb_init", &BindingError::AlreadyInitialized);
        return 0;
    }
    if slot.shut_down && !config.allow_reinit {
        report("gb_init", &BindingError::AlreadyShutdown);
        return 0;
    }

    match Facade::with_config(app_id, config) {
        Ok(facade) => {
            let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
            slot.live = Some((handle, facade));
            tracing::debug!("gb_init: app {app_id} -> handle {handle}");
            ok();
            handle
        }
        Err(e) => {
            report("gb_init", &e);
            0
        }
    }
}

// ─── Lifecycle ───────────────────────────────────────────────────────

/// Initialize the binding for `app_id`, loading configuration from
/// `$GAMEBRIDGE_CONFIG` or the default config file.
///
/// Returns a non-zero handle on success, or 0 on failure (see `gb_last_error`).
#[unsafe(no_mangle)]
pub extern "C" fn gb_init(app_id: u32) -> u64 {
    let config = BindingConfig::load(None).unwrap_or_else(|e| {
        tracing::warn!("gb_init: {e:#}, using defaults");
        BindingConfig::default()
    });
    init_with(app_id, &config)
}

/// Initialize the binding from a JSON configuration string.
///
/// # Safety
///
/// `config_json` must be a valid, NUL-terminated UTF-8 C string, or null.
///
/// Config JSON schema (every field optional):
/// ```json
/// {
///   "pump_interval_ms": 33,
///   "allow_reinit": false,
///   "loopback": { "persona_name": "Tester", "accepted_app_ids": [480] }
/// }
/// ```
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gb_init_with_config(app_id: u32, config_json: *const c_char) -> u64 {
    let Some(json_str) = (unsafe { read_c_str(config_json) }) else {
        tracing::error!("gb_init_with_config: null or invalid config_json");
        fail(FfiResult::InvalidArgument);
        return 0;
    };
    let config: BindingConfig = match serde_json::from_str(&json_str) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("gb_init_with_config: invalid JSON: {e}");
            fail(FfiResult::InvalidArgument);
            return 0;
        }
    };
    init_with(app_id, &config)
}

/// Shut the binding down and release the native handle.
///
/// Queued events are discarded. A second call returns `AlreadyShutdown`.
#[unsafe(no_mangle)]
pub extern "C" fn gb_shutdown(handle: u64) -> i32 {
    let mut slot = SLOT.lock();
    if slot.pumping {
        tracing::error!("gb_shutdown: called from inside gb_pump");
        return fail(FfiResult::Internal);
    }
    match slot.live.take() {
        Some((live, mut facade)) if live == handle => {
            slot.shut_down = true;
            match facade.shutdown() {
                Ok(()) => ok(),
                Err(e) => report("gb_shutdown", &e),
            }
        }
        Some(other) => {
            slot.live = Some(other);
            fail(FfiResult::InvalidHandle)
        }
        None => fail(FfiResult::AlreadyShutdown),
    }
}

/// Status code of the most recent failing call, or `Ok`.
#[unsafe(no_mangle)]
pub extern "C" fn gb_last_error() -> i32 {
    LAST_ERROR.load(Ordering::Relaxed)
}

// ─── Local player ────────────────────────────────────────────────────

/// Display name of the local player (empty when unknown).
///
/// Returns a heap-allocated C string that must be freed with `gb_free_string`,
/// or null on error.
#[unsafe(no_mangle)]
pub extern "C" fn gb_localplayer_get_name(handle: u64) -> *mut c_char {
    match with_facade("gb_localplayer_get_name", handle, |f| f.localplayer().get_name()) {
        Ok(name) => {
            ok();
            // Names never contain NUL; if one did, hand back what precedes it.
            let name = name.split('\0').next().unwrap_or_default().to_string();
            CString::new(name).map_or(std::ptr::null_mut(), CString::into_raw)
        }
        Err(code) => {
            fail(code);
            std::ptr::null_mut()
        }
    }
}

// ─── Overlay ─────────────────────────────────────────────────────────

/// Ask the overlay to open `url`. Fire-and-forget: `Ok` means forwarded.
///
/// # Safety
///
/// `url` must be a valid, NUL-terminated UTF-8 C string, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gb_overlay_activate_to_web_page(handle: u64, url: *const c_char) -> i32 {
    let url = unsafe { read_c_str(url) };
    let result = with_facade("gb_overlay_activate_to_web_page", handle, |f| {
        let url = url.ok_or_else(|| BindingError::InvalidArgument("url is null".to_string()))?;
        f.overlay().activate_to_web_page(&url)
    });
    match result {
        Ok(()) => ok(),
        Err(code) => fail(code),
    }
}

// ─── Events ──────────────────────────────────────────────────────────

/// Register `cb` for native events with tag `event_tag`.
///
/// The callback is invoked from `gb_pump` only, with an `EventEnvelope` JSON
/// document whose `seq` follows native raise order across all event types.
/// It must not call any `gb_*` function.
///
/// Returns the subscription id (> 0), or a negated `FfiResult` code.
///
/// # Safety
///
/// `cb` must be a valid function pointer or null. `user_data` must remain
/// valid until `gb_unsubscribe` or `gb_shutdown`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gb_subscribe(
    handle: u64,
    event_tag: i32,
    cb: Option<EventCallback>,
    user_data: *mut c_void,
) -> i64 {
    let result = with_facade("gb_subscribe", handle, |f| {
        let cb = cb.ok_or_else(|| BindingError::InvalidArgument("callback is null".to_string()))?;
        let sink = CallbackSink::new(cb, user_data);
        f.subscribe_sequenced(EventType::from_tag(event_tag), move |seq, event| {
            let json = serde_json::to_string(&EventEnvelope::new(seq, event_tag, event))?;
            if !sink.dispatch(&json) {
                anyhow::bail!("event #{seq} could not be passed to the host");
            }
            Ok(())
        })
    });
    match result {
        Ok(id) => {
            ok();
            tracing::debug!("gb_subscribe: {id} registered for tag {event_tag}");
            id.as_u64() as i64
        }
        Err(code) => -i64::from(fail(code)),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn gb_unsubscribe(handle: u64, subscription: u64) -> i32 {
    let result = with_facade("gb_unsubscribe", handle, |f| {
        f.unsubscribe(SubscriptionId::from_u64(subscription))
    });
    match result {
        Ok(()) => ok(),
        Err(code) => fail(code),
    }
}

/// Run native callbacks and deliver queued events to host callbacks.
///
/// Returns `PartialDeliveryFailure` if any callback could not be invoked;
/// every other event is still delivered.
#[unsafe(no_mangle)]
pub extern "C" fn gb_pump(handle: u64) -> i32 {
    let (live, mut facade) = {
        let mut slot = SLOT.lock();
        if slot.pumping {
            tracing::error!("gb_pump: called from inside gb_pump");
            return fail(FfiResult::Internal);
        }
        match slot.live.take() {
            Some((live, facade)) if live == handle => {
                slot.pumping = true;
                (live, facade)
            }
            Some(other) => {
                slot.live = Some(other);
                return fail(FfiResult::InvalidHandle);
            }
            None => return fail(FfiResult::NotInitialized),
        }
    };

    let result = facade.pump_all();

    {
        let mut slot = SLOT.lock();
        slot.live = Some((live, facade));
        slot.pumping = false;
    }

    match result {
        Ok(dispatched) => {
            tracing::trace!("gb_pump: {} event(s)", dispatched.len());
            ok()
        }
        Err(e) => report("gb_pump", &e),
    }
}

// ─── Memory ──────────────────────────────────────────────────────────

/// Free a string previously returned by a `gb_*` function.
///
/// # Safety
///
/// `ptr` must have been returned by a `gb_*` function and not yet freed, or be null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gb_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// Drop the live facade and forget any earlier shutdown.
#[cfg(test)]
pub(crate) fn reset_for_tests() {
    let mut slot = SLOT.lock();
    slot.live = None;
    slot.pumping = false;
    slot.shut_down = false;
    LAST_ERROR.store(FfiResult::Ok as i32, Ordering::Relaxed);
}
