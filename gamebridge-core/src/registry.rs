//! Native handle registry.
//!
//! Owns the one live native handle and hands out [`HandleId`]s in its place.
//! Ids are allocated monotonically and never reused, so a stale id can never
//! alias a newer handle. The raw token is reachable only inside
//! [`HandleRegistry::with_raw`].

use std::fmt;
use std::sync::Arc;

use gamebridge_native::{NativeSdk, NativeStatus, RawHandle};
use serde::Serialize;

use crate::error::BindingError;

/// Opaque, copyable identifier for a live native handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HandleId(u64);

impl HandleId {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

struct Live {
    id: HandleId,
    raw: RawHandle,
}

pub struct HandleRegistry {
    native: Arc<dyn NativeSdk>,
    live: Option<Live>,
    next_id: u64,
}

impl HandleRegistry {
    pub fn new(native: Arc<dyn NativeSdk>) -> Self {
        Self {
            native,
            live: None,
            next_id: 1,
        }
    }

    /// Start the native SDK for `app_id`.
    ///
    /// Fails with `AlreadyInitialized` while a handle is live, even for the
    /// same app id.
    pub fn acquire(&mut self, app_id: u32) -> Result<HandleId, BindingError> {
        if self.live.is_some() {
            return Err(BindingError::AlreadyInitialized);
        }
        let raw = self.native.init(app_id).map_err(|status| match status {
            // Another registry holds the runtime's only instance.
            NativeStatus::AlreadyRunning => BindingError::AlreadyInitialized,
            status => BindingError::NativeInitFailure { app_id, status },
        })?;

        let id = HandleId(self.next_id);
        self.next_id += 1;
        self.live = Some(Live { id, raw });
        tracing::debug!("registry: acquired {id} for app {app_id}");
        Ok(id)
    }

    /// Shut the native SDK down. `id` is dead for every later call.
    pub fn release(&mut self, id: HandleId) -> Result<(), BindingError> {
        match self.live.take() {
            Some(live) if live.id == id => {
                self.native.shutdown(live.raw);
                tracing::debug!("registry: released {id}");
                Ok(())
            }
            other => {
                self.live = other;
                Err(BindingError::InvalidHandle)
            }
        }
    }

    /// Run `f` with the native SDK and the raw token behind `id`.
    ///
    /// Native code is never reached with a released or unknown id.
    pub fn with_raw<R>(
        &self,
        id: HandleId,
        f: impl FnOnce(&dyn NativeSdk, RawHandle) -> R,
    ) -> Result<R, BindingError> {
        match self.live {
            Some(ref live) if live.id == id => Ok(f(self.native.as_ref(), live.raw)),
            _ => Err(BindingError::InvalidHandle),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    pub fn live_handle(&self) -> Option<HandleId> {
        self.live.as_ref().map(|live| live.id)
    }
}

impl Drop for HandleRegistry {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            tracing::debug!("registry: dropping live {}, shutting native down", live.id);
            self.native.shutdown(live.raw);
        }
    }
}
