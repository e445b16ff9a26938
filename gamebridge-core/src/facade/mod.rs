//! Binding facade: the surface a host programs against.
//!
//! ```no_run
//! let mut client = gamebridge_core::init(480)?;
//! let name = client.localplayer().get_name()?;
//! client.overlay().activate_to_web_page("https://www.example.com/")?;
//! for event in client.pump()? {
//!     println!("{name}: {:?}", event.event);
//! }
//! # Ok::<(), gamebridge_core::BindingError>(())
//! ```
//!
//! State machine: `Uninitialized -> Initialized -> ShuttingDown -> Shutdown`.
//! Every operation except `init` requires `Initialized`.

mod localplayer;
mod overlay;
mod stats;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gamebridge_native::{LoopbackSdk, NativeSdk, RawHandle};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::MissedTickBehavior;

pub use localplayer::{LocalPlayer, PlayerId};
pub use overlay::Overlay;
pub use stats::{PendingCall, Stats};

use crate::bridge::{CallbackBridge, DispatchedEvent, Pump, SubscriptionId};
use crate::config::BindingConfig;
use crate::error::BindingError;
use crate::event::{DomainEvent, EventType};
use crate::registry::{HandleId, HandleRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FacadeState {
    Uninitialized,
    Initialized,
    ShuttingDown,
    Shutdown,
}

/// Runtime shared by every facade built through [`init`] or
/// [`Facade::with_config`], the C ABI included. It keeps one live instance
/// per process; a fresh runtime replaces it only once that instance is gone.
static RUNTIME: Lazy<Mutex<Option<Arc<LoopbackSdk>>>> = Lazy::new(|| Mutex::new(None));

/// Serializes tests that go through the process-wide runtime.
#[cfg(test)]
pub(crate) static RUNTIME_TEST_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Start the binding for `app_id` against the process-wide runtime.
///
/// Fails with `AlreadyInitialized` while another facade holds it.
///
/// No pump is started: the host either calls [`Facade::pump`] on its own
/// cadence or drives [`Facade::run_pump_loop`] from its tokio runtime.
pub fn init(app_id: u32) -> Result<Facade, BindingError> {
    Facade::with_config(app_id, &BindingConfig::default())
}

pub struct Facade {
    state: FacadeState,
    registry: HandleRegistry,
    bridge: CallbackBridge,
    handle: Option<HandleId>,
    app_id: Option<u32>,
    allow_reinit: bool,
    pump_interval: Duration,
}

impl Facade {
    /// An uninitialized facade over `native`.
    pub fn new(native: Arc<dyn NativeSdk>, config: &BindingConfig) -> Self {
        Self {
            state: FacadeState::Uninitialized,
            registry: HandleRegistry::new(native),
            bridge: CallbackBridge::new(),
            handle: None,
            app_id: None,
            allow_reinit: config.allow_reinit,
            pump_interval: config.pump_interval(),
        }
    }

    /// Initialize against the process-wide runtime.
    ///
    /// `config.loopback` takes effect when no facade is live; otherwise the
    /// live runtime is reused and this fails with `AlreadyInitialized`.
    pub fn with_config(app_id: u32, config: &BindingConfig) -> Result<Self, BindingError> {
        // Held across native init so two callers cannot both get a fresh runtime.
        let mut runtime = RUNTIME.lock();
        let native = match runtime.as_ref() {
            Some(live) if live.is_running() => Arc::clone(live),
            _ => {
                let fresh = Arc::new(LoopbackSdk::new(config.loopback.clone()));
                *runtime = Some(Arc::clone(&fresh));
                fresh
            }
        };
        Self::with_native(app_id, native, config)
    }

    /// Initialize against a caller-supplied native SDK.
    pub fn with_native(
        app_id: u32,
        native: Arc<dyn NativeSdk>,
        config: &BindingConfig,
    ) -> Result<Self, BindingError> {
        let mut facade = Self::new(native, config);
        facade.init(app_id)?;
        Ok(facade)
    }

    /// Acquire the native handle and attach the callback bridge.
    ///
    /// Events queue from here on but reach listeners only when pumped; see
    /// [`Facade::run_pump_loop`].
    pub fn init(&mut self, app_id: u32) -> Result<HandleId, BindingError> {
        match self.state {
            FacadeState::Uninitialized => {}
            FacadeState::Initialized => return Err(BindingError::AlreadyInitialized),
            FacadeState::ShuttingDown => return Err(BindingError::AlreadyShutdown),
            FacadeState::Shutdown if !self.allow_reinit => return Err(BindingError::AlreadyShutdown),
            FacadeState::Shutdown => {}
        }

        let handle = self.registry.acquire(app_id)?;
        if let Err(e) = self.bridge.attach(&self.registry, handle) {
            let _ = self.registry.release(handle);
            return Err(e);
        }
        self.handle = Some(handle);
        self.app_id = Some(app_id);
        self.state = FacadeState::Initialized;
        tracing::info!("gamebridge initialized for app {app_id} ({handle})");
        Ok(handle)
    }

    pub fn state(&self) -> FacadeState {
        self.state
    }

    /// The live handle, or `NotInitialized`.
    pub fn handle(&self) -> Result<HandleId, BindingError> {
        match (self.state, self.handle) {
            (FacadeState::Initialized, Some(handle)) => Ok(handle),
            _ => Err(BindingError::NotInitialized),
        }
    }

    pub fn app_id(&self) -> Option<u32> {
        self.app_id
    }

    pub fn pump_interval(&self) -> Duration {
        self.pump_interval
    }

    pub fn localplayer(&self) -> LocalPlayer<'_> {
        LocalPlayer::new(self)
    }

    pub fn overlay(&self) -> Overlay<'_> {
        Overlay::new(self)
    }

    pub fn stats(&self) -> Stats<'_> {
        Stats::new(self)
    }

    pub fn subscribe(
        &mut self,
        event_type: EventType,
        listener: impl FnMut(&DomainEvent) -> anyhow::Result<()> + Send + 'static,
    ) -> Result<SubscriptionId, BindingError> {
        self.handle()?;
        Ok(self.bridge.subscribe(event_type, listener))
    }

    /// Subscribe with access to each event's raise sequence number.
    pub fn subscribe_sequenced(
        &mut self,
        event_type: EventType,
        listener: impl FnMut(u64, &DomainEvent) -> anyhow::Result<()> + Send + 'static,
    ) -> Result<SubscriptionId, BindingError> {
        self.handle()?;
        Ok(self.bridge.subscribe_sequenced(event_type, listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Result<(), BindingError> {
        self.handle()?;
        self.bridge.unsubscribe(id)
    }

    /// Run native callbacks and return a lazy pump over the queued events.
    pub fn pump(&mut self) -> Result<Pump<'_>, BindingError> {
        self.handle()?;
        self.bridge.pump(&self.registry)
    }

    pub fn pump_all(&mut self) -> Result<Vec<DispatchedEvent>, BindingError> {
        self.handle()?;
        self.bridge.pump_all(&self.registry)
    }

    /// Pump every `pump_interval` on the current tokio runtime until `stop`
    /// completes. Listener failures are logged and do not end the loop.
    pub async fn run_pump_loop<F>(&mut self, stop: F) -> Result<(), BindingError>
    where
        F: Future<Output = ()>,
    {
        self.handle()?;
        let mut ticker = tokio::time::interval(self.pump_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => return Ok(()),
                _ = ticker.tick() => match self.pump_all() {
                    Ok(_) => {}
                    Err(BindingError::PartialDeliveryFailure { failures }) => {
                        for failure in &failures {
                            tracing::warn!(
                                "listener {} failed on #{}: {}",
                                failure.subscription,
                                failure.seq,
                                failure.message
                            );
                        }
                    }
                    Err(e) => return Err(e),
                },
            }
        }
    }

    /// Unregister callbacks, discard queued events, release the native handle.
    pub fn shutdown(&mut self) -> Result<(), BindingError> {
        if self.state != FacadeState::Initialized {
            return Err(BindingError::AlreadyShutdown);
        }
        self.state = FacadeState::ShuttingDown;

        let discarded = self.bridge.detach(&self.registry);
        let released = match self.handle.take() {
            Some(handle) => self.registry.release(handle),
            None => Ok(()),
        };
        self.state = FacadeState::Shutdown;
        tracing::info!("gamebridge shut down ({discarded} queued event(s) discarded)");
        released
    }

    /// Run `f` against the native SDK if the facade is initialized.
    pub(crate) fn call<R>(
        &self,
        f: impl FnOnce(&dyn NativeSdk, RawHandle) -> R,
    ) -> Result<R, BindingError> {
        let handle = self.handle()?;
        self.registry.with_raw(handle, f)
    }

    pub(crate) fn bridge(&self) -> &CallbackBridge {
        &self.bridge
    }
}

impl Drop for Facade {
    fn drop(&mut self) {
        if self.state == FacadeState::Initialized {
            if let Err(e) = self.shutdown() {
                tracing::warn!("gamebridge shutdown on drop failed: {e}");
            }
        }
    }
}
