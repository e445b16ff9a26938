//! Callback bridge: native push callbacks in, pumped listener calls out.
//!
//! Native code may invoke its callback from any stack: its own event loop,
//! a worker thread, or from inside one of our own native calls. None of those
//! are safe places to run managed listeners, so the trampoline only decodes
//! and queues. Listeners run during [`CallbackBridge::pump`], on the thread
//! that pumps, in native raise order.
//!
//! Lifecycle: [`attach`](CallbackBridge::attach) registers the trampoline for
//! a live handle, [`detach`](CallbackBridge::detach) unregisters it and
//! discards anything still queued.

mod pump;
pub(crate) mod queue;

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::ffi::c_void;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use gamebridge_native::ApiCallId;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;

pub use pump::{DispatchedEvent, Pump};

use crate::error::{BindingError, ListenerFailure};
use crate::event::{DomainEvent, EventType};
use crate::registry::{HandleId, HandleRegistry};
use queue::{EventQueue, QueuedEvent, native_trampoline};

/// Managed listener, called with the event's native raise sequence number.
/// Returning an error marks the delivery as failed without affecting any
/// other delivery.
pub type Listener = Box<dyn FnMut(u64, &DomainEvent) -> anyhow::Result<()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

struct Subscription {
    event_type: EventType,
    listener: Listener,
}

pub struct CallbackBridge {
    queue: Arc<EventQueue>,
    // BTreeMap: listeners of one event run in subscription order.
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    next_subscription: u64,
    pending_calls: Mutex<HashMap<ApiCallId, oneshot::Sender<DomainEvent>>>,
    attached: Option<HandleId>,
}

impl Default for CallbackBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackBridge {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(EventQueue::default()),
            subscriptions: BTreeMap::new(),
            next_subscription: 1,
            pending_calls: Mutex::new(HashMap::new()),
            attached: None,
        }
    }

    /// Register the trampoline with the native SDK behind `handle`.
    pub fn attach(&mut self, registry: &HandleRegistry, handle: HandleId) -> Result<(), BindingError> {
        if self.attached.is_some() {
            return Err(BindingError::AlreadyInitialized);
        }
        // Native code owns one strong reference until the callback is cleared.
        let user_data = Arc::into_raw(Arc::clone(&self.queue)) as *mut c_void;
        let registered = registry.with_raw(handle, |native, raw| unsafe {
            native.register_callback(raw, native_trampoline, user_data);
        });
        if let Err(e) = registered {
            unsafe { drop(Arc::from_raw(user_data as *const EventQueue)) };
            return Err(e);
        }
        self.attached = Some(handle);
        tracing::debug!("bridge: attached to {handle}");
        Ok(())
    }

    /// Unregister from native code and discard queued events and pending
    /// calls. Returns the number of events discarded.
    ///
    /// If the handle was already released, native shutdown has cleared the
    /// callback and only the local state is torn down.
    pub fn detach(&mut self, registry: &HandleRegistry) -> usize {
        let Some(handle) = self.attached.take() else {
            return 0;
        };
        let _ = registry.with_raw(handle, |native, raw| native.clear_callback(raw));
        // Safety: `attach` leaked exactly one strong count for native code,
        // and native code can no longer reach it.
        unsafe { Arc::decrement_strong_count(Arc::as_ptr(&self.queue)) };

        let discarded = self.queue.clear();
        self.pending_calls.lock().clear();
        tracing::debug!("bridge: detached from {handle}, discarded {discarded} queued event(s)");
        discarded
    }

    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    pub fn subscribe(
        &mut self,
        event_type: EventType,
        mut listener: impl FnMut(&DomainEvent) -> anyhow::Result<()> + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe_sequenced(event_type, move |_, event| listener(event))
    }

    /// Like [`subscribe`](Self::subscribe), but the listener also receives the
    /// sequence number shared by all event types, in native raise order.
    pub fn subscribe_sequenced(
        &mut self,
        event_type: EventType,
        listener: impl FnMut(u64, &DomainEvent) -> anyhow::Result<()> + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.insert(
            id,
            Subscription {
                event_type,
                listener: Box::new(listener),
            },
        );
        tracing::debug!("bridge: {id} subscribed to {event_type:?}");
        id
    }

    /// Remove a listener. It receives nothing from any later delivery,
    /// including events that were already queued.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Result<(), BindingError> {
        self.subscriptions
            .remove(&id)
            .map(|_| tracing::debug!("bridge: {id} unsubscribed"))
            .ok_or(BindingError::NotFound(id))
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Events waiting for the next pump.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Run native callbacks, then return a pump over everything queued so far.
    pub fn pump(&mut self, registry: &HandleRegistry) -> Result<Pump<'_>, BindingError> {
        let handle = self.attached.ok_or(BindingError::NotInitialized)?;
        registry.with_raw(handle, |native, raw| native.run_callbacks(raw))?;
        let batch = self.queue.take_all();
        Ok(Pump::new(self, batch))
    }

    /// Pump and deliver everything; listener failures are reported after the
    /// whole batch has been delivered.
    pub fn pump_all(&mut self, registry: &HandleRegistry) -> Result<Vec<DispatchedEvent>, BindingError> {
        let mut pump = self.pump(registry)?;
        let dispatched: Vec<_> = pump.by_ref().collect();
        pump.finish()?;
        Ok(dispatched)
    }

    /// Resolve the returned receiver with the event that completes `call_id`.
    pub(crate) fn expect_call(&self, call_id: ApiCallId) -> oneshot::Receiver<DomainEvent> {
        let (tx, rx) = oneshot::channel();
        self.pending_calls.lock().insert(call_id, tx);
        rx
    }

    fn deliver(&mut self, queued: &QueuedEvent, failures: &mut Vec<ListenerFailure>) -> usize {
        if let Some(call_id) = queued.event.call_id() {
            if let Some(tx) = self.pending_calls.lock().remove(&call_id) {
                let _ = tx.send(queued.event.clone());
            }
        }

        let mut invoked = 0;
        for (id, sub) in self
            .subscriptions
            .iter_mut()
            .filter(|(_, sub)| sub.event_type == queued.event_type)
        {
            invoked += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| (sub.listener)(queued.seq, &queued.event)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{e:#}"),
                Err(panic) => panic_message(panic.as_ref()),
            };
            tracing::warn!("bridge: listener {id} failed on #{}: {message}", queued.seq);
            failures.push(ListenerFailure {
                subscription: *id,
                seq: queued.seq,
                event_type: queued.event_type,
                message,
            });
        }
        invoked
    }
}

impl Drop for CallbackBridge {
    fn drop(&mut self) {
        if let Some(handle) = self.attached {
            // Without the registry we cannot unregister; the strong count
            // held by native code is leaked rather than freed under it.
            tracing::warn!("bridge: dropped while attached to {handle}");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("listener panicked: {s}")
    } else {
        "listener panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamebridge_native::{Dialog, LoopbackSdk, OverlayMode};
    use proptest::prelude::*;

    /// (listener label, event) in delivery order.
    type Log = Arc<Mutex<Vec<(&'static str, DomainEvent)>>>;

    fn attached() -> (Arc<LoopbackSdk>, HandleRegistry, CallbackBridge, HandleId) {
        let sdk = Arc::new(LoopbackSdk::default());
        let mut registry = HandleRegistry::new(sdk.clone());
        let handle = registry.acquire(480).unwrap();
        let mut bridge = CallbackBridge::new();
        bridge.attach(&registry, handle).unwrap();
        (sdk, registry, bridge, handle)
    }

    fn recorder(bridge: &mut CallbackBridge, ty: EventType, log: &Log, label: &'static str) -> SubscriptionId {
        let log = Arc::clone(log);
        bridge.subscribe(ty, move |event| {
            log.lock().push((label, event.clone()));
            Ok(())
        })
    }

    fn raise_overlay(registry: &HandleRegistry, handle: HandleId, dialog: Dialog) {
        registry
            .with_raw(handle, |native, raw| native.activate_overlay(raw, dialog))
            .unwrap();
    }

    fn raise_presence(registry: &HandleRegistry, handle: HandleId, value: &str) {
        let accepted = registry
            .with_raw(handle, |native, raw| native.set_rich_presence(raw, "status", Some(value)))
            .unwrap();
        assert!(accepted);
    }

    #[test]
    fn test_pump_without_attach_is_not_initialized() {
        let sdk = Arc::new(LoopbackSdk::default());
        let registry = HandleRegistry::new(sdk);
        let mut bridge = CallbackBridge::new();
        assert!(matches!(bridge.pump(&registry), Err(BindingError::NotInitialized)));
    }

    #[test]
    fn test_events_delivered_only_during_pump() {
        let (_sdk, registry, mut bridge, handle) = attached();
        let log = Log::default();
        recorder(&mut bridge, EventType::PersonaStateChange, &log, "a");

        // The native callback fires synchronously inside this call.
        raise_presence(&registry, handle, "menu");
        assert!(log.lock().is_empty());
        assert_eq!(bridge.queued(), 1);

        let dispatched = bridge.pump_all(&registry).unwrap();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].delivered_to, 1);
        assert_eq!(log.lock().len(), 1);
        bridge.detach(&registry);
    }

    #[test]
    fn test_subscribe_then_unsubscribe_gets_nothing() {
        let (_sdk, registry, mut bridge, handle) = attached();
        let log = Log::default();
        raise_overlay(&registry, handle, Dialog::Friends);
        let sub = recorder(&mut bridge, EventType::OverlayActivated, &log, "a");
        bridge.unsubscribe(sub).unwrap();

        let dispatched = bridge.pump_all(&registry).unwrap();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].delivered_to, 0);
        assert!(log.lock().is_empty());
        assert!(matches!(bridge.unsubscribe(sub), Err(BindingError::NotFound(_))));
        bridge.detach(&registry);
    }

    #[test]
    fn test_sequenced_listeners_share_raise_order() {
        let (_sdk, registry, mut bridge, handle) = attached();
        let seqs = Arc::new(Mutex::new(Vec::new()));
        for ty in [EventType::PersonaStateChange, EventType::OverlayActivated] {
            let seqs = Arc::clone(&seqs);
            bridge.subscribe_sequenced(ty, move |seq, _| {
                seqs.lock().push((ty, seq));
                Ok(())
            });
        }
        raise_presence(&registry, handle, "menu");
        raise_overlay(&registry, handle, Dialog::Friends);
        raise_presence(&registry, handle, "lobby");

        let dispatched = bridge.pump_all(&registry).unwrap();
        let expected: Vec<_> = dispatched.iter().map(|d| (d.event_type, d.seq)).collect();
        assert_eq!(*seqs.lock(), expected);
        assert_eq!(
            expected.iter().map(|(ty, _)| *ty).collect::<Vec<_>>(),
            vec![EventType::PersonaStateChange, EventType::OverlayActivated, EventType::PersonaStateChange]
        );
        assert!(expected.windows(2).all(|w| w[0].1 < w[1].1));
        bridge.detach(&registry);
    }

    #[test]
    fn test_unsubscribe_unknown_is_not_found() {
        let mut bridge = CallbackBridge::new();
        let err = bridge.unsubscribe(SubscriptionId(42)).unwrap_err();
        assert!(matches!(err, BindingError::NotFound(id) if id.as_u64() == 42));
    }

    #[test]
    fn test_failing_listener_does_not_stop_delivery() {
        let (_sdk, registry, mut bridge, handle) = attached();
        let log = Log::default();
        recorder(&mut bridge, EventType::OverlayActivated, &log, "before");

        let mut calls = 0;
        let flaky = bridge.subscribe(EventType::OverlayActivated, move |_| {
            calls += 1;
            if calls == 2 {
                anyhow::bail!("cannot handle the second event");
            }
            Ok(())
        });
        recorder(&mut bridge, EventType::OverlayActivated, &log, "after");
        for dialog in [Dialog::Friends, Dialog::Stats, Dialog::Settings] {
            raise_overlay(&registry, handle, dialog);
        }

        let err = bridge.pump_all(&registry).unwrap_err();
        let BindingError::PartialDeliveryFailure { failures } = err else {
            panic!("expected PartialDeliveryFailure");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subscription, flaky);
        assert!(failures[0].message.contains("second event"));

        let seen: Vec<_> = log.lock().iter().map(|(label, _)| *label).collect();
        assert_eq!(seen, vec!["before", "after", "before", "after", "before", "after"]);
        bridge.detach(&registry);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let (_sdk, registry, mut bridge, handle) = attached();
        let log = Log::default();
        bridge.subscribe(EventType::OverlayActivated, |_| panic!("boom"));
        recorder(&mut bridge, EventType::OverlayActivated, &log, "a");
        raise_overlay(&registry, handle, Dialog::Players);

        let err = bridge.pump_all(&registry).unwrap_err();
        let BindingError::PartialDeliveryFailure { failures } = err else {
            panic!("expected PartialDeliveryFailure");
        };
        assert!(failures[0].message.contains("boom"));
        assert_eq!(log.lock().len(), 1);
        bridge.detach(&registry);
    }

    #[test]
    fn test_dropped_pump_requeues_remainder() {
        let (_sdk, registry, mut bridge, handle) = attached();
        for dialog in [Dialog::Friends, Dialog::Stats, Dialog::Settings] {
            raise_overlay(&registry, handle, dialog);
        }

        let first_seq = {
            let mut pump = bridge.pump(&registry).unwrap();
            assert_eq!(pump.remaining(), 3);
            pump.next().unwrap().seq
        };
        assert_eq!(bridge.queued(), 2);

        let rest = bridge.pump_all(&registry).unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|d| d.seq > first_seq));
        assert!(rest[0].seq < rest[1].seq);
        bridge.detach(&registry);
    }

    #[test]
    fn test_detach_discards_queue_and_unregisters() {
        let (sdk, registry, mut bridge, handle) = attached();
        raise_overlay(&registry, handle, Dialog::Friends);
        raise_presence(&registry, handle, "v");
        assert_eq!(bridge.queued(), 1);

        assert_eq!(bridge.detach(&registry), 1);
        assert!(!bridge.is_attached());
        assert_eq!(bridge.queued(), 0);
        assert_eq!(Arc::strong_count(&bridge.queue), 1);
        assert!(sdk.native_calls().contains(&"clear_callback"));
    }

    #[test]
    fn test_attach_twice_fails() {
        let (_sdk, registry, mut bridge, handle) = attached();
        assert!(matches!(bridge.attach(&registry, handle), Err(BindingError::AlreadyInitialized)));
        bridge.detach(&registry);
    }

    #[tokio::test]
    async fn test_expect_call_resolves_on_delivery() {
        let (_sdk, registry, mut bridge, handle) = attached();
        let call_id = registry
            .with_raw(handle, |native, raw| {
                native.find_or_create_leaderboard(raw, "Wins", Default::default(), Default::default())
            })
            .unwrap()
            .unwrap();
        let rx = bridge.expect_call(call_id);
        bridge.pump_all(&registry).unwrap();

        let event = rx.await.unwrap();
        assert_eq!(event.call_id(), Some(call_id));
        bridge.detach(&registry);
    }

    #[test]
    fn test_navigation_raised_before_overlay_activation() {
        let (_sdk, registry, mut bridge, handle) = attached();
        let accepted = registry
            .with_raw(handle, |native, raw| {
                native.activate_overlay_to_web_page(raw, "https://example.com", OverlayMode::Default)
            })
            .unwrap();
        assert!(accepted);
        let types: Vec<_> = bridge
            .pump_all(&registry)
            .unwrap()
            .into_iter()
            .map(|d| d.event_type)
            .collect();
        assert_eq!(types, vec![EventType::NavigationRequested, EventType::OverlayActivated]);
        bridge.detach(&registry);
    }

    proptest! {
        // Persona changes are raised synchronously and overlay activations on
        // `run_callbacks`, so native raise order is tracked per kind.
        #[test]
        fn prop_delivery_matches_native_order(
            raised in proptest::collection::vec(any::<bool>(), 1..30),
            pump_after in proptest::collection::vec(any::<bool>(), 30),
        ) {
            let (_sdk, registry, mut bridge, handle) = attached();
            let log = Log::default();
            recorder(&mut bridge, EventType::OverlayActivated, &log, "overlay");
            recorder(&mut bridge, EventType::PersonaStateChange, &log, "persona");

            let mut dispatched = Vec::new();
            for (i, overlay) in raised.iter().enumerate() {
                if *overlay {
                    raise_overlay(&registry, handle, Dialog::Friends);
                } else {
                    raise_presence(&registry, handle, &format!("v{i}"));
                }
                if pump_after[i] {
                    dispatched.extend(bridge.pump_all(&registry).unwrap());
                }
            }
            dispatched.extend(bridge.pump_all(&registry).unwrap());

            // Every event delivered exactly once, in strictly increasing raise order.
            prop_assert_eq!(dispatched.len(), raised.len());
            prop_assert!(dispatched.windows(2).all(|w| w[0].seq < w[1].seq));

            // Listener invocation order equals dispatch order.
            let labels: Vec<&str> = log.lock().iter().map(|(label, _)| *label).collect();
            let expected: Vec<&str> = dispatched
                .iter()
                .map(|d| match d.event_type {
                    EventType::OverlayActivated => "overlay",
                    _ => "persona",
                })
                .collect();
            prop_assert_eq!(labels, expected);

            let overlays = raised.iter().filter(|o| **o).count();
            prop_assert_eq!(
                dispatched.iter().filter(|d| d.event_type == EventType::OverlayActivated).count(),
                overlays
            );
            bridge.detach(&registry);
        }
    }
}
