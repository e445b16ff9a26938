//! End-to-end scenarios against the loopback runtime.
//!
//! Tests cover:
//! - init -> local player name -> overlay request -> pump delivery
//! - operations before init and after shutdown
//! - URL validation before anything reaches the runtime
//! - callbacks fired from a runtime-owned thread, delivered on the pumping thread
//! - listener failures reported without starving other listeners

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use gamebridge_core::{
    BindingConfig, BindingError, Dialog, DomainEvent, EventType, Facade, FacadeState,
    LoopbackConfig, LoopbackSdk, OverlayMode,
};
use parking_lot::Mutex;

type Seen = Arc<Mutex<Vec<(ThreadId, DomainEvent)>>>;

/// `init` goes through the one process-wide runtime; tests using it take turns.
static SHARED_RUNTIME: Mutex<()> = parking_lot::const_mutex(());

fn record(facade: &mut Facade, event_type: EventType) -> Seen {
    let seen: Seen = Arc::default();
    let sink = Arc::clone(&seen);
    facade
        .subscribe(event_type, move |event| {
            sink.lock().push((thread::current().id(), event.clone()));
            Ok(())
        })
        .unwrap();
    seen
}

#[test]
fn overlay_request_reaches_listener_on_pump() {
    let _guard = SHARED_RUNTIME.lock();
    let mut facade = gamebridge_core::init(480).unwrap();
    assert_eq!(facade.localplayer().get_name().unwrap(), "Tester");

    let seen = record(&mut facade, EventType::NavigationRequested);
    facade.overlay().activate_to_web_page("https://example.com").unwrap();
    assert!(seen.lock().is_empty(), "nothing is delivered before pump");

    let dispatched = facade.pump_all().unwrap();
    assert_eq!(dispatched.len(), 2);
    assert_eq!(dispatched[0].event_type, EventType::NavigationRequested);
    assert_eq!(dispatched[1].event_type, EventType::OverlayActivated);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, thread::current().id());
    match &seen[0].1 {
        DomainEvent::NavigationRequested { url, mode } => {
            assert_eq!(url, "https://example.com");
            assert_eq!(*mode, OverlayMode::Default);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn second_init_in_process_is_already_initialized() {
    let _guard = SHARED_RUNTIME.lock();
    let first = gamebridge_core::init(480).unwrap();
    assert!(matches!(gamebridge_core::init(480), Err(BindingError::AlreadyInitialized)));
    assert_eq!(first.state(), FacadeState::Initialized);
    assert_eq!(first.localplayer().get_name().unwrap(), "Tester");

    drop(first);
    let again = gamebridge_core::init(480).unwrap();
    assert_eq!(again.state(), FacadeState::Initialized);
}

#[test]
fn operations_before_init_fail() {
    let sdk = Arc::new(LoopbackSdk::new(LoopbackConfig::default()));
    let facade = Facade::new(sdk.clone(), &BindingConfig::default());
    assert!(matches!(facade.localplayer().get_name(), Err(BindingError::NotInitialized)));
    assert!(matches!(
        facade.overlay().activate_to_web_page("https://example.com"),
        Err(BindingError::NotInitialized)
    ));
    assert!(sdk.native_calls().is_empty());
}

#[test]
fn operations_after_shutdown_fail() {
    let _guard = SHARED_RUNTIME.lock();
    let mut facade = gamebridge_core::init(480).unwrap();
    facade.shutdown().unwrap();
    assert_eq!(facade.state(), FacadeState::Shutdown);
    assert!(matches!(facade.localplayer().get_name(), Err(BindingError::NotInitialized)));
    assert!(matches!(facade.pump_all(), Err(BindingError::NotInitialized)));
    assert!(matches!(facade.shutdown(), Err(BindingError::AlreadyShutdown)));
}

#[test]
fn malformed_url_never_reaches_runtime() {
    let sdk = Arc::new(LoopbackSdk::new(LoopbackConfig::default()));
    let mut facade = Facade::with_native(480, sdk.clone(), &BindingConfig::default()).unwrap();

    let result = facade.overlay().activate_to_web_page("not-a-url");
    assert!(matches!(result, Err(BindingError::InvalidArgument(_))));
    assert!(!sdk.native_calls().contains(&"activate_overlay_to_web_page"));
    assert!(facade.pump_all().unwrap().is_empty());
}

#[test]
fn disabled_overlay_rejects_navigation() {
    let sdk = Arc::new(LoopbackSdk::new(LoopbackConfig {
        overlay_enabled: false,
        ..Default::default()
    }));
    let facade = Facade::with_native(480, sdk, &BindingConfig::default()).unwrap();
    let result = facade.overlay().activate_to_web_page("https://example.com");
    assert!(matches!(result, Err(BindingError::NavigationRejected { .. })));
}

#[test]
fn foreign_thread_callback_delivered_on_pumping_thread() {
    let sdk = Arc::new(LoopbackSdk::new(LoopbackConfig {
        overlay_thread: true,
        ..Default::default()
    }));
    let mut facade = Facade::with_native(480, sdk, &BindingConfig::default()).unwrap();
    let seen = record(&mut facade, EventType::OverlayActivated);

    facade.overlay().activate_dialog(Dialog::Friends).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while seen.lock().is_empty() && Instant::now() < deadline {
        facade.pump_all().unwrap();
        thread::sleep(Duration::from_millis(5));
    }

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, thread::current().id());
    assert_eq!(seen[0].1, DomainEvent::OverlayActivated { active: true });
}

#[test]
fn failing_listener_does_not_block_others() {
    let _guard = SHARED_RUNTIME.lock();
    let mut facade = gamebridge_core::init(480).unwrap();
    let failing = facade
        .subscribe(EventType::NavigationRequested, |_| anyhow::bail!("host rejected event"))
        .unwrap();
    let seen = record(&mut facade, EventType::NavigationRequested);

    facade.overlay().activate_to_web_page("https://example.com/a").unwrap();
    facade.overlay().activate_to_web_page("https://example.com/b").unwrap();

    match facade.pump_all() {
        Err(BindingError::PartialDeliveryFailure { failures }) => {
            assert_eq!(failures.len(), 2);
            assert!(failures.iter().all(|f| f.subscription == failing));
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
    assert_eq!(seen.lock().len(), 2);

    // The failed events are not redelivered.
    assert!(facade.pump_all().unwrap().is_empty());
}

#[test]
fn lazy_pump_keeps_undelivered_events() {
    let _guard = SHARED_RUNTIME.lock();
    let mut facade = gamebridge_core::init(480).unwrap();
    let seen = record(&mut facade, EventType::NavigationRequested);
    facade
        .overlay()
        .activate_to_web_page_with_mode("https://example.com", OverlayMode::Modal)
        .unwrap();

    {
        let mut pump = facade.pump().unwrap();
        assert_eq!(pump.remaining(), 2);
        let first = pump.next().unwrap();
        assert_eq!(first.event_type, EventType::NavigationRequested);
    }
    assert_eq!(seen.lock().len(), 1);

    let rest = facade.pump_all().unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].event_type, EventType::OverlayActivated);
}
