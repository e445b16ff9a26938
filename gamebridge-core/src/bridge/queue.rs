//! Thread-safe FIFO fed by the native callback trampoline.

use std::collections::VecDeque;
use std::ffi::{c_char, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};

use parking_lot::Mutex;

use crate::event::{DomainEvent, EventType, convert_event};

/// A native callback, decoded and numbered in the order native raised it.
#[derive(Debug, Clone)]
pub(crate) struct QueuedEvent {
    pub seq: u64,
    pub event_type: EventType,
    pub event: DomainEvent,
}

#[derive(Default)]
struct Inner {
    events: VecDeque<QueuedEvent>,
    next_seq: u64,
}

/// Events raised by native code, waiting for the next pump.
///
/// Pushed from whatever thread native code runs on; drained only by the
/// pumping thread.
#[derive(Default)]
pub(crate) struct EventQueue {
    inner: Mutex<Inner>,
}

impl EventQueue {
    pub fn push(&self, event_type: EventType, event: DomainEvent) -> u64 {
        let mut inner = self.inner.lock();
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.events.push_back(QueuedEvent { seq, event_type, event });
        seq
    }

    /// Take everything queued so far. Later pushes wait for the next pump.
    pub fn take_all(&self) -> VecDeque<QueuedEvent> {
        std::mem::take(&mut self.inner.lock().events)
    }

    /// Put undelivered events back in front of anything queued since.
    pub fn restore_front(&self, undelivered: VecDeque<QueuedEvent>) {
        let mut inner = self.inner.lock();
        for event in undelivered.into_iter().rev() {
            inner.events.push_front(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    /// Drop everything queued. Returns how many events were discarded.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let discarded = inner.events.len();
        inner.events.clear();
        discarded
    }
}

/// Entry point handed to native code. Decodes and queues; never calls a listener.
///
/// # Safety
///
/// `user_data` must be null or point to a live [`EventQueue`]; `payload_ptr`
/// must be null or valid for `payload_len` bytes.
pub(crate) unsafe extern "C" fn native_trampoline(
    tag: i32,
    payload_ptr: *const c_char,
    payload_len: usize,
    user_data: *mut c_void,
) {
    if user_data.is_null() {
        return;
    }
    let queue = unsafe { &*(user_data as *const EventQueue) };
    let payload: &[u8] = if payload_ptr.is_null() || payload_len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(payload_ptr as *const u8, payload_len) }
    };

    // A panic must not unwind into native frames.
    let queued = catch_unwind(AssertUnwindSafe(|| {
        queue.push(EventType::from_tag(tag), convert_event(tag, payload))
    }));
    match queued {
        Ok(seq) => tracing::trace!("bridge: queued native tag {tag} as #{seq}"),
        Err(_) => tracing::error!("bridge: panic while queueing native tag {tag}, event dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raise(queue: &EventQueue, tag: i32, json: &str) {
        unsafe {
            native_trampoline(
                tag,
                json.as_ptr() as *const c_char,
                json.len(),
                queue as *const EventQueue as *mut c_void,
            );
        }
    }

    #[test]
    fn test_trampoline_queues_in_native_order() {
        let queue = EventQueue::default();
        raise(&queue, 331, r#"{"active":true}"#);
        raise(&queue, 331, r#"{"active":false}"#);

        let taken = queue.take_all();
        assert_eq!(taken.len(), 2);
        assert!(taken[0].seq < taken[1].seq);
        assert_eq!(taken[0].event, DomainEvent::OverlayActivated { active: true });
        assert_eq!(taken[1].event, DomainEvent::OverlayActivated { active: false });
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_trampoline_ignores_null_user_data() {
        unsafe { native_trampoline(331, std::ptr::null(), 0, std::ptr::null_mut()) };
    }

    #[test]
    fn test_null_payload_becomes_unknown() {
        let queue = EventQueue::default();
        unsafe {
            native_trampoline(
                331,
                std::ptr::null(),
                0,
                &queue as *const EventQueue as *mut c_void,
            );
        }
        let taken = queue.take_all();
        assert!(matches!(taken[0].event, DomainEvent::Unknown { tag: 331, .. }));
        assert_eq!(taken[0].event_type, EventType::OverlayActivated);
    }

    #[test]
    fn test_restore_front_keeps_order() {
        let queue = EventQueue::default();
        let first = queue.push(EventType::Other(1), DomainEvent::OverlayActivated { active: true });
        let second = queue.push(EventType::Other(1), DomainEvent::OverlayActivated { active: false });
        let mut taken = queue.take_all();
        let third = queue.push(EventType::Other(1), DomainEvent::OverlayActivated { active: true });

        taken.pop_front();
        queue.restore_front(taken);
        let seqs: Vec<u64> = queue.take_all().into_iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![second, third]);
        assert!(first < second);
    }

    #[test]
    fn test_clear_reports_discarded() {
        let queue = EventQueue::default();
        queue.push(EventType::StatsStored, DomainEvent::StatsStored { game_id: 1, success: true });
        queue.push(EventType::StatsStored, DomainEvent::StatsStored { game_id: 1, success: true });
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.len(), 0);
    }
}
