//! A single pump: a lazy, finite walk over the events queued when it started.

use std::collections::VecDeque;

use serde::Serialize;

use crate::bridge::CallbackBridge;
use crate::bridge::queue::QueuedEvent;
use crate::error::{BindingError, ListenerFailure};
use crate::event::{DomainEvent, EventType};

/// An event that a pump delivered to its listeners.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchedEvent {
    /// Position in native raise order.
    pub seq: u64,
    pub event_type: EventType,
    pub event: DomainEvent,
    /// Number of listeners invoked, failed ones included.
    pub delivered_to: usize,
}

/// Iterator returned by [`CallbackBridge::pump`].
///
/// Each `next()` delivers one event to every listener of its type, on the
/// calling thread. Events native code raises while the pump is running are
/// left for the next pump. Dropping a pump early puts the undelivered
/// remainder back at the front of the queue.
pub struct Pump<'a> {
    bridge: &'a mut CallbackBridge,
    batch: VecDeque<QueuedEvent>,
    failures: Vec<ListenerFailure>,
}

impl<'a> Pump<'a> {
    pub(crate) fn new(bridge: &'a mut CallbackBridge, batch: VecDeque<QueuedEvent>) -> Self {
        Self {
            bridge,
            batch,
            failures: Vec::new(),
        }
    }

    /// Events still to be delivered by this pump.
    pub fn remaining(&self) -> usize {
        self.batch.len()
    }

    /// Listener failures collected so far.
    pub fn failures(&self) -> &[ListenerFailure] {
        &self.failures
    }

    /// Deliver whatever is left and report listener failures as one batch.
    pub fn finish(mut self) -> Result<(), BindingError> {
        for _ in self.by_ref() {}
        let failures = std::mem::take(&mut self.failures);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BindingError::PartialDeliveryFailure { failures })
        }
    }
}

impl Iterator for Pump<'_> {
    type Item = DispatchedEvent;

    fn next(&mut self) -> Option<DispatchedEvent> {
        let queued = self.batch.pop_front()?;
        let delivered_to = self.bridge.deliver(&queued, &mut self.failures);
        Some(DispatchedEvent {
            seq: queued.seq,
            event_type: queued.event_type,
            event: queued.event,
            delivered_to,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.batch.len(), Some(self.batch.len()))
    }
}

impl Drop for Pump<'_> {
    fn drop(&mut self) {
        if !self.batch.is_empty() {
            tracing::debug!("bridge: pump dropped with {} undelivered, requeueing", self.batch.len());
            self.bridge.queue.restore_front(std::mem::take(&mut self.batch));
        }
        if !self.failures.is_empty() {
            tracing::warn!(
                "bridge: pump dropped without finish, {} listener failure(s) unreported",
                self.failures.len()
            );
        }
    }
}
