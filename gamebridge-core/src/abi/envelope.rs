//! EventEnvelope: versioned wrapper around DomainEvent for host callbacks.

use serde::Serialize;

use crate::event::DomainEvent;

/// JSON document handed to a host callback for one delivered event.
///
/// `seq` is the event's position in native raise order, shared by every
/// subscription on the instance; `tag` is the native tag it subscribed with. Hosts should ignore unknown `version`s.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope<'a> {
    pub version: u32,
    pub seq: u64,
    pub tag: i32,
    pub timestamp_ms: i64,
    pub event: &'a DomainEvent,
}

impl<'a> EventEnvelope<'a> {
    pub fn new(seq: u64, tag: i32, event: &'a DomainEvent) -> Self {
        Self {
            version: 1,
            seq,
            tag,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            event,
        }
    }
}
