//! Error taxonomy for the binding layer.

use gamebridge_native::NativeStatus;
use serde::Serialize;

use crate::bridge::SubscriptionId;
use crate::event::EventType;

/// One listener that failed while a pump delivered an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerFailure {
    pub subscription: SubscriptionId,
    /// Sequence number of the event being delivered.
    pub seq: u64,
    pub event_type: EventType,
    pub message: String,
}

/// Errors surfaced by the registry, the callback bridge and the facade.
///
/// Lifecycle errors (`NotInitialized`, `AlreadyInitialized`, `InvalidHandle`,
/// `AlreadyShutdown`) mean the embedding application misused the binding and
/// are always returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("binding is not initialized")]
    NotInitialized,

    #[error("a native handle is already live")]
    AlreadyInitialized,

    #[error("native handle is invalid or has been released")]
    InvalidHandle,

    #[error("native init failed for app {app_id}: {status}")]
    NativeInitFailure { app_id: u32, status: NativeStatus },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("overlay rejected navigation to {url}")]
    NavigationRejected { url: String },

    #[error("{} listener(s) failed during pump", failures.len())]
    PartialDeliveryFailure { failures: Vec<ListenerFailure> },

    #[error("subscription {0} not found")]
    NotFound(SubscriptionId),

    #[error("binding already shut down")]
    AlreadyShutdown,
}
