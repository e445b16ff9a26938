//! gamebridge-core: a managed binding over the native game-platform SDK.
//!
//! The native runtime calls back from arbitrary threads. This crate turns
//! those callbacks into queued [`DomainEvent`]s that reach listeners only
//! when the host pumps, on the host's own thread.
//!
//! Layers, bottom up:
//! - [`registry`]: the single live native instance behind an opaque [`HandleId`].
//! - [`bridge`]: callback trampoline, event queue and listener dispatch.
//! - [`facade`]: lifecycle state machine plus the `localplayer`, `overlay`
//!   and `stats` namespaces.
//! - [`abi`]: `extern "C"` exports for non-Rust hosts.

pub mod abi;
pub mod bridge;
pub mod config;
pub mod error;
pub mod event;
pub mod facade;
pub mod registry;

pub use bridge::{DispatchedEvent, Pump, SubscriptionId};
pub use config::BindingConfig;
pub use error::{BindingError, ListenerFailure};
pub use event::{DomainEvent, EventType, convert_event};
pub use facade::{Facade, FacadeState, PendingCall, PlayerId, init};
pub use registry::HandleId;

pub use gamebridge_native::{
    Dialog, LeaderboardDisplayType, LeaderboardSortMethod, LoopbackConfig, LoopbackSdk, NativeSdk,
    OverlayMode, StoreFlag,
};
