//! The native side of gamebridge.
//!
//! A gaming-platform SDK is exposed to us as a C API: one opaque handle per
//! process, plain synchronous getters, and a single C function-pointer
//! callback that the SDK invokes with an integer event tag and a payload
//! whenever its internal loop is run (or whenever one of its own threads feels
//! like it). [`NativeSdk`] describes exactly that surface and nothing more.
//!
//! [`LoopbackSdk`] is an in-process runtime that speaks the same contract. It
//! is what tests and the demo host bind against, and what a host falls back to
//! when the real platform runtime is not installed.

pub mod ffi;
pub mod loopback;
pub mod payload;
pub mod sdk;

pub use ffi::{
    ApiCallId, Dialog, LeaderboardDisplayType, LeaderboardSortMethod, NativeCallback,
    NativeStatus, OverlayMode, PlayerInfo, RawHandle, StoreFlag,
};
pub use loopback::{LoopbackConfig, LoopbackSdk};
pub use sdk::NativeSdk;
