//! C-shaped types shared by every [`NativeSdk`](crate::NativeSdk) implementation.

use std::ffi::{c_char, c_void};
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// Callback signature the native layer invokes for every event it raises.
///
/// `tag` is one of the constants in [`tag`]; the payload is a UTF-8 JSON
/// document of `payload_len` bytes (not NUL-terminated). The pointer is only
/// valid for the duration of the call.
pub type NativeCallback = unsafe extern "C" fn(
    tag: i32,
    payload_ptr: *const c_char,
    payload_len: usize,
    user_data: *mut c_void,
);

/// Integer event tags used on the native callback.
pub mod tag {
    pub const PERSONA_STATE_CHANGE: i32 = 304;
    pub const GAME_OVERLAY_ACTIVATED: i32 = 331;
    pub const USER_STATS_STORED: i32 = 1102;
    pub const LEADERBOARD_FIND_RESULT: i32 = 1104;
    pub const NAVIGATION_REQUESTED: i32 = 4601;
}

/// Opaque token for a live native SDK instance.
///
/// Never dereferenced on the managed side; it is only ever handed back to the
/// native layer that produced it.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(NonZeroU64);

impl RawHandle {
    /// Wrap a token returned by native code. Zero is the C "no handle" value.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn as_u64(self) -> u64 {
        self.0.get()
    }
}

/// Identifier of an asynchronous native call, echoed back in its completion callback.
pub type ApiCallId = u64;

/// Status codes the native layer reports from `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NativeStatus {
    /// The platform client/runtime libraries could not be located.
    #[error("platform runtime not available")]
    RuntimeMissing,
    /// The application id is not valid for the current execution context.
    #[error("invalid application id")]
    InvalidAppId,
    /// The native library already has a live instance in this process.
    #[error("native runtime already initialized")]
    AlreadyRunning,
}

/// Local player identity as reported by the native layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: u64,
    pub level: u32,
    pub ip_country: String,
}

/// How the overlay browser should present a web page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayMode {
    #[default]
    Default,
    Modal,
}

/// Overlay dialogs that can be opened directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialog {
    Friends,
    Community,
    Players,
    Settings,
    OfficialGameGroup,
    Stats,
    Achievements,
}

impl Dialog {
    /// The dialog name understood by the native overlay.
    pub fn as_native_str(self) -> &'static str {
        match self {
            Dialog::Friends => "Friends",
            Dialog::Community => "Community",
            Dialog::Players => "Players",
            Dialog::Settings => "Settings",
            Dialog::OfficialGameGroup => "OfficialGameGroup",
            Dialog::Stats => "Stats",
            Dialog::Achievements => "Achievements",
        }
    }
}

/// What the store page should do when opened from the overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFlag {
    #[default]
    None,
    AddToCart,
    AddToCartAndShow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardSortMethod {
    Ascending,
    #[default]
    Descending,
}

impl LeaderboardSortMethod {
    /// Map the integer form used by script hosts. Unknown values sort descending.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Ascending,
            _ => Self::Descending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardDisplayType {
    #[default]
    Numeric,
    TimeSeconds,
    TimeMilliSeconds,
}

impl LeaderboardDisplayType {
    /// Map the integer form used by script hosts. Unknown values display as numbers.
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::TimeSeconds,
            2 => Self::TimeMilliSeconds,
            _ => Self::Numeric,
        }
    }
}
