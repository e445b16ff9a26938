//! JSON payloads carried by native callbacks, one struct per event tag.

use serde::{Deserialize, Serialize};

use crate::ffi::{ApiCallId, OverlayMode};

/// Tag `PERSONA_STATE_CHANGE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaStateChange {
    pub player_id: u64,
    /// Bitmask of what changed (name, status, rich presence, ...).
    pub flags: u32,
}

impl PersonaStateChange {
    pub const FLAG_NAME: u32 = 0x0001;
    pub const FLAG_RICH_PRESENCE: u32 = 0x1000;
}

/// Tag `GAME_OVERLAY_ACTIVATED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverlayActivated {
    pub active: bool,
}

/// Tag `USER_STATS_STORED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatsStored {
    pub game_id: u64,
    pub success: bool,
}

/// Tag `LEADERBOARD_FIND_RESULT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardFindResult {
    pub call_id: ApiCallId,
    /// `None` when the lookup failed.
    pub leaderboard: Option<u64>,
}

/// Tag `NAVIGATION_REQUESTED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationRequested {
    pub url: String,
    #[serde(default)]
    pub mode: OverlayMode,
}
