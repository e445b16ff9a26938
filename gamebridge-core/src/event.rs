//! Native callback (tag + JSON payload) → `DomainEvent` conversion.

use gamebridge_native::ffi::tag;
use gamebridge_native::{ApiCallId, OverlayMode, payload};
use serde::Serialize;

/// Native event type, identified on the wire by an integer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PersonaStateChange,
    OverlayActivated,
    StatsStored,
    LeaderboardFound,
    NavigationRequested,
    /// A tag this binding does not know about.
    Other(i32),
}

impl EventType {
    pub fn from_tag(raw: i32) -> Self {
        match raw {
            tag::PERSONA_STATE_CHANGE => Self::PersonaStateChange,
            tag::GAME_OVERLAY_ACTIVATED => Self::OverlayActivated,
            tag::USER_STATS_STORED => Self::StatsStored,
            tag::LEADERBOARD_FIND_RESULT => Self::LeaderboardFound,
            tag::NAVIGATION_REQUESTED => Self::NavigationRequested,
            other => Self::Other(other),
        }
    }

    pub fn tag(self) -> i32 {
        match self {
            Self::PersonaStateChange => tag::PERSONA_STATE_CHANGE,
            Self::OverlayActivated => tag::GAME_OVERLAY_ACTIVATED,
            Self::StatsStored => tag::USER_STATS_STORED,
            Self::LeaderboardFound => tag::LEADERBOARD_FIND_RESULT,
            Self::NavigationRequested => tag::NAVIGATION_REQUESTED,
            Self::Other(raw) => raw,
        }
    }
}

/// Managed view of a native callback.
///
/// Serialized with `#[serde(tag = "type", content = "data")]` so script and
/// C hosts can switch on `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DomainEvent {
    NavigationRequested {
        url: String,
        mode: OverlayMode,
    },
    OverlayActivated {
        active: bool,
    },
    PersonaStateChanged {
        player_id: u64,
        flags: u32,
    },
    StatsStored {
        game_id: u64,
        success: bool,
    },
    LeaderboardFound {
        call_id: ApiCallId,
        leaderboard: Option<u64>,
    },
    /// Unknown tag, or a payload that did not decode.
    Unknown {
        tag: i32,
        payload: String,
    },
}

impl DomainEvent {
    /// Call id for events that complete an asynchronous native request.
    pub fn call_id(&self) -> Option<ApiCallId> {
        match self {
            DomainEvent::LeaderboardFound { call_id, .. } => Some(*call_id),
            _ => None,
        }
    }
}

/// Decode a native callback. Never fails: undecodable payloads become
/// [`DomainEvent::Unknown`].
pub fn convert_event(raw_tag: i32, payload: &[u8]) -> DomainEvent {
    let decoded = match EventType::from_tag(raw_tag) {
        EventType::NavigationRequested => serde_json::from_slice::<payload::NavigationRequested>(payload)
            .map(|p| DomainEvent::NavigationRequested { url: p.url, mode: p.mode }),
        EventType::OverlayActivated => serde_json::from_slice::<payload::GameOverlayActivated>(payload)
            .map(|p| DomainEvent::OverlayActivated { active: p.active }),
        EventType::PersonaStateChange => serde_json::from_slice::<payload::PersonaStateChange>(payload)
            .map(|p| DomainEvent::PersonaStateChanged {
                player_id: p.player_id,
                flags: p.flags,
            }),
        EventType::StatsStored => serde_json::from_slice::<payload::UserStatsStored>(payload)
            .map(|p| DomainEvent::StatsStored {
                game_id: p.game_id,
                success: p.success,
            }),
        EventType::LeaderboardFound => serde_json::from_slice::<payload::LeaderboardFindResult>(payload)
            .map(|p| DomainEvent::LeaderboardFound {
                call_id: p.call_id,
                leaderboard: p.leaderboard,
            }),
        EventType::Other(_) => return unknown(raw_tag, payload),
    };

    decoded.unwrap_or_else(|e| {
        tracing::warn!("undecodable payload for native tag {raw_tag}: {e}");
        unknown(raw_tag, payload)
    })
}

fn unknown(raw_tag: i32, payload: &[u8]) -> DomainEvent {
    DomainEvent::Unknown {
        tag: raw_tag,
        payload: String::from_utf8_lossy(payload).into_owned(),
    }
}
