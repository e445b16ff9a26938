//! In-process loopback runtime implementing [`NativeSdk`].
//!
//! Behaves like a platform SDK from the binding's point of view: a single live
//! handle, results of asynchronous requests queued until `run_callbacks`, some
//! callbacks fired synchronously from inside API calls, and (optionally) overlay
//! notifications fired from a native thread the caller does not own.

use std::collections::{HashMap, VecDeque};
use std::ffi::{c_char, c_void};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::ffi::{
    ApiCallId, Dialog, LeaderboardDisplayType, LeaderboardSortMethod, NativeCallback,
    NativeStatus, OverlayMode, PlayerInfo, RawHandle, StoreFlag, tag,
};
use crate::payload;
use crate::sdk::NativeSdk;

/// Runtime behaviour of the loopback SDK.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// When false, `init` behaves as if the platform client were not installed.
    pub runtime_available: bool,
    /// App ids accepted by `init`. Empty accepts any non-zero id.
    pub accepted_app_ids: Vec<u32>,
    /// Display name of the local player. `None` models an unknown identity.
    pub persona_name: Option<String>,
    /// 64-bit id of the local player. Zero means "not logged in".
    pub player_id: u64,
    pub player_level: u32,
    pub ip_country: String,
    /// When false, every overlay web-page request is refused.
    pub overlay_enabled: bool,
    /// Report overlay activation from a separate native thread instead of
    /// queueing it for the next `run_callbacks`.
    pub overlay_thread: bool,
    /// Stat schema with initial values. Unknown stat names cannot be set.
    pub stats: HashMap<String, i32>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            runtime_available: true,
            accepted_app_ids: Vec::new(),
            persona_name: Some("Tester".to_string()),
            player_id: 76561197960287930,
            player_level: 1,
            ip_country: "US".to_string(),
            overlay_enabled: true,
            overlay_thread: false,
            stats: HashMap::new(),
        }
    }
}

/// The installed callback. `raw` pins it to the instance that registered it.
struct CallbackSlot {
    raw: RawHandle,
    cb: NativeCallback,
    user_data: *mut c_void,
}

// Safety: the registrant guarantees `user_data` stays valid and may be used
// from any thread until `clear_callback` returns (see `NativeSdk::register_callback`).
unsafe impl Send for CallbackSlot {}

type SharedSlot = Arc<Mutex<Option<CallbackSlot>>>;

struct Instance {
    raw: RawHandle,
    app_id: u32,
    pending: VecDeque<(i32, String)>,
    stats: HashMap<String, i32>,
    rich_presence: HashMap<String, String>,
    leaderboards: HashMap<String, u64>,
}

impl Instance {
    fn queue<T: Serialize>(&mut self, tag: i32, payload: &T) {
        if let Some(json) = encode(tag, payload) {
            self.pending.push_back((tag, json));
        }
    }
}

/// In-process platform SDK.
pub struct LoopbackSdk {
    config: LoopbackConfig,
    state: Mutex<Option<Instance>>,
    slot: SharedSlot,
    next_raw: AtomicU64,
    next_call: AtomicU64,
    calls: Mutex<Vec<&'static str>>,
}

impl Default for LoopbackSdk {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

impl LoopbackSdk {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
            slot: Arc::new(Mutex::new(None)),
            next_raw: AtomicU64::new(1),
            next_call: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &LoopbackConfig {
        &self.config
    }

    /// Names of the native entry points invoked so far, in call order.
    pub fn native_calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Current rich presence value for `key`, if the instance is live.
    pub fn rich_presence(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .as_ref()
            .and_then(|inst| inst.rich_presence.get(key).cloned())
    }

    /// Whether an instance is currently live.
    pub fn is_running(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Number of callbacks waiting for the next `run_callbacks`.
    pub fn pending_callbacks(&self) -> usize {
        self.state.lock().as_ref().map_or(0, |inst| inst.pending.len())
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }

    /// Run `f` against the live instance if `raw` names it.
    fn with_instance<R>(&self, raw: RawHandle, f: impl FnOnce(&mut Instance) -> R) -> Option<R> {
        let mut state = self.state.lock();
        match state.as_mut() {
            Some(inst) if inst.raw == raw => Some(f(inst)),
            _ => {
                tracing::trace!("loopback: call on dead handle {}", raw.as_u64());
                None
            }
        }
    }

    fn queue_overlay_activated(&self, raw: RawHandle) {
        let event = payload::GameOverlayActivated { active: true };
        if self.config.overlay_thread {
            let Some(json) = encode(tag::GAME_OVERLAY_ACTIVATED, &event) else {
                return;
            };
            let slot = Arc::clone(&self.slot);
            std::thread::spawn(move || fire(&slot, raw, tag::GAME_OVERLAY_ACTIVATED, &json));
        } else {
            self.with_instance(raw, |inst| inst.queue(tag::GAME_OVERLAY_ACTIVATED, &event));
        }
    }
}

fn encode<T: Serialize>(tag: i32, payload: &T) -> Option<String> {
    match serde_json::to_string(payload) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!("loopback: failed to encode payload for tag {tag}: {e}");
            None
        }
    }
}

/// Invoke the installed callback, holding the slot lock for the duration so
/// `clear_callback` cannot return while an invocation is in flight.
fn fire(slot: &Mutex<Option<CallbackSlot>>, raw: RawHandle, tag: i32, json: &str) {
    let guard = slot.lock();
    let Some(ref installed) = *guard else {
        return;
    };
    if installed.raw != raw {
        return;
    }
    unsafe {
        (installed.cb)(tag, json.as_ptr() as *const c_char, json.len(), installed.user_data);
    }
}

impl NativeSdk for LoopbackSdk {
    fn init(&self, app_id: u32) -> Result<RawHandle, NativeStatus> {
        self.record("init");
        if !self.config.runtime_available {
            return Err(NativeStatus::RuntimeMissing);
        }
        if app_id == 0
            || (!self.config.accepted_app_ids.is_empty()
                && !self.config.accepted_app_ids.contains(&app_id))
        {
            return Err(NativeStatus::InvalidAppId);
        }

        let mut state = self.state.lock();
        if state.is_some() {
            return Err(NativeStatus::AlreadyRunning);
        }
        let raw = RawHandle::from_raw(self.next_raw.fetch_add(1, Ordering::Relaxed))
            .ok_or(NativeStatus::RuntimeMissing)?;
        *state = Some(Instance {
            raw,
            app_id,
            pending: VecDeque::new(),
            stats: self.config.stats.clone(),
            rich_presence: HashMap::new(),
            leaderboards: HashMap::new(),
        });
        tracing::debug!("loopback: init app {app_id} -> raw {}", raw.as_u64());
        Ok(raw)
    }

    fn shutdown(&self, raw: RawHandle) {
        self.record("shutdown");
        self.clear_callback(raw);
        let mut state = self.state.lock();
        if state.as_ref().is_some_and(|inst| inst.raw == raw) {
            *state = None;
            tracing::debug!("loopback: shutdown raw {}", raw.as_u64());
        }
    }

    unsafe fn register_callback(&self, raw: RawHandle, cb: NativeCallback, user_data: *mut c_void) {
        self.record("register_callback");
        if self.with_instance(raw, |_| ()).is_none() {
            return;
        }
        *self.slot.lock() = Some(CallbackSlot { raw, cb, user_data });
    }

    fn clear_callback(&self, raw: RawHandle) {
        self.record("clear_callback");
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|s| s.raw == raw) {
            *slot = None;
        }
    }

    fn run_callbacks(&self, raw: RawHandle) {
        self.record("run_callbacks");
        let Some(pending) = self.with_instance(raw, |inst| std::mem::take(&mut inst.pending)) else {
            return;
        };
        for (tag, json) in pending {
            fire(&self.slot, raw, tag, &json);
        }
    }

    fn persona_name(&self, raw: RawHandle) -> Option<String> {
        self.record("persona_name");
        self.with_instance(raw, |_| self.config.persona_name.clone())
            .flatten()
    }

    fn local_player(&self, raw: RawHandle) -> Option<PlayerInfo> {
        self.record("local_player");
        if self.config.player_id == 0 {
            return None;
        }
        self.with_instance(raw, |_| PlayerInfo {
            id: self.config.player_id,
            level: self.config.player_level,
            ip_country: self.config.ip_country.clone(),
        })
    }

    fn set_rich_presence(&self, raw: RawHandle, key: &str, value: Option<&str>) -> bool {
        self.record("set_rich_presence");
        let updated = self.with_instance(raw, |inst| match value {
            Some(v) => {
                inst.rich_presence.insert(key.to_string(), v.to_string());
            }
            None => {
                inst.rich_presence.remove(key);
            }
        });
        if updated.is_none() {
            return false;
        }

        // Fired from inside the API call, as the platform does for local changes.
        let change = payload::PersonaStateChange {
            player_id: self.config.player_id,
            flags: payload::PersonaStateChange::FLAG_RICH_PRESENCE,
        };
        if let Some(json) = encode(tag::PERSONA_STATE_CHANGE, &change) {
            fire(&self.slot, raw, tag::PERSONA_STATE_CHANGE, &json);
        }
        true
    }

    fn activate_overlay_to_web_page(&self, raw: RawHandle, url: &str, mode: OverlayMode) -> bool {
        self.record("activate_overlay_to_web_page");
        if !self.config.overlay_enabled {
            return false;
        }
        let request = payload::NavigationRequested {
            url: url.to_string(),
            mode,
        };
        if self
            .with_instance(raw, |inst| inst.queue(tag::NAVIGATION_REQUESTED, &request))
            .is_none()
        {
            return false;
        }
        self.queue_overlay_activated(raw);
        true
    }

    fn activate_overlay(&self, raw: RawHandle, dialog: Dialog) {
        self.record("activate_overlay");
        tracing::debug!("loopback: overlay dialog {}", dialog.as_native_str());
        if self.config.overlay_enabled && self.with_instance(raw, |_| ()).is_some() {
            self.queue_overlay_activated(raw);
        }
    }

    fn activate_overlay_to_store(&self, raw: RawHandle, app_id: u32, flag: StoreFlag) {
        self.record("activate_overlay_to_store");
        tracing::debug!("loopback: overlay store page for {app_id} ({flag:?})");
        if self.config.overlay_enabled && self.with_instance(raw, |_| ()).is_some() {
            self.queue_overlay_activated(raw);
        }
    }

    fn get_stat_i32(&self, raw: RawHandle, name: &str) -> Option<i32> {
        self.record("get_stat_i32");
        self.with_instance(raw, |inst| inst.stats.get(name).copied())
            .flatten()
    }

    fn set_stat_i32(&self, raw: RawHandle, name: &str, value: i32) -> bool {
        self.record("set_stat_i32");
        self.with_instance(raw, |inst| match inst.stats.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        })
        .unwrap_or(false)
    }

    fn store_stats(&self, raw: RawHandle) -> bool {
        self.record("store_stats");
        self.with_instance(raw, |inst| {
            let stored = payload::UserStatsStored {
                game_id: u64::from(inst.app_id),
                success: true,
            };
            inst.queue(tag::USER_STATS_STORED, &stored);
        })
        .is_some()
    }

    fn reset_all_stats(&self, raw: RawHandle, achievements_too: bool) -> bool {
        self.record("reset_all_stats");
        tracing::debug!("loopback: reset stats (achievements_too={achievements_too})");
        self.with_instance(raw, |inst| {
            for value in inst.stats.values_mut() {
                *value = 0;
            }
        })
        .is_some()
    }

    fn find_or_create_leaderboard(
        &self,
        raw: RawHandle,
        name: &str,
        sort: LeaderboardSortMethod,
        display_type: LeaderboardDisplayType,
    ) -> Option<ApiCallId> {
        self.record("find_or_create_leaderboard");
        tracing::debug!("loopback: find_or_create_leaderboard {name:?} ({sort:?}, {display_type:?})");
        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        self.with_instance(raw, |inst| {
            let leaderboard = if name.is_empty() {
                None
            } else {
                let next = inst.leaderboards.len() as u64 + 1;
                Some(*inst.leaderboards.entry(name.to_string()).or_insert(next))
            };
            let result = payload::LeaderboardFindResult { call_id, leaderboard };
            inst.queue(tag::LEADERBOARD_FIND_RESULT, &result);
            call_id
        })
    }
}
