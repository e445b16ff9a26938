//! The `NativeSdk` trait: the C API of a platform SDK, one method per entry point.

use std::ffi::c_void;

use crate::ffi::{
    ApiCallId, Dialog, LeaderboardDisplayType, LeaderboardSortMethod, NativeCallback,
    NativeStatus, OverlayMode, PlayerInfo, RawHandle, StoreFlag,
};

/// A handle-based, callback-driven native SDK.
///
/// Implementations follow C conventions: methods taking a `RawHandle` that is
/// not the live handle are no-ops returning the "nothing" value (`None`,
/// `false`). Guarding against that is the binding's job, not the SDK's.
///
/// Callbacks may be invoked from any thread, including from inside another
/// method of this trait. Callback code must never call back into the SDK.
pub trait NativeSdk: Send + Sync {
    /// Start the SDK for `app_id`. At most one live handle per instance.
    fn init(&self, app_id: u32) -> Result<RawHandle, NativeStatus>;

    /// Tear down the instance. The raw handle is dead afterwards.
    fn shutdown(&self, raw: RawHandle);

    /// Install the single event callback, replacing any previous one.
    ///
    /// # Safety
    ///
    /// `user_data` must stay valid until [`NativeSdk::clear_callback`] (or
    /// [`NativeSdk::shutdown`]) has returned.
    unsafe fn register_callback(&self, raw: RawHandle, cb: NativeCallback, user_data: *mut c_void);

    /// Remove the event callback. Once this returns, no invocation is in
    /// flight and none will start.
    fn clear_callback(&self, raw: RawHandle);

    /// Fire every pending callback on the calling thread.
    fn run_callbacks(&self, raw: RawHandle);

    // Local player

    fn persona_name(&self, raw: RawHandle) -> Option<String>;
    fn local_player(&self, raw: RawHandle) -> Option<PlayerInfo>;
    /// `value = None` clears the key.
    fn set_rich_presence(&self, raw: RawHandle, key: &str, value: Option<&str>) -> bool;

    // Overlay

    /// Returns `false` if the overlay refused the request.
    fn activate_overlay_to_web_page(&self, raw: RawHandle, url: &str, mode: OverlayMode) -> bool;
    fn activate_overlay(&self, raw: RawHandle, dialog: Dialog);
    fn activate_overlay_to_store(&self, raw: RawHandle, app_id: u32, flag: StoreFlag);

    // Stats

    fn get_stat_i32(&self, raw: RawHandle, name: &str) -> Option<i32>;
    fn set_stat_i32(&self, raw: RawHandle, name: &str, value: i32) -> bool;
    fn store_stats(&self, raw: RawHandle) -> bool;
    fn reset_all_stats(&self, raw: RawHandle, achievements_too: bool) -> bool;
    /// Start an asynchronous lookup. Completion arrives as a
    /// `LEADERBOARD_FIND_RESULT` callback carrying the returned call id.
    fn find_or_create_leaderboard(
        &self,
        raw: RawHandle,
        name: &str,
        sort: LeaderboardSortMethod,
        display: LeaderboardDisplayType,
    ) -> Option<ApiCallId>;
}
