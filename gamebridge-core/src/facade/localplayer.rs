//! `facade.localplayer()`: identity of the signed-in player.
//!
//! Display-only queries never fail once the facade is initialized; unknown
//! values come back as empty strings or zero.

use std::fmt;

use serde::Serialize;

use crate::error::BindingError;
use crate::facade::Facade;

/// 64-bit platform id of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PlayerId(u64);

impl PlayerId {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// The 32-bit account number carried in the low half of the id.
    pub fn account_id(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct LocalPlayer<'a> {
    facade: &'a Facade,
}

impl<'a> LocalPlayer<'a> {
    pub(crate) fn new(facade: &'a Facade) -> Self {
        Self { facade }
    }

    /// Display name; empty when the platform does not know it.
    pub fn get_name(&self) -> Result<String, BindingError> {
        self.facade
            .call(|native, raw| native.persona_name(raw).unwrap_or_default())
    }

    pub fn get_id(&self) -> Result<Option<PlayerId>, BindingError> {
        self.facade
            .call(|native, raw| native.local_player(raw).map(|p| PlayerId(p.id)))
    }

    /// Platform level; 0 when unknown.
    pub fn get_level(&self) -> Result<u32, BindingError> {
        self.facade
            .call(|native, raw| native.local_player(raw).map_or(0, |p| p.level))
    }

    /// Two-letter country code derived from the player's IP; empty when unknown.
    pub fn get_ip_country(&self) -> Result<String, BindingError> {
        self.facade
            .call(|native, raw| native.local_player(raw).map(|p| p.ip_country).unwrap_or_default())
    }

    /// Set (or with `None`, clear) a rich presence key. The resulting
    /// `PersonaStateChange` is delivered on the next pump.
    pub fn set_rich_presence(&self, key: &str, value: Option<&str>) -> Result<bool, BindingError> {
        self.facade.handle()?;
        if key.is_empty() {
            return Err(BindingError::InvalidArgument("rich presence key is empty".to_string()));
        }
        self.facade
            .call(|native, raw| native.set_rich_presence(raw, key, value))
    }
}
