//! Binding configuration.
//!
//! Looked up in order: an explicit path, `$GAMEBRIDGE_CONFIG`, then
//! `~/.config/gamebridge/gamebridge.toml`. A missing file at the default
//! location means defaults; a missing explicit file is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use gamebridge_native::LoopbackConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "GAMEBRIDGE_CONFIG";

/// Default host pump cadence, ~30 Hz.
pub const DEFAULT_PUMP_INTERVAL_MS: u64 = 33;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Period of the internal pump loop.
    pub pump_interval_ms: u64,
    /// Permit `init` again on a facade that has been shut down.
    pub allow_reinit: bool,
    /// Behaviour of the in-process runtime used when no platform SDK is supplied.
    pub loopback: LoopbackConfig,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            pump_interval_ms: DEFAULT_PUMP_INTERVAL_MS,
            allow_reinit: false,
            loopback: LoopbackConfig::default(),
        }
    }
}

impl BindingConfig {
    pub fn pump_interval(&self) -> Duration {
        Duration::from_millis(self.pump_interval_ms.max(1))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid gamebridge config")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Resolve and load the configuration (see module docs for the order).
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Self::from_file(Path::new(&path));
            }
        }
        let path = default_path();
        if path.exists() {
            tracing::debug!("loading config from {}", path.display());
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gamebridge")
}

pub fn default_path() -> PathBuf {
    config_dir().join("gamebridge.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BindingConfig::default();
        assert_eq!(config.pump_interval(), Duration::from_millis(33));
        assert!(!config.allow_reinit);
        assert_eq!(config.loopback.persona_name.as_deref(), Some("Tester"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BindingConfig::from_toml_str(
            r#"
            pump_interval_ms = 16

            [loopback]
            persona_name = "Ada"
            accepted_app_ids = [480]

            [loopback.stats]
            wins = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.pump_interval_ms, 16);
        assert_eq!(config.loopback.persona_name.as_deref(), Some("Ada"));
        assert_eq!(config.loopback.accepted_app_ids, vec![480]);
        assert_eq!(config.loopback.stats.get("wins"), Some(&2));
        assert!(config.loopback.overlay_enabled);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = BindingConfig {
            pump_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.pump_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "allow_reinit = true").unwrap();
        let config = BindingConfig::load(Some(file.path())).unwrap();
        assert!(config.allow_reinit);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = BindingConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("nope.toml"));
    }

    #[test]
    fn test_invalid_toml_fails() {
        assert!(BindingConfig::from_toml_str("pump_interval_ms = \"fast\"").is_err());
    }
}
