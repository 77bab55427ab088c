//! Configuration types for the playback engine and its transport.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SyncError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Highlight timing windows and viewer display preferences.
    pub timing: TimingConfig,
    /// Realtime channel settings.
    pub transport: TransportConfig,
    /// How this client takes part in a shared session.
    pub session: SessionConfig,
}

/// Which client computes retiming after a pause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// Applies retiming broadcast by the controller.
    #[default]
    Viewer,
    /// Runs the playback controls: retimes on resume and broadcasts the result.
    Controller,
}

/// Session participation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub role: SessionRole,
}

/// Timing windows used when compiling cue boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long before a cue starts it is shown as upcoming. `0` disables the
    /// upcoming state entirely.
    pub lookahead_ms: i64,
    /// Grace period after a cue starts before it goes inactive.
    pub lookbehind_ms: i64,
    /// How long the emphasis border stays on after a cue starts.
    pub red_border_ms: i64,
    /// Hide cues that have already passed.
    pub tetris_enabled: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: 3_000,
            lookbehind_ms: 5_000,
            red_border_ms: 5_000,
            tetris_enabled: true,
        }
    }
}

/// Realtime channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base WebSocket URL; the script path is appended per connection.
    pub server_url: String,
    /// Reconnect automatically after an unexpected close.
    pub auto_reconnect: bool,
    /// Consecutive failed reconnects before giving up.
    pub max_reconnect_attempts: u32,
    /// First reconnect delay; doubles on every further attempt.
    pub base_reconnect_delay_ms: u64,
    /// Heartbeat interval.
    pub ping_interval_secs: u64,
    /// How often the connected-viewer count is refreshed.
    pub connection_info_interval_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:8000".to_owned(),
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            base_reconnect_delay_ms: 1_000,
            ping_interval_secs: 30,
            connection_info_interval_secs: 60,
        }
    }
}

impl TransportConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn connection_info_interval(&self) -> Duration {
        Duration::from_secs(self.connection_info_interval_secs.max(1))
    }

    pub fn base_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_delay_ms)
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/cuesync/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("cuesync").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("cuesync")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/cuesync-config/config.toml")
        }
    }

    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let t = &self.timing;
        if t.lookahead_ms < 0 {
            return Err(SyncError::Config("timing.lookahead_ms must be >= 0".into()));
        }
        if t.lookbehind_ms < 0 {
            return Err(SyncError::Config("timing.lookbehind_ms must be >= 0".into()));
        }
        if t.red_border_ms < 0 {
            return Err(SyncError::Config("timing.red_border_ms must be >= 0".into()));
        }
        if self.transport.max_reconnect_attempts == 0 {
            return Err(SyncError::Config(
                "transport.max_reconnect_attempts must be at least 1".into(),
            ));
        }
        if url::Url::parse(&self.transport.server_url).is_err() {
            return Err(SyncError::Config(format!(
                "transport.server_url is not a valid URL: {}",
                self.transport.server_url
            )));
        }
        Ok(())
    }
}
