//! Playback commands as carried on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Playback command issued by the controlling client and relayed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackCommand {
    Play,
    Pause,
    Safety,
    Complete,
    Stop,
}

impl fmt::Display for PlaybackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Safety => "SAFETY",
            Self::Complete => "COMPLETE",
            Self::Stop => "STOP",
        };
        f.write_str(name)
    }
}

/// A playback command with its timing payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackCommandMessage {
    pub command: PlaybackCommand,
    /// Server wall-clock time at which the command was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
    /// Show time at the moment of the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_time_ms: Option<i64>,
    /// Authoritative declared start time (sent on resume).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Authoritative cumulative delay (sent on resume and to late joiners).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_delay_ms: Option<i64>,
}

impl PlaybackCommandMessage {
    pub fn new(command: PlaybackCommand) -> Self {
        Self {
            command,
            timestamp_ms: None,
            show_time_ms: None,
            start_time: None,
            cumulative_delay_ms: None,
        }
    }

    #[must_use]
    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    #[must_use]
    pub fn with_show_time(mut self, show_time_ms: i64) -> Self {
        self.show_time_ms = Some(show_time_ms);
        self
    }

    #[must_use]
    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = Some(start_time.into());
        self
    }

    #[must_use]
    pub fn with_cumulative_delay(mut self, cumulative_delay_ms: i64) -> Self {
        self.cumulative_delay_ms = Some(cumulative_delay_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn command_names_are_screaming_case() {
        let json = serde_json::to_string(&PlaybackCommand::Safety).unwrap();
        assert_eq!(json, "\"SAFETY\"");
        let parsed: PlaybackCommand = serde_json::from_str("\"COMPLETE\"").unwrap();
        assert_eq!(parsed, PlaybackCommand::Complete);
        assert_eq!(PlaybackCommand::Play.to_string(), "PLAY");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let msg = PlaybackCommandMessage::new(PlaybackCommand::Pause).at(42);
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"command":"PAUSE","timestamp_ms":42}"#);
    }
}
