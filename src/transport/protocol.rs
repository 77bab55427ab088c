//! Wire messages exchanged with the script server.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::playback::{PlaybackCommand, PlaybackCommandMessage};

/// Messages received from the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    ConnectionEstablished {
        #[serde(default)]
        script_id: Option<String>,
        #[serde(default)]
        connected_users: Option<u32>,
    },
    ScriptUpdate {
        update_type: String,
        #[serde(default)]
        changes: serde_json::Value,
    },
    UpdateConfirmed {
        #[serde(default)]
        update_type: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    Pong {},
    PlaybackCommand {
        command: PlaybackCommand,
        #[serde(default)]
        timestamp_ms: Option<i64>,
        #[serde(default)]
        show_time_ms: Option<i64>,
        #[serde(default)]
        start_time: Option<String>,
        #[serde(default)]
        cumulative_delay_ms: Option<i64>,
    },
    ConnectionInfo {
        #[serde(default)]
        connected_users: Option<u32>,
    },
}

impl InboundMessage {
    /// The playback payload of a `playback_command` message.
    pub fn as_playback(&self) -> Option<PlaybackCommandMessage> {
        let Self::PlaybackCommand {
            command,
            timestamp_ms,
            show_time_ms,
            start_time,
            cumulative_delay_ms,
        } = self
        else {
            return None;
        };
        Some(PlaybackCommandMessage {
            command: *command,
            timestamp_ms: *timestamp_ms,
            show_time_ms: *show_time_ms,
            start_time: start_time.clone(),
            cumulative_delay_ms: *cumulative_delay_ms,
        })
    }
}

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ScriptUpdate {
        update_type: String,
        changes: serde_json::Value,
    },
    Ping,
    GetConnectionInfo,
    PlaybackCommand {
        command: PlaybackCommand,
        #[serde(skip_serializing_if = "Option::is_none")]
        show_time_ms: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        start_time: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cumulative_delay_ms: Option<i64>,
    },
}

impl OutboundMessage {
    pub fn playback(msg: &PlaybackCommandMessage) -> Self {
        Self::PlaybackCommand {
            command: msg.command,
            show_time_ms: msg.show_time_ms,
            start_time: msg.start_time.clone(),
            cumulative_delay_ms: msg.cumulative_delay_ms,
        }
    }

    /// Serialize to the JSON text frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns [`SyncError::MessageParse`] for anything that is not a known
/// message shape.
pub fn decode_inbound(text: &str) -> Result<InboundMessage> {
    serde_json::from_str(text).map_err(|e| SyncError::MessageParse(e.to_string()))
}
