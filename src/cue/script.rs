//! Script-level metadata: identity and declared start time.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Script metadata relevant to timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInfo {
    pub script_id: String,
    /// Declared show start as an RFC 3339 timestamp.
    #[serde(default)]
    pub start_time: Option<String>,
}

impl ScriptInfo {
    pub fn new(script_id: impl Into<String>, start_time: Option<String>) -> Self {
        Self {
            script_id: script_id.into(),
            start_time,
        }
    }

    /// Declared start time in epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidTimingState`] when the start time is
    /// missing or not RFC 3339.
    pub fn parsed_start_ms(&self) -> Result<i64> {
        let raw = self
            .start_time
            .as_deref()
            .ok_or_else(|| SyncError::InvalidTimingState("script has no start_time".into()))?;
        parse_timestamp_ms(raw)
    }

    /// Start time moved forward by `delta_ms`, as a new RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ScriptInfo::parsed_start_ms`].
    pub fn shifted_start_time(&self, delta_ms: i64) -> Result<String> {
        let start = self.parsed_start_ms()?;
        format_timestamp_ms(start.saturating_add(delta_ms))
    }
}

/// Parse an RFC 3339 timestamp into epoch milliseconds.
///
/// # Errors
///
/// Returns [`SyncError::InvalidTimingState`] if `raw` does not parse.
pub fn parse_timestamp_ms(raw: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| SyncError::InvalidTimingState(format!("unparseable start_time {raw:?}: {e}")))
}

/// Format epoch milliseconds as an RFC 3339 UTC timestamp.
///
/// # Errors
///
/// Returns [`SyncError::InvalidTimingState`] if the value is out of range.
pub fn format_timestamp_ms(ms: i64) -> Result<String> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| SyncError::InvalidTimingState(format!("timestamp {ms} out of range")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        let info = ScriptInfo::new("s", Some("2026-03-01T19:30:00+01:00".into()));
        let ms = info.parsed_start_ms().unwrap();
        assert_eq!(ms, parse_timestamp_ms("2026-03-01T18:30:00Z").unwrap());
    }

    #[test]
    fn missing_start_time_is_invalid_timing_state() {
        let info = ScriptInfo::new("s", None);
        assert!(matches!(
            info.parsed_start_ms(),
            Err(SyncError::InvalidTimingState(_))
        ));
    }

    #[test]
    fn garbage_start_time_is_invalid_timing_state() {
        let info = ScriptInfo::new("s", Some("half past seven".into()));
        assert!(matches!(
            info.parsed_start_ms(),
            Err(SyncError::InvalidTimingState(_))
        ));
    }

    #[test]
    fn shifted_start_time_moves_forward() {
        let info = ScriptInfo::new("s", Some("2026-03-01T19:30:00Z".into()));
        let shifted = info.shifted_start_time(8_000).unwrap();
        assert_eq!(shifted, "2026-03-01T19:30:08.000Z");
    }
}
