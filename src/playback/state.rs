//! The synchronized playback aggregate.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::cue::ElementId;
use crate::timing::{BorderState, HighlightState, Timeline};

/// Playback state of a script.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
    Safety,
    Complete,
}

impl PlaybackState {
    /// States in which the show clock has been started.
    pub fn is_running(self) -> bool {
        !matches!(self, Self::Stopped)
    }

    /// States in which passed elements may be hidden.
    pub fn allows_passed(self) -> bool {
        matches!(self, Self::Playing | Self::Paused | Self::Safety)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "STOPPED",
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
            Self::Safety => "SAFETY",
            Self::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

/// A completed pause, handed to retiming exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseRecord {
    /// Monotonic per session; the retiming guard keys on this.
    pub sequence: u64,
    /// Raw wall-clock pause length.
    pub duration_ms: i64,
    /// Show time at which playback was paused.
    pub paused_at_show_ms: i64,
}

/// Per-script synchronized playback state.
#[derive(Debug, Clone, Default)]
pub struct SyncPlayState {
    pub(crate) playback_state: PlaybackState,
    /// Wall-clock time the session started playing.
    pub(crate) start_time_ms: Option<i64>,
    /// Show time as of `anchor_wall_ms`.
    pub(crate) current_time_ms: Option<i64>,
    /// Wall-clock time at which `current_time_ms` was last set.
    pub(crate) anchor_wall_ms: Option<i64>,
    pub(crate) pause_start_time_ms: Option<i64>,
    pub(crate) cumulative_delay_ms: i64,
    pub(crate) last_pause_duration_ms: Option<i64>,
    pub(crate) last_pause: Option<PauseRecord>,
    pub(crate) pause_sequence: u64,
    pub(crate) element_states: HashMap<ElementId, HighlightState>,
    pub(crate) element_border_states: HashMap<ElementId, BorderState>,
    pub(crate) timeline: Timeline,
    pub(crate) passed_elements: HashSet<ElementId>,
}

impl SyncPlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback_state
    }

    pub fn start_time_ms(&self) -> Option<i64> {
        self.start_time_ms
    }

    /// Show time as of the last anchor; meaningful only when not stopped.
    pub fn current_time_ms(&self) -> Option<i64> {
        self.current_time_ms
    }

    pub fn pause_start_time_ms(&self) -> Option<i64> {
        self.pause_start_time_ms
    }

    pub fn cumulative_delay_ms(&self) -> i64 {
        self.cumulative_delay_ms
    }

    pub fn last_pause_duration_ms(&self) -> Option<i64> {
        self.last_pause_duration_ms
    }

    /// The most recent pause this client witnessed end, if any.
    pub fn last_pause(&self) -> Option<PauseRecord> {
        self.last_pause
    }

    pub fn highlight(&self, id: &ElementId) -> Option<HighlightState> {
        self.element_states.get(id).copied()
    }

    pub fn border(&self, id: &ElementId) -> Option<BorderState> {
        self.element_border_states.get(id).copied()
    }

    pub fn element_states(&self) -> &HashMap<ElementId, HighlightState> {
        &self.element_states
    }

    pub fn element_border_states(&self) -> &HashMap<ElementId, BorderState> {
        &self.element_border_states
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn passed_elements(&self) -> &HashSet<ElementId> {
        &self.passed_elements
    }

    pub fn is_passed(&self, id: &ElementId) -> bool {
        self.passed_elements.contains(id)
    }

    /// Show time at wall-clock `now_ms`.
    ///
    /// Advances with the wall clock while playing and is frozen otherwise.
    pub fn show_time_at(&self, now_ms: i64) -> Option<i64> {
        let current = self.current_time_ms?;
        match (self.playback_state, self.anchor_wall_ms) {
            (PlaybackState::Playing, Some(anchor)) => {
                Some(current.saturating_add((now_ms - anchor).max(0)))
            }
            (PlaybackState::Stopped, _) => None,
            _ => Some(current),
        }
    }

    /// Replace the compiled timeline. Element state maps are kept.
    pub(crate) fn set_timeline(&mut self, timeline: Timeline) {
        self.timeline = timeline;
    }

    /// Drop all per-element state for a deleted element.
    pub(crate) fn forget_element(&mut self, id: &ElementId) {
        self.element_states.remove(id);
        self.element_border_states.remove(id);
        self.passed_elements.remove(id);
    }
}
