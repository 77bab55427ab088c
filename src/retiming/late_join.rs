//! Catch-up for viewers that join a session after pauses already happened.

use tracing::info;

use super::adjustment::BulkOffsetAdjustment;
use crate::cue::CueElement;
use crate::playback::{PlaybackState, SyncPlayState};

/// Applies the server's cumulative delay to unplayed cues once per opened script.
#[derive(Debug, Default)]
pub struct LateJoinReconciler {
    applied: bool,
}

impl LateJoinReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Plan the catch-up shift if this viewer is a late joiner.
    ///
    /// Eligible when the session carries cumulative delay that this viewer
    /// did not witness accruing (no pause ended locally), elements are
    /// loaded, and playback is running or paused. Returns `None` once applied.
    ///
    /// One locally witnessed pause disables catch-up until STOP clears it,
    /// since that delay was already absorbed live.
    pub fn reconcile(
        &mut self,
        state: &SyncPlayState,
        elements: &[CueElement],
        show_time_ms: i64,
    ) -> Option<BulkOffsetAdjustment> {
        if self.applied
            || state.cumulative_delay_ms() <= 0
            || state.last_pause().is_some()
            || elements.is_empty()
            || !matches!(
                state.playback_state(),
                PlaybackState::Playing | PlaybackState::Paused
            )
        {
            return None;
        }
        self.applied = true;

        let adjustment =
            BulkOffsetAdjustment::plan(elements, show_time_ms, state.cumulative_delay_ms());
        info!(
            cumulative_delay_ms = adjustment.delay_ms,
            show_time_ms,
            elements = adjustment.element_ids.len(),
            "late join: shifting unplayed cues by accumulated delay"
        );
        Some(adjustment)
    }

    /// Forget the applied flag when the viewer leaves the script.
    pub fn reset(&mut self) {
        self.applied = false;
    }
}
