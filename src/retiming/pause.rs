//! Pause-duration retiming.

use tracing::{debug, info, warn};

use super::adjustment::BulkOffsetAdjustment;
use crate::cue::{CueElement, ScriptInfo};
use crate::playback::{PauseRecord, round_up_to_second};

/// What retiming decided for one pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetimingOutcome {
    /// This pause was already processed.
    Duplicate,
    /// Nothing to do; the reason is for logs.
    Skipped(String),
    /// The show had not started yet: move the declared start time.
    StartTimeShifted {
        new_start_time: String,
        delay_ms: i64,
    },
    /// The show is running: move every unplayed cue.
    OffsetsShifted(BulkOffsetAdjustment),
}

/// Turns finished pauses into retiming decisions, at most once per pause.
#[derive(Debug, Default)]
pub struct RetimingEngine {
    last_processed: Option<u64>,
}

impl RetimingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide how to absorb `pause`.
    ///
    /// `now_ms` is wall-clock time and decides between the pre-show and
    /// mid-show cases. Nothing is mutated here; the caller applies the outcome.
    pub fn on_pause_resumed(
        &mut self,
        pause: PauseRecord,
        script: &ScriptInfo,
        elements: &[CueElement],
        now_ms: i64,
    ) -> RetimingOutcome {
        if self.last_processed.is_some_and(|seq| seq >= pause.sequence) {
            debug!(sequence = pause.sequence, "duplicate retiming trigger suppressed");
            return RetimingOutcome::Duplicate;
        }
        self.last_processed = Some(pause.sequence);

        let delay_ms = round_up_to_second(pause.duration_ms);
        if delay_ms == 0 {
            return RetimingOutcome::Skipped("zero-length pause".into());
        }

        let start_ms = match script.parsed_start_ms() {
            Ok(ms) => ms,
            Err(e) => {
                warn!(script_id = %script.script_id, error = %e, "skipping retiming");
                return RetimingOutcome::Skipped(e.to_string());
            }
        };

        if now_ms < start_ms {
            return match script.shifted_start_time(delay_ms) {
                Ok(new_start_time) => {
                    info!(
                        script_id = %script.script_id,
                        delay_ms,
                        %new_start_time,
                        "pre-show pause: shifting declared start time"
                    );
                    RetimingOutcome::StartTimeShifted {
                        new_start_time,
                        delay_ms,
                    }
                }
                Err(e) => {
                    warn!(script_id = %script.script_id, error = %e, "skipping retiming");
                    RetimingOutcome::Skipped(e.to_string())
                }
            };
        }

        let adjustment = BulkOffsetAdjustment::plan(elements, pause.paused_at_show_ms, delay_ms);
        if adjustment.is_empty() {
            return RetimingOutcome::Skipped("no unplayed elements".into());
        }
        info!(
            script_id = %script.script_id,
            delay_ms,
            reference_time_ms = pause.paused_at_show_ms,
            elements = adjustment.element_ids.len(),
            "mid-show pause: shifting unplayed cues"
        );
        RetimingOutcome::OffsetsShifted(adjustment)
    }
}
