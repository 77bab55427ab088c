//! Command handler for [`SyncPlayState`].

use tracing::{debug, info};

use super::command::{PlaybackCommand, PlaybackCommandMessage};
use super::state::{PauseRecord, PlaybackState, SyncPlayState};
use crate::timing::HighlightState;

/// Result of applying one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PlaybackState,
    pub to: PlaybackState,
    /// Set when this command ended a pause of non-zero length.
    pub pause: Option<PauseRecord>,
}

impl Transition {
    fn unchanged(state: PlaybackState) -> Self {
        Self {
            from: state,
            to: state,
            pause: None,
        }
    }

    /// Whether the command was accepted and changed anything.
    pub fn is_noop(&self) -> bool {
        self.from == self.to && self.pause.is_none()
    }
}

/// Round a delay up to the next whole second. Non-positive delays map to 0.
pub fn round_up_to_second(delay_ms: i64) -> i64 {
    if delay_ms <= 0 {
        return 0;
    }
    delay_ms.saturating_add(999) / 1_000 * 1_000
}

impl SyncPlayState {
    /// Apply a playback command at local wall-clock time `now_ms`.
    ///
    /// Pause bookkeeping uses the message's server timestamp when present so
    /// that every client measures the same pause length.
    pub fn apply_command(&mut self, msg: &PlaybackCommandMessage, now_ms: i64) -> Transition {
        let from = self.playback_state;
        let event_ms = msg.timestamp_ms.unwrap_or(now_ms);

        let transition = match (msg.command, from) {
            (PlaybackCommand::Stop, _) => {
                self.reset();
                Transition {
                    from,
                    to: PlaybackState::Stopped,
                    pause: None,
                }
            }
            (PlaybackCommand::Play, PlaybackState::Stopped) => {
                self.start_time_ms = Some(now_ms);
                self.current_time_ms = Some(msg.show_time_ms.unwrap_or(0));
                self.anchor_wall_ms = Some(now_ms);
                self.cumulative_delay_ms = 0;
                self.pause_start_time_ms = None;
                self.last_pause_duration_ms = None;
                self.last_pause = None;
                self.playback_state = PlaybackState::Playing;
                self.adopt_server_delay(msg.cumulative_delay_ms);
                Transition {
                    from,
                    to: PlaybackState::Playing,
                    pause: None,
                }
            }
            (PlaybackCommand::Play, PlaybackState::Paused) => {
                // The show clock keeps running through a pause; retiming moves the cues.
                let paused_for = self
                    .pause_start_time_ms
                    .map_or(0, |started| (event_ms - started).max(0));
                let resumed_show_ms = msg.show_time_ms.or_else(|| {
                    self.current_time_ms
                        .map(|show| show.saturating_add(paused_for))
                });
                let pause = self.finish_pause(event_ms);
                self.resume_at(resumed_show_ms, now_ms);
                self.adopt_server_delay(msg.cumulative_delay_ms);
                Transition {
                    from,
                    to: PlaybackState::Playing,
                    pause,
                }
            }
            (PlaybackCommand::Play, PlaybackState::Playing)
            | (PlaybackCommand::Play, PlaybackState::Safety)
            | (PlaybackCommand::Play, PlaybackState::Complete) => {
                self.resume_at(msg.show_time_ms, now_ms);
                self.adopt_server_delay(msg.cumulative_delay_ms);
                Transition {
                    from,
                    to: PlaybackState::Playing,
                    pause: None,
                }
            }
            (PlaybackCommand::Pause, PlaybackState::Playing) => {
                self.freeze(now_ms);
                self.pause_start_time_ms = Some(event_ms);
                self.playback_state = PlaybackState::Paused;
                Transition {
                    from,
                    to: PlaybackState::Paused,
                    pause: None,
                }
            }
            // A viewer opening mid-pause receives the pause as its first command.
            (PlaybackCommand::Pause, PlaybackState::Stopped) if msg.show_time_ms.is_some() => {
                self.start_time_ms = Some(now_ms);
                self.current_time_ms = msg.show_time_ms;
                self.anchor_wall_ms = Some(now_ms);
                self.pause_start_time_ms = Some(event_ms);
                self.playback_state = PlaybackState::Paused;
                self.adopt_server_delay(msg.cumulative_delay_ms);
                Transition {
                    from,
                    to: PlaybackState::Paused,
                    pause: None,
                }
            }
            (PlaybackCommand::Safety, state) if state.is_running() => {
                self.freeze(now_ms);
                self.playback_state = PlaybackState::Safety;
                Transition {
                    from,
                    to: PlaybackState::Safety,
                    pause: None,
                }
            }
            (PlaybackCommand::Complete, state) if state.is_running() => {
                self.freeze(now_ms);
                self.complete();
                Transition {
                    from,
                    to: PlaybackState::Complete,
                    pause: None,
                }
            }
            (command, state) => {
                debug!(%command, %state, "ignoring playback command not valid in current state");
                Transition::unchanged(state)
            }
        };

        if !transition.is_noop() {
            info!(
                command = %msg.command,
                from = %transition.from,
                to = %transition.to,
                cumulative_delay_ms = self.cumulative_delay_ms,
                "playback transition"
            );
        }
        transition
    }

    /// Force the terminal state: every element inactive, nothing hidden.
    pub(crate) fn complete(&mut self) {
        self.playback_state = PlaybackState::Complete;
        for state in self.element_states.values_mut() {
            *state = HighlightState::Inactive;
        }
        for id in self.timeline.element_ids() {
            self.element_states
                .insert(id.clone(), HighlightState::Inactive);
        }
        self.passed_elements.clear();
    }

    fn reset(&mut self) {
        *self = Self {
            pause_sequence: self.pause_sequence,
            ..Self::default()
        };
    }

    fn freeze(&mut self, now_ms: i64) {
        if let Some(show) = self.show_time_at(now_ms) {
            self.current_time_ms = Some(show);
        }
        self.anchor_wall_ms = Some(now_ms);
    }

    fn resume_at(&mut self, show_time_ms: Option<i64>, now_ms: i64) {
        if let Some(show) = show_time_ms {
            self.current_time_ms = Some(show);
        }
        self.anchor_wall_ms = Some(now_ms);
        self.playback_state = PlaybackState::Playing;
    }

    fn finish_pause(&mut self, event_ms: i64) -> Option<PauseRecord> {
        let started = self.pause_start_time_ms.take()?;
        let duration_ms = (event_ms - started).max(0);
        self.last_pause_duration_ms = Some(duration_ms);
        if duration_ms == 0 {
            return None;
        }
        self.cumulative_delay_ms += round_up_to_second(duration_ms);
        self.pause_sequence += 1;
        let record = PauseRecord {
            sequence: self.pause_sequence,
            duration_ms,
            paused_at_show_ms: self.current_time_ms.unwrap_or(0),
        };
        self.last_pause = Some(record);
        Some(record)
    }

    /// Raise the local cumulative delay to the server's figure. Never lowers it.
    fn adopt_server_delay(&mut self, server_delay_ms: Option<i64>) {
        if let Some(server) = server_delay_ms
            && server > self.cumulative_delay_ms
        {
            debug!(
                local = self.cumulative_delay_ms,
                server, "adopting server cumulative delay"
            );
            self.cumulative_delay_ms = server;
        }
    }
}
