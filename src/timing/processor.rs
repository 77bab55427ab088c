//! Boundary processing: fold fired boundaries into element state.

use tracing::{debug, trace};

use super::boundary::BoundaryTarget;
use crate::cue::ElementId;
use crate::playback::{PlaybackState, SyncPlayState};
use crate::timing::HighlightState;

/// What one processing pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// The script-complete boundary has fired.
    pub completed: bool,
    /// Highlight or border state changed for at least one element.
    pub changed: bool,
    /// Elements hidden for the first time by this pass.
    pub newly_passed: Vec<ElementId>,
}

/// Bring element state in line with show time `current_time_ms`.
///
/// Each element takes the last fired value on each channel; elements with no
/// fired boundary keep what they had. Once the script-complete boundary has
/// fired the state is forced to COMPLETE and nothing else is evaluated;
/// a COMPLETE state is terminal until the next command.
/// Calling this twice with the same time leaves the maps unchanged.
pub fn process_boundaries(state: &mut SyncPlayState, current_time_ms: i64) -> ProcessOutcome {
    let mut outcome = ProcessOutcome::default();
    if state.playback_state == PlaybackState::Stopped {
        return outcome;
    }

    if state.playback_state == PlaybackState::Complete {
        outcome.completed = true;
        return outcome;
    }

    if let Some(complete_at) = state.timeline.complete_at_ms()
        && complete_at <= current_time_ms
    {
        state.complete();
        outcome.completed = true;
        outcome.changed = true;
        debug!(current_time_ms, "script complete");
        return outcome;
    }

    let boundaries = state.timeline.boundaries();
    let fired = boundaries.partition_point(|b| b.time_ms <= current_time_ms);

    for boundary in &boundaries[..fired] {
        let BoundaryTarget::Element(id) = &boundary.target else {
            continue;
        };
        if let Some(highlight) = boundary.action.highlight()
            && state.element_states.get(id) != Some(&highlight)
        {
            state.element_states.insert(id.clone(), highlight);
            outcome.changed = true;
        }
        if let Some(border) = boundary.action.border()
            && state.element_border_states.get(id) != Some(&border)
        {
            state.element_border_states.insert(id.clone(), border);
            outcome.changed = true;
        }
    }

    if state.playback_state.allows_passed() {
        let lookbehind = state.timeline.lookbehind_ms();
        for (id, highlight) in &state.element_states {
            if *highlight != HighlightState::Inactive || state.passed_elements.contains(id) {
                continue;
            }
            let Some(start) = state.timeline.element_start(id) else {
                continue;
            };
            if current_time_ms > start.saturating_add(lookbehind) {
                outcome.newly_passed.push(id.clone());
            }
        }
        for id in &outcome.newly_passed {
            state.passed_elements.insert(id.clone());
        }
    }

    trace!(
        current_time_ms,
        fired,
        changed = outcome.changed,
        newly_passed = outcome.newly_passed.len(),
        "processed boundaries"
    );
    outcome
}
