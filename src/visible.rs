//! Visible-set ("tetris") filtering.
//!
//! Cues that have fully passed drop out of the list so the next cue stays
//! near the top of the viewer's screen.

use crate::cue::CueElement;
use crate::playback::SyncPlayState;

/// Elements to display, in script order.
pub fn visible_elements<'a>(
    elements: &'a [CueElement],
    state: &SyncPlayState,
    tetris_enabled: bool,
) -> Vec<&'a CueElement> {
    if !tetris_enabled || state.passed_elements().is_empty() {
        return elements.iter().collect();
    }
    elements
        .iter()
        .filter(|e| !state.is_passed(&e.element_id))
        .collect()
}

/// Number of elements currently hidden.
pub fn hidden_count(elements: &[CueElement], state: &SyncPlayState, tetris_enabled: bool) -> usize {
    if !tetris_enabled {
        return 0;
    }
    elements
        .iter()
        .filter(|e| state.is_passed(&e.element_id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::ElementId;
    use crate::playback::{PlaybackCommand, PlaybackCommandMessage};
    use crate::timing::{TimingWindows, compile_boundaries, process_boundaries};

    fn setup() -> (Vec<CueElement>, SyncPlayState) {
        let elements = vec![
            CueElement::new("a", 0, 0),
            CueElement::new("b", 5_000, 1),
            CueElement::new("c", 15_000, 2),
        ];
        let mut state = SyncPlayState::new();
        state.set_timeline(compile_boundaries(
            &elements,
            TimingWindows {
                lookahead_ms: 3_000,
                lookbehind_ms: 5_000,
                red_border_ms: 5_000,
            },
        ));
        state.apply_command(&PlaybackCommandMessage::new(PlaybackCommand::Play), 0);
        (elements, state)
    }

    fn ids(elements: &[&CueElement]) -> Vec<String> {
        elements.iter().map(|e| e.element_id.to_string()).collect()
    }

    #[test]
    fn passed_cues_drop_out() {
        let (elements, mut state) = setup();
        process_boundaries(&mut state, 6_000);
        assert_eq!(ids(&visible_elements(&elements, &state, true)), ["b", "c"]);
        assert_eq!(hidden_count(&elements, &state, true), 1);

        process_boundaries(&mut state, 11_000);
        assert_eq!(ids(&visible_elements(&elements, &state, true)), ["c"]);
    }

    #[test]
    fn disabled_filter_shows_everything() {
        let (elements, mut state) = setup();
        process_boundaries(&mut state, 11_000);
        assert_eq!(visible_elements(&elements, &state, false).len(), 3);
        assert_eq!(hidden_count(&elements, &state, false), 0);
    }

    #[test]
    fn completion_brings_everything_back() {
        let (elements, mut state) = setup();
        process_boundaries(&mut state, 11_000);
        process_boundaries(&mut state, 25_000);
        assert!(!state.is_passed(&ElementId::new("a")));
        assert_eq!(visible_elements(&elements, &state, true).len(), 3);
    }
}
