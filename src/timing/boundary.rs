//! Boundary compilation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::TimingConfig;
use crate::cue::{CueElement, ElementId};

/// Highlight channel state of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightState {
    Upcoming,
    Current,
    Inactive,
}

/// Border channel state of one element. Independent of the highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderState {
    RedBorder,
    None,
}

/// What happens when a boundary fires.
///
/// Variant order is the tie-break rank: among boundaries with the same time,
/// later variants are applied later and therefore win within their channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryAction {
    Upcoming,
    Current,
    Inactive,
    RedBorder,
    None,
}

impl BoundaryAction {
    /// The highlight state this action sets, if it is on the highlight channel.
    pub fn highlight(self) -> Option<HighlightState> {
        match self {
            Self::Upcoming => Some(HighlightState::Upcoming),
            Self::Current => Some(HighlightState::Current),
            Self::Inactive => Some(HighlightState::Inactive),
            Self::RedBorder | Self::None => None,
        }
    }

    /// The border state this action sets, if it is on the border channel.
    pub fn border(self) -> Option<BorderState> {
        match self {
            Self::RedBorder => Some(BorderState::RedBorder),
            Self::None => Some(BorderState::None),
            Self::Upcoming | Self::Current | Self::Inactive => None,
        }
    }
}

/// Whom a boundary applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryTarget {
    Element(ElementId),
    /// Synthetic end-of-script marker.
    ScriptComplete,
}

/// A single time-triggered event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingBoundary {
    pub time_ms: i64,
    pub target: BoundaryTarget,
    pub action: BoundaryAction,
}

impl TimingBoundary {
    fn element(time_ms: i64, id: &ElementId, action: BoundaryAction) -> Self {
        Self {
            time_ms,
            target: BoundaryTarget::Element(id.clone()),
            action,
        }
    }

    fn sort_rank(&self) -> u8 {
        match self.target {
            BoundaryTarget::ScriptComplete => u8::MAX,
            BoundaryTarget::Element(_) => self.action as u8,
        }
    }
}

/// Windows that shape an element's boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingWindows {
    pub lookahead_ms: i64,
    pub lookbehind_ms: i64,
    pub red_border_ms: i64,
}

impl From<&TimingConfig> for TimingWindows {
    fn from(config: &TimingConfig) -> Self {
        Self {
            lookahead_ms: config.lookahead_ms,
            lookbehind_ms: config.lookbehind_ms,
            red_border_ms: config.red_border_ms,
        }
    }
}

/// Compiled, immutable boundary list for one element list and window set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    boundaries: Vec<TimingBoundary>,
    element_starts: HashMap<ElementId, i64>,
    complete_at_ms: Option<i64>,
    lookbehind_ms: i64,
}

impl Timeline {
    /// Boundaries in ascending time order.
    pub fn boundaries(&self) -> &[TimingBoundary] {
        &self.boundaries
    }

    /// Start time of an element, if it is part of this timeline.
    pub fn element_start(&self, id: &ElementId) -> Option<i64> {
        self.element_starts.get(id).copied()
    }

    pub fn element_ids(&self) -> impl Iterator<Item = &ElementId> {
        self.element_starts.keys()
    }

    /// Time of the synthetic script-complete boundary.
    pub fn complete_at_ms(&self) -> Option<i64> {
        self.complete_at_ms
    }

    pub fn lookbehind_ms(&self) -> i64 {
        self.lookbehind_ms
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

/// Compile an element list into a sorted [`Timeline`].
///
/// Per element: an optional `upcoming` at `start - lookahead`, `current` and
/// `red_border` at `start`, `none` at `start + red_border`, and `inactive` at
/// `start + lookbehind`. One script-complete boundary follows at the latest
/// `start + lookbehind`. Ties are ordered by [`BoundaryAction`] rank, with
/// script-complete last; equal ranks keep insertion order.
pub fn compile_boundaries(elements: &[CueElement], windows: TimingWindows) -> Timeline {
    let mut boundaries = Vec::with_capacity(elements.len() * 5 + 1);
    let mut element_starts = HashMap::with_capacity(elements.len());
    let mut complete_at_ms: Option<i64> = None;

    for element in elements {
        let id = &element.element_id;
        let start = element.offset_ms;

        if windows.lookahead_ms > 0 {
            boundaries.push(TimingBoundary::element(
                start.saturating_sub(windows.lookahead_ms),
                id,
                BoundaryAction::Upcoming,
            ));
        }
        boundaries.push(TimingBoundary::element(start, id, BoundaryAction::Current));
        boundaries.push(TimingBoundary::element(start, id, BoundaryAction::RedBorder));
        boundaries.push(TimingBoundary::element(
            start.saturating_add(windows.red_border_ms),
            id,
            BoundaryAction::None,
        ));
        let inactive_at = start.saturating_add(windows.lookbehind_ms);
        boundaries.push(TimingBoundary::element(
            inactive_at,
            id,
            BoundaryAction::Inactive,
        ));

        complete_at_ms = Some(complete_at_ms.map_or(inactive_at, |t| t.max(inactive_at)));
        element_starts.insert(id.clone(), start);
    }

    if let Some(time_ms) = complete_at_ms {
        boundaries.push(TimingBoundary {
            time_ms,
            target: BoundaryTarget::ScriptComplete,
            action: BoundaryAction::Inactive,
        });
    }

    // Stable: equal (time, rank) pairs keep insertion order.
    boundaries.sort_by_key(|b| (b.time_ms, b.sort_rank()));

    Timeline {
        boundaries,
        element_starts,
        complete_at_ms,
        lookbehind_ms: windows.lookbehind_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows() -> TimingWindows {
        TimingWindows {
            lookahead_ms: 3_000,
            lookbehind_ms: 5_000,
            red_border_ms: 5_000,
        }
    }

    fn elements() -> Vec<CueElement> {
        vec![
            CueElement::new("a", 0, 0),
            CueElement::new("b", 5_000, 1),
            CueElement::new("c", 15_000, 2),
        ]
    }

    fn for_element(timeline: &Timeline, id: &str) -> Vec<(i64, BoundaryAction)> {
        timeline
            .boundaries()
            .iter()
            .filter(|b| b.target == BoundaryTarget::Element(ElementId::new(id)))
            .map(|b| (b.time_ms, b.action))
            .collect()
    }

    #[test]
    fn element_boundaries_match_windows() {
        let timeline = compile_boundaries(&elements(), windows());
        assert_eq!(
            for_element(&timeline, "b"),
            vec![
                (2_000, BoundaryAction::Upcoming),
                (5_000, BoundaryAction::Current),
                (5_000, BoundaryAction::RedBorder),
                (10_000, BoundaryAction::Inactive),
                (10_000, BoundaryAction::None),
            ]
        );
    }

    #[test]
    fn zero_lookahead_emits_no_upcoming() {
        let mut w = windows();
        w.lookahead_ms = 0;
        let timeline = compile_boundaries(&elements(), w);
        assert!(
            timeline
                .boundaries()
                .iter()
                .all(|b| b.action != BoundaryAction::Upcoming)
        );
        assert_eq!(timeline.boundaries().len(), 3 * 4 + 1);
    }

    #[test]
    fn boundaries_are_time_ascending() {
        let elems = vec![
            CueElement::new("late", 90_000, 0),
            CueElement::new("early", 1_000, 1),
            CueElement::new("mid", 40_000, 2),
            CueElement::new("neg", -2_000, 3),
        ];
        let timeline = compile_boundaries(&elems, windows());
        assert!(
            timeline
                .boundaries()
                .windows(2)
                .all(|pair| pair[0].time_ms <= pair[1].time_ms)
        );
    }

    #[test]
    fn script_complete_follows_latest_lookbehind() {
        let timeline = compile_boundaries(&elements(), windows());
        assert_eq!(timeline.complete_at_ms(), Some(20_000));
        let last = timeline.boundaries().last().map(|b| b.target.clone());
        assert_eq!(last, Some(BoundaryTarget::ScriptComplete));
    }

    #[test]
    fn extreme_offsets_clamp_instead_of_overflowing() {
        let timeline = compile_boundaries(
            &[CueElement::new("lo", i64::MIN, 0), CueElement::new("hi", i64::MAX, 1)],
            windows(),
        );
        assert_eq!(timeline.complete_at_ms(), Some(i64::MAX));
        assert_eq!(timeline.boundaries()[0].time_ms, i64::MIN);
        assert!(timeline.boundaries().windows(2).all(|w| w[0].time_ms <= w[1].time_ms));
    }

    #[test]
    fn empty_list_has_no_completion() {
        let timeline = compile_boundaries(&[], windows());
        assert!(timeline.is_empty());
        assert_eq!(timeline.complete_at_ms(), None);
    }

    #[test]
    fn ties_resolve_by_action_rank() {
        let w = TimingWindows {
            lookahead_ms: 0,
            lookbehind_ms: 0,
            red_border_ms: 0,
        };
        let timeline = compile_boundaries(&[CueElement::new("x", 100, 0)], w);
        let actions: Vec<_> = timeline.boundaries().iter().map(|b| b.action).collect();
        assert_eq!(
            actions,
            vec![
                BoundaryAction::Current,
                BoundaryAction::Inactive,
                BoundaryAction::RedBorder,
                BoundaryAction::None,
                BoundaryAction::Inactive,
            ]
        );
        assert_eq!(
            timeline.boundaries().last().map(|b| &b.target),
            Some(&BoundaryTarget::ScriptComplete)
        );
    }

    #[test]
    fn channels_are_disjoint() {
        for action in [
            BoundaryAction::Upcoming,
            BoundaryAction::Current,
            BoundaryAction::Inactive,
            BoundaryAction::RedBorder,
            BoundaryAction::None,
        ] {
            assert!(action.highlight().is_some() != action.border().is_some());
        }
    }
}
