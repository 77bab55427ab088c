//! Bulk offset adjustment: the deterministic transform shared between viewers.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::cue::{CueElement, ElementId};
use crate::error::{Result, SyncError};

/// Largest delay a single adjustment may carry (one day).
pub const MAX_ADJUSTMENT_DELAY_MS: i64 = 24 * 60 * 60 * 1_000;

/// Shift a set of not-yet-played elements by a fixed delay.
///
/// Applying the same adjustment to the same element list yields the same
/// offsets on every client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOffsetAdjustment {
    /// Unique per adjustment; receivers use it to drop echoes.
    pub operation_id: String,
    pub element_ids: Vec<ElementId>,
    pub delay_ms: i64,
    /// Only elements strictly after this show time are shifted.
    pub reference_time_ms: i64,
}

impl BulkOffsetAdjustment {
    /// Plan an adjustment covering every element after `reference_time_ms`.
    pub fn plan(elements: &[CueElement], reference_time_ms: i64, delay_ms: i64) -> Self {
        let element_ids = elements
            .iter()
            .filter(|e| e.offset_ms > reference_time_ms)
            .map(|e| e.element_id.clone())
            .collect();
        Self {
            operation_id: uuid::Uuid::new_v4().to_string(),
            element_ids,
            delay_ms,
            reference_time_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.element_ids.is_empty()
    }

    /// Reject adjustments no pause could have produced.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MessageParse`] when the delay is not positive or
    /// exceeds [`MAX_ADJUSTMENT_DELAY_MS`].
    pub fn validate(&self) -> Result<()> {
        if self.delay_ms <= 0 || self.delay_ms > MAX_ADJUSTMENT_DELAY_MS {
            return Err(SyncError::MessageParse(format!(
                "bulk offset adjustment {} has delay_ms {} outside 1..={MAX_ADJUSTMENT_DELAY_MS}",
                self.operation_id, self.delay_ms
            )));
        }
        Ok(())
    }

    /// Apply to `elements`, returning how many offsets changed.
    ///
    /// An element moves only if it is listed and its current offset is after
    /// the reference time.
    pub fn apply(&self, elements: &mut [CueElement]) -> usize {
        if self.delay_ms == 0 {
            return 0;
        }
        let listed: HashSet<&ElementId> = self.element_ids.iter().collect();
        let mut changed = 0;
        for element in elements.iter_mut() {
            if element.offset_ms > self.reference_time_ms && listed.contains(&element.element_id)
            {
                element.offset_ms = element.offset_ms.saturating_add(self.delay_ms);
                changed += 1;
            }
        }
        changed
    }
}
