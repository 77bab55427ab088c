//! Content operations carried by `script_update` messages.

use serde::{Deserialize, Serialize};

use crate::cue::{CueElement, ElementId, ElementType};
use crate::error::{Result, SyncError};
use crate::retiming::BulkOffsetAdjustment;

/// Field changes for one existing element. Absent fields stay as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementChanges {
    pub element_id: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<ElementType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ElementChanges {
    /// Apply to `element`; returns whether anything changed.
    pub fn apply_to(&self, element: &mut CueElement) -> bool {
        let before = element.clone();
        if let Some(offset) = self.offset_ms {
            element.offset_ms = offset;
        }
        if let Some(sequence) = self.sequence {
            element.sequence = sequence;
        }
        if let Some(element_type) = self.element_type {
            element.element_type = element_type;
        }
        if let Some(description) = &self.description {
            element.description.clone_from(description);
        }
        *element != before
    }
}

/// Script metadata changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInfoChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

/// One content operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "update_type", content = "changes", rename_all = "snake_case")]
pub enum ScriptUpdate {
    ElementUpdate(ElementChanges),
    ElementCreate(CueElement),
    ElementDelete { element_id: ElementId },
    BulkOffsetAdjustment(BulkOffsetAdjustment),
    ScriptInfo(ScriptInfoChanges),
}

impl ScriptUpdate {
    /// Decode from the `update_type` / `changes` pair of a wire message.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MessageParse`] for unknown update types or
    /// malformed changes.
    pub fn from_wire(update_type: &str, changes: serde_json::Value) -> Result<Self> {
        serde_json::from_value(serde_json::json!({
            "update_type": update_type,
            "changes": changes,
        }))
        .map_err(|e| SyncError::MessageParse(format!("script_update {update_type:?}: {e}")))
    }

    /// Split into the `update_type` / `changes` pair for sending.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Json`] if serialization fails.
    pub fn to_wire(&self) -> Result<(String, serde_json::Value)> {
        let mut value = serde_json::to_value(self)?;
        let changes = value
            .get_mut("changes")
            .map(serde_json::Value::take)
            .unwrap_or_default();
        let update_type = value
            .get("update_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();
        Ok((update_type, changes))
    }

    /// Identifier used to drop echoes of operations already applied.
    pub fn operation_id(&self) -> Option<&str> {
        match self {
            Self::BulkOffsetAdjustment(adj) => Some(&adj.operation_id),
            _ => None,
        }
    }
}
