//! Cue elements and their identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a cue element.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kind of script element.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    #[default]
    Cue,
    Note,
    Group,
    #[serde(other)]
    Other,
}

/// One timed entry in a cue script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueElement {
    pub element_id: ElementId,
    /// Scheduled time since script start.
    pub offset_ms: i64,
    #[serde(default)]
    pub sequence: u32,
    #[serde(default)]
    pub element_type: ElementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_element_id: Option<ElementId>,
    #[serde(default)]
    pub description: String,
}

impl CueElement {
    pub fn new(element_id: impl Into<ElementId>, offset_ms: i64, sequence: u32) -> Self {
        Self {
            element_id: element_id.into(),
            offset_ms,
            sequence,
            element_type: ElementType::Cue,
            parent_element_id: None,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<ElementId>) -> Self {
        self.parent_element_id = Some(parent.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Order elements by (offset, sequence).
pub fn sort_elements(elements: &mut [CueElement]) {
    elements.sort_by(|a, b| {
        a.offset_ms
            .cmp(&b.offset_ms)
            .then(a.sequence.cmp(&b.sequence))
    });
}
