//! Cue script content as seen by the playback engine.
//!
//! The content itself is owned by an external data store; the engine only
//! reads it, except for offset rewrites performed by retiming.

pub mod element;
pub mod script;

pub use element::{CueElement, ElementId, ElementType, sort_elements};
pub use script::ScriptInfo;
