//! Session-scoped playback for one viewed script.
//!
//! A [`ScriptSession`] is created when a viewer opens a script and reset when
//! they leave. [`SessionDriver`] runs it on tokio, feeding transport events
//! and boundary ticks through one loop.

pub mod driver;
pub mod events;
pub mod handle;
pub mod publisher;
pub mod update;

pub use driver::{DEFAULT_EVENT_CAPACITY, SessionDriver};
pub use events::{SessionEvent, SessionSnapshot};
pub use handle::{ScriptSession, TickOutcome};
pub use publisher::{NullPublisher, RecordingPublisher, UpdatePublisher};
pub use update::{ElementChanges, ScriptInfoChanges, ScriptUpdate};
