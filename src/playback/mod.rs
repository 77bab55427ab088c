//! Playback state machine.
//!
//! [`SyncPlayState`] is the per-script aggregate every viewer keeps in sync.
//! It is only mutated by [`SyncPlayState::apply_command`] and by the boundary
//! processor.

pub mod command;
pub mod machine;
pub mod state;

pub use command::{PlaybackCommand, PlaybackCommandMessage};
pub use machine::{Transition, round_up_to_second};
pub use state::{PauseRecord, PlaybackState, SyncPlayState};
