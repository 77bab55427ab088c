//! cuesync: synchronized playback of live theatrical cue scripts.
//!
//! Every viewer of a script highlights the same cue at the same moment, even
//! when viewers join late, the controller pauses and resumes, or the network
//! drops and reconnects.
//!
//! # Architecture
//!
//! - **Transport**: one WebSocket per viewed script with token auth and
//!   bounded exponential reconnect
//! - **Playback**: the PLAY / PAUSE / SAFETY / COMPLETE / STOP state machine
//!   and its pause and delay bookkeeping
//! - **Timing**: compiles cues into sorted time boundaries and folds them into
//!   per-cue highlight and border state
//! - **Retiming**: absorbs pauses by moving the start time or unplayed cues,
//!   and catches up late joiners
//! - **Visible**: hides cues that have passed
//! - **Session**: the single owner of one script's state and its async driver

pub mod clock;
pub mod config;
pub mod cue;
pub mod error;
pub mod playback;
pub mod retiming;
pub mod session;
pub mod timing;
pub mod transport;
pub mod visible;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{SessionRole, SyncConfig, TimingConfig, TransportConfig};
pub use cue::{CueElement, ElementId, ScriptInfo};
pub use error::{Result, SyncError};
pub use playback::{PlaybackCommand, PlaybackCommandMessage, PlaybackState, SyncPlayState};
pub use session::{ScriptSession, SessionDriver, SessionEvent, SessionSnapshot};
pub use transport::{ConnectionStatus, ScriptConnection, TransportEvent};
