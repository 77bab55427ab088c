//! What a session tells its display.

use serde::Serialize;

use crate::cue::ElementId;
use crate::playback::PlaybackState;
use crate::transport::ConnectionStatus;

/// Consistent view of one session between two mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub script_id: String,
    pub playback_state: PlaybackState,
    pub show_time_ms: Option<i64>,
    pub cumulative_delay_ms: i64,
    /// Elements highlighted as current, in script order.
    pub current: Vec<ElementId>,
    /// Elements highlighted as upcoming, in script order.
    pub upcoming: Vec<ElementId>,
    /// Elements carrying the emphasis border, in script order.
    pub red_border: Vec<ElementId>,
    /// Elements to display after passed-cue hiding, in script order.
    pub visible: Vec<ElementId>,
    pub hidden_count: usize,
    pub connected_users: u32,
    pub connection: ConnectionStatus,
}

/// Broadcast to display consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Snapshot(SessionSnapshot),
    Connection(ConnectionStatus),
    ServerError(String),
}
