//! Error types for the cue synchronization engine.

/// Top-level error type for cuesync.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Connecting to or sending on the realtime channel failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// An inbound payload could not be decoded.
    #[error("message parse error: {0}")]
    MessageParse(String),

    /// The script's timing anchor is missing or unusable.
    #[error("invalid timing state: {0}")]
    InvalidTimingState(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SyncError>;
