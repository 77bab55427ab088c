//! Connection status as shown to the viewer.

use serde::Serialize;

/// Connection status of a script channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Not connected and not trying to.
    Disconnected,
    /// Establishing the initial connection.
    Connecting,
    /// Connected to the server.
    Connected,
    /// Waiting to retry after a dropped connection.
    Reconnecting {
        /// Number of attempts so far.
        attempt: u32,
    },
    /// Retries exhausted or reconnect disabled. Stays here until a manual
    /// reconnect or the script is reopened.
    Failed(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting { attempt } => write!(f, "Reconnecting (attempt {attempt})"),
            Self::Failed(msg) => write!(f, "Failed: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(ConnectionStatus::Connected.to_string(), "Connected");
        assert_eq!(
            ConnectionStatus::Reconnecting { attempt: 3 }.to_string(),
            "Reconnecting (attempt 3)"
        );
        assert_eq!(
            ConnectionStatus::Failed("boom".into()).to_string(),
            "Failed: boom"
        );
    }

    #[test]
    fn predicates() {
        assert!(ConnectionStatus::Connected.is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
        assert!(ConnectionStatus::Failed(String::new()).is_error());
        assert!(!ConnectionStatus::Disconnected.is_error());
    }
}
