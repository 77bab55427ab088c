//! Realtime channel to the script server.
//!
//! One WebSocket per viewed script, addressed as `/ws/scripts/{id}` and
//! authenticated with a user or share token. Dropped connections are retried
//! with exponential backoff up to a fixed number of attempts.

pub mod auth;
pub mod backoff;
pub mod connection;
pub mod protocol;
pub mod status;

pub use auth::{AuthToken, StaticTokenSource, TokenSource, build_script_url};
pub use backoff::ReconnectPolicy;
pub use connection::{ConnectionSnapshot, OutboundSender, ScriptConnection, TransportEvent};
pub use protocol::{InboundMessage, OutboundMessage, decode_inbound};
pub use status::ConnectionStatus;
