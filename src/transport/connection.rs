//! Per-script WebSocket connection with automatic reconnection.
//!
//! [`ScriptConnection::open`] spawns one background task that owns the
//! socket. Inbound messages reach the session as [`TransportEvent`]s on an
//! mpsc channel; outbound messages go through an [`OutboundSender`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::auth::{TokenSource, build_script_url};
use super::backoff::ReconnectPolicy;
use super::protocol::{InboundMessage, OutboundMessage, decode_inbound};
use super::status::ConnectionStatus;
use crate::clock::SharedClock;
use crate::config::TransportConfig;
use crate::error::{Result, SyncError};
use crate::playback::PlaybackCommandMessage;

/// Something the connection task observed, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Status(ConnectionStatus),
    ConnectedUsers(u32),
    Playback(PlaybackCommandMessage),
    ScriptUpdate {
        update_type: String,
        changes: serde_json::Value,
    },
    UpdateConfirmed,
    ServerError(String),
}

/// Point-in-time view of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub last_error: Option<String>,
    pub connected_users: u32,
    pub last_pong_ms: Option<i64>,
    pub pending_updates: u32,
}

/// Shared mutable state protected by a mutex.
struct SharedState {
    status: ConnectionStatus,
    last_error: Option<String>,
    connected_users: u32,
    last_pong_ms: Option<i64>,
    pending_updates: u32,
}

fn lock(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    match shared.lock() {
        Ok(s) => s,
        Err(p) => p.into_inner(),
    }
}

#[derive(Debug)]
enum Control {
    Disconnect,
    Reconnect,
}

/// Cloneable handle for queueing outbound messages.
///
/// Messages queued while the socket is down are sent after the next open.
#[derive(Clone)]
pub struct OutboundSender {
    tx: mpsc::UnboundedSender<OutboundMessage>,
    shared: Arc<Mutex<SharedState>>,
}

impl OutboundSender {
    /// Queue a message for the server.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Channel`] if the connection task has exited.
    pub fn send(&self, msg: OutboundMessage) -> Result<()> {
        let is_update = matches!(msg, OutboundMessage::ScriptUpdate { .. });
        self.tx
            .send(msg)
            .map_err(|_| SyncError::Channel("connection task has stopped".into()))?;
        if is_update {
            lock(&self.shared).pending_updates += 1;
        }
        Ok(())
    }

    /// Queue a playback command for relay to every viewer.
    ///
    /// # Errors
    ///
    /// Same as [`OutboundSender::send`].
    pub fn send_playback(&self, msg: &PlaybackCommandMessage) -> Result<()> {
        self.send(OutboundMessage::playback(msg))
    }
}

/// Everything the background task needs.
struct LoopContext {
    server_url: String,
    script_id: String,
    tokens: Arc<dyn TokenSource>,
    clock: SharedClock,
    policy: ReconnectPolicy,
    auto_reconnect: bool,
    ping_interval: Duration,
    info_interval: Duration,
    shared: Arc<Mutex<SharedState>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
}

impl LoopContext {
    fn set_status(&self, status: ConnectionStatus) {
        {
            let mut s = lock(&self.shared);
            if s.status == status {
                return;
            }
            s.status = status.clone();
        }
        let _ = self.events.send(TransportEvent::Status(status));
    }
}

/// One live channel to the server for one script.
pub struct ScriptConnection {
    script_id: String,
    shared: Arc<Mutex<SharedState>>,
    outbound: OutboundSender,
    control: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ScriptConnection {
    /// Start connecting to `script_id`.
    ///
    /// Returns the handle and the receiver of inbound events. Must be called
    /// from within a tokio runtime.
    pub fn open(
        config: &TransportConfig,
        script_id: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
        clock: SharedClock,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let script_id = script_id.into();
        let shared = Arc::new(Mutex::new(SharedState {
            status: ConnectionStatus::Connecting,
            last_error: None,
            connected_users: 0,
            last_pong_ms: None,
            pending_updates: 0,
        }));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let ctx = LoopContext {
            server_url: config.server_url.clone(),
            script_id: script_id.clone(),
            tokens,
            clock,
            policy: ReconnectPolicy::from(config),
            auto_reconnect: config.auto_reconnect,
            ping_interval: config.ping_interval(),
            info_interval: config.connection_info_interval(),
            shared: Arc::clone(&shared),
            events: events_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(connection_loop(ctx, outbound_rx, control_rx));

        let outbound = OutboundSender {
            tx: outbound_tx,
            shared: Arc::clone(&shared),
        };

        (
            Self {
                script_id,
                shared,
                outbound,
                control: control_tx,
                cancel,
                task: Some(task),
            },
            events_rx,
        )
    }

    pub fn script_id(&self) -> &str {
        &self.script_id
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.shared).status.clone()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let s = lock(&self.shared);
        ConnectionSnapshot {
            status: s.status.clone(),
            last_error: s.last_error.clone(),
            connected_users: s.connected_users,
            last_pong_ms: s.last_pong_ms,
            pending_updates: s.pending_updates,
        }
    }

    pub fn sender(&self) -> OutboundSender {
        self.outbound.clone()
    }

    /// Close the socket and stay disconnected until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self) {
        let _ = self.control.send(Control::Disconnect);
    }

    /// Reset the attempt counter and connect again, clearing a failed state.
    pub fn reconnect(&self) {
        let _ = self.control.send(Control::Reconnect);
    }

    /// Stop the background task, including any pending backoff sleep.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ScriptConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How a single connection ended.
enum Ended {
    /// Manual disconnect requested.
    Requested,
    /// Shutdown requested.
    Cancelled,
}

/// Run the WebSocket connection loop with automatic reconnection.
async fn connection_loop(
    ctx: LoopContext,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
) {
    let mut attempt: u32 = 0;

    loop {
        ctx.set_status(if attempt == 0 {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Reconnecting { attempt }
        });

        let error = match try_connect(&ctx, &mut attempt, &mut outbound_rx, &mut control_rx).await {
            Ok(Ended::Cancelled) => break,
            Ok(Ended::Requested) => {
                info!(script_id = %ctx.script_id, "disconnected on request");
                ctx.set_status(ConnectionStatus::Disconnected);
                if !wait_for_reconnect(&ctx, &mut control_rx).await {
                    break;
                }
                attempt = 0;
                continue;
            }
            Err(e) => e.to_string(),
        };

        lock(&ctx.shared).last_error = Some(error.clone());
        attempt += 1;

        let delay = ctx.policy.delay_for(attempt).filter(|_| ctx.auto_reconnect);
        let Some(delay) = delay else {
            warn!(
                script_id = %ctx.script_id,
                attempt,
                error = %error,
                "giving up on connection"
            );
            ctx.set_status(ConnectionStatus::Failed(error));
            if !wait_for_reconnect(&ctx, &mut control_rx).await {
                break;
            }
            attempt = 0;
            continue;
        };

        warn!(
            script_id = %ctx.script_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "connection lost, retrying"
        );
        ctx.set_status(ConnectionStatus::Reconnecting { attempt });

        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
            ctrl = control_rx.recv() => match ctrl {
                Some(Control::Reconnect) => attempt = 0,
                Some(Control::Disconnect) => {
                    ctx.set_status(ConnectionStatus::Disconnected);
                    if !wait_for_reconnect(&ctx, &mut control_rx).await {
                        break;
                    }
                    attempt = 0;
                }
                None => break,
            },
        }
    }

    ctx.set_status(ConnectionStatus::Disconnected);
    debug!(script_id = %ctx.script_id, "connection task finished");
}

/// Park until a manual reconnect. Returns `false` on shutdown.
async fn wait_for_reconnect(
    ctx: &LoopContext,
    control_rx: &mut mpsc::UnboundedReceiver<Control>,
) -> bool {
    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return false,
            ctrl = control_rx.recv() => match ctrl {
                Some(Control::Reconnect) => return true,
                Some(Control::Disconnect) => {}
                None => return false,
            },
        }
    }
}

/// Attempt a single WebSocket connection.
///
/// Fails with [`SyncError::Transport`] on a failed connect or unexpected close.
async fn try_connect(
    ctx: &LoopContext,
    attempt: &mut u32,
    outbound_rx: &mut mpsc::UnboundedReceiver<OutboundMessage>,
    control_rx: &mut mpsc::UnboundedReceiver<Control>,
) -> Result<Ended> {
    let token = ctx
        .tokens
        .token()
        .await
        .map_err(|e| transport_error("token", e))?;
    let url = build_script_url(&ctx.server_url, &ctx.script_id, token.as_ref())?;

    let (ws_stream, _) = tokio::select! {
        _ = ctx.cancel.cancelled() => return Ok(Ended::Cancelled),
        r = connect_async(url.as_str()) => r.map_err(|e| transport_error("connect", e))?,
    };
    let (mut write, mut read) = ws_stream.split();

    {
        let mut s = lock(&ctx.shared);
        s.last_error = None;
    }
    *attempt = 0;
    ctx.set_status(ConnectionStatus::Connected);
    info!(script_id = %ctx.script_id, "connected");

    let info_request = OutboundMessage::GetConnectionInfo.to_json()?;
    write
        .send(Message::Text(info_request))
        .await
        .map_err(|e| transport_error("send connection info request", e))?;

    let mut ping_interval = tokio::time::interval(ctx.ping_interval);
    let mut info_interval = tokio::time::interval(ctx.info_interval);
    // Skip the first immediate ticks.
    ping_interval.tick().await;
    info_interval.tick().await;

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(Ended::Cancelled);
            }
            ctrl = control_rx.recv() => match ctrl {
                Some(Control::Disconnect) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(Ended::Requested);
                }
                Some(Control::Reconnect) => {
                    debug!(script_id = %ctx.script_id, "already connected, ignoring reconnect");
                }
            },
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_server_message(&text, ctx);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(SyncError::Transport("connection closed by server".into()));
                    }
                    Some(Err(e)) => {
                        return Err(transport_error("read", e));
                    }
                    _ => {} // Binary, Ping/Pong frames handled by tungstenite.
                }
            }
            Some(msg) = outbound_rx.recv() => {
                let json = match msg.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "dropping unserializable outbound message");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json)).await {
                    return Err(transport_error("send", e));
                }
            }
            _ = ping_interval.tick() => {
                if let Ok(json) = OutboundMessage::Ping.to_json()
                    && let Err(e) = write.send(Message::Text(json)).await
                {
                    return Err(transport_error("ping", e));
                }
            }
            _ = info_interval.tick() => {
                if let Ok(json) = OutboundMessage::GetConnectionInfo.to_json()
                    && let Err(e) = write.send(Message::Text(json)).await
                {
                    return Err(transport_error("send", e));
                }
            }
        }
    }
}

fn transport_error(what: &str, e: impl std::fmt::Display) -> SyncError {
    SyncError::Transport(format!("{what}: {e}"))
}

/// Process a server message: update shared state and forward to the session.
fn handle_server_message(text: &str, ctx: &LoopContext) {
    let msg = match decode_inbound(text) {
        Ok(m) => m,
        Err(e) => {
            debug!(script_id = %ctx.script_id, "ignoring unparseable server message: {e}");
            return;
        }
    };

    let event = match msg {
        InboundMessage::ConnectionEstablished {
            connected_users, ..
        }
        | InboundMessage::ConnectionInfo { connected_users } => {
            let Some(users) = connected_users else {
                return;
            };
            lock(&ctx.shared).connected_users = users;
            TransportEvent::ConnectedUsers(users)
        }
        InboundMessage::Pong {} => {
            lock(&ctx.shared).last_pong_ms = Some(ctx.clock.now_ms());
            return;
        }
        InboundMessage::UpdateConfirmed { .. } => {
            let mut s = lock(&ctx.shared);
            s.pending_updates = s.pending_updates.saturating_sub(1);
            TransportEvent::UpdateConfirmed
        }
        InboundMessage::Error { message } => {
            warn!(script_id = %ctx.script_id, %message, "server reported an error");
            lock(&ctx.shared).last_error = Some(message.clone());
            TransportEvent::ServerError(message)
        }
        InboundMessage::ScriptUpdate {
            update_type,
            changes,
        } => TransportEvent::ScriptUpdate {
            update_type,
            changes,
        },
        other @ InboundMessage::PlaybackCommand { .. } => match other.as_playback() {
            Some(cmd) => TransportEvent::Playback(cmd),
            None => return,
        },
    };

    // If the session is gone there is nobody left to tell.
    let _ = ctx.events.send(event);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::auth::StaticTokenSource;

    fn context() -> (LoopContext, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let ctx = LoopContext {
            server_url: "ws://127.0.0.1:1".into(),
            script_id: "s1".into(),
            tokens: Arc::new(StaticTokenSource::default()),
            clock: Arc::new(ManualClock::new(42)),
            policy: ReconnectPolicy::default(),
            auto_reconnect: true,
            ping_interval: Duration::from_secs(30),
            info_interval: Duration::from_secs(60),
            shared: Arc::new(Mutex::new(SharedState {
                status: ConnectionStatus::Connected,
                last_error: None,
                connected_users: 0,
                last_pong_ms: None,
                pending_updates: 2,
            })),
            events,
            cancel: CancellationToken::new(),
        };
        (ctx, rx)
    }

    #[test]
    fn garbage_is_dropped_without_events() {
        let (ctx, mut rx) = context();
        handle_server_message("{{{{", &ctx);
        handle_server_message(r#"{"type":"unknown_kind"}"#, &ctx);
        assert!(rx.try_recv().is_err());
        assert_eq!(lock(&ctx.shared).status, ConnectionStatus::Connected);
    }

    #[test]
    fn bookkeeping_messages_update_shared_state() {
        let (ctx, mut rx) = context();
        handle_server_message(r#"{"type":"connection_established","connected_users":4}"#, &ctx);
        handle_server_message(r#"{"type":"pong"}"#, &ctx);
        handle_server_message(r#"{"type":"update_confirmed"}"#, &ctx);
        handle_server_message(r#"{"type":"error","message":"nope"}"#, &ctx);

        let s = lock(&ctx.shared);
        assert_eq!(s.connected_users, 4);
        assert_eq!(s.last_pong_ms, Some(42));
        assert_eq!(s.pending_updates, 1);
        assert_eq!(s.last_error.as_deref(), Some("nope"));
        drop(s);

        assert_eq!(rx.try_recv().unwrap(), TransportEvent::ConnectedUsers(4));
        assert_eq!(rx.try_recv().unwrap(), TransportEvent::UpdateConfirmed);
        assert_eq!(rx.try_recv().unwrap(), TransportEvent::ServerError("nope".into()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn playback_commands_are_forwarded() {
        let (ctx, mut rx) = context();
        handle_server_message(
            r#"{"type":"playback_command","command":"PAUSE","timestamp_ms":5,"show_time_ms":20000}"#,
            &ctx,
        );
        let TransportEvent::Playback(cmd) = rx.try_recv().unwrap() else {
            unreachable!("expected playback event");
        };
        assert_eq!(cmd.show_time_ms, Some(20_000));
        assert_eq!(cmd.timestamp_ms, Some(5));
    }

    #[test]
    fn status_events_are_deduplicated() {
        let (ctx, mut rx) = context();
        ctx.set_status(ConnectionStatus::Connected);
        assert!(rx.try_recv().is_err());
        ctx.set_status(ConnectionStatus::Reconnecting { attempt: 1 });
        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::Status(ConnectionStatus::Reconnecting { attempt: 1 })
        );
    }

    #[tokio::test]
    async fn outbound_updates_count_as_pending() {
        let (ctx, _rx) = context();
        let (tx, mut out_rx) = mpsc::unbounded_channel();
        let sender = OutboundSender {
            tx,
            shared: Arc::clone(&ctx.shared),
        };
        sender.send(OutboundMessage::Ping).unwrap();
        sender
            .send(OutboundMessage::ScriptUpdate {
                update_type: "script_info".into(),
                changes: serde_json::json!({}),
            })
            .unwrap();
        assert_eq!(lock(&ctx.shared).pending_updates, 3);
        assert_eq!(out_rx.recv().await, Some(OutboundMessage::Ping));

        drop(out_rx);
        assert!(matches!(
            sender.send(OutboundMessage::Ping),
            Err(SyncError::Channel(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_gives_up_after_cap() {
        let config = TransportConfig {
            server_url: "ws://127.0.0.1:9".into(),
            max_reconnect_attempts: 2,
            base_reconnect_delay_ms: 10,
            ..TransportConfig::default()
        };
        let (conn, mut rx) = ScriptConnection::open(
            &config,
            "s1",
            Arc::new(StaticTokenSource::default()),
            Arc::new(ManualClock::new(0)),
        );
        let mut seen = Vec::new();
        while let Some(TransportEvent::Status(status)) = rx.recv().await {
            let failed = status.is_error();
            seen.push(status);
            if failed {
                break;
            }
        }
        assert_eq!(seen.first(), Some(&ConnectionStatus::Reconnecting { attempt: 1 }));
        assert!(seen.contains(&ConnectionStatus::Reconnecting { attempt: 2 }));
        assert!(matches!(seen.last(), Some(ConnectionStatus::Failed(_))));
        assert!(conn.snapshot().last_error.is_some());
        conn.close().await;
    }
}
