//! Async driver: the single loop that serializes ticks and inbound events.

use std::future::pending;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::events::SessionEvent;
use super::handle::ScriptSession;
use crate::transport::TransportEvent;

/// Default capacity of the display event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Runs one [`ScriptSession`] until cancelled.
///
/// Each loop iteration handles exactly one of: cancellation, one transport
/// event, or one boundary tick. The timer is re-armed from the next boundary
/// after every iteration rather than polling at a fixed rate.
pub struct SessionDriver {
    session: ScriptSession,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
}

impl SessionDriver {
    pub fn new(session: ScriptSession) -> Self {
        Self::with_capacity(session, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(session: ScriptSession, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            session,
            events,
            cancel: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Token that stops [`run`](Self::run) and drops any pending tick.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> &ScriptSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ScriptSession {
        &mut self.session
    }

    /// Drive the session. Returns it, already reset by `leave`, once cancelled.
    pub async fn run(
        mut self,
        mut transport: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> ScriptSession {
        let script_id = self.session.script_id().to_owned();
        info!(%script_id, "session driver started");

        let cancel = self.cancel.clone();
        let mut transport_open = true;
        let mut deadline = self.tick();
        self.emit_snapshot();

        loop {
            let wake_at = deadline;
            let timer = async move {
                match wake_at {
                    Some(at) => sleep_until(at).await,
                    None => pending::<()>().await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                event = transport.recv(), if transport_open => {
                    let Some(event) = event else {
                        debug!(%script_id, "transport closed; running on local clock only");
                        transport_open = false;
                        continue;
                    };
                    self.forward(&event);
                    let changed = self.session.handle_transport_event(event);
                    let ticked = self.tick_changed(&mut deadline);
                    if changed || ticked {
                        self.emit_snapshot();
                    }
                }
                () = timer => {
                    if self.tick_changed(&mut deadline) {
                        self.emit_snapshot();
                    }
                }
            }
        }

        self.session.leave();
        info!(%script_id, "session driver stopped");
        self.session
    }

    fn tick(&mut self) -> Option<Instant> {
        self.session
            .tick()
            .next_tick
            .map(|wait| Instant::now() + wait)
    }

    fn tick_changed(&mut self, deadline: &mut Option<Instant>) -> bool {
        let outcome = self.session.tick();
        *deadline = outcome.next_tick.map(|wait| Instant::now() + wait);
        outcome.changed
    }

    fn forward(&self, event: &TransportEvent) {
        let forwarded = match event {
            TransportEvent::Status(status) => SessionEvent::Connection(status.clone()),
            TransportEvent::ServerError(message) => SessionEvent::ServerError(message.clone()),
            _ => return,
        };
        // No subscribers is fine.
        let _ = self.events.send(forwarded);
    }

    fn emit_snapshot(&self) {
        let _ = self.events.send(SessionEvent::Snapshot(self.session.snapshot()));
    }
}
