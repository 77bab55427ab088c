//! Session-scoped owner of one viewed script.
//!
//! [`ScriptSession`] is the only writer of its [`SyncPlayState`]. Playback
//! commands, content updates and timer ticks all go through `&mut self`, so
//! every mutation completes before the next one starts.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::events::SessionSnapshot;
use super::publisher::UpdatePublisher;
use super::update::{ScriptInfoChanges, ScriptUpdate};
use crate::clock::SharedClock;
use crate::config::{SessionRole, SyncConfig, TimingConfig};
use crate::cue::{CueElement, ElementId, ScriptInfo, sort_elements};
use crate::playback::{
    PauseRecord, PlaybackCommand, PlaybackCommandMessage, PlaybackState, SyncPlayState, Transition,
};
use crate::retiming::{BulkOffsetAdjustment, LateJoinReconciler, RetimingEngine, RetimingOutcome};
use crate::timing::{
    BorderState, HighlightState, ProcessOutcome, TimingWindows, compile_boundaries, delay_until,
    next_boundary_after, process_boundaries,
};
use crate::transport::{ConnectionStatus, TransportEvent};
use crate::visible;

/// Operation ids remembered for echo suppression.
const APPLIED_OPERATION_HISTORY: usize = 64;

/// Result of one timer tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Display-relevant state changed.
    pub changed: bool,
    /// Wait until the next boundary, if the show clock is running and one exists.
    pub next_tick: Option<Duration>,
}

/// Everything one viewer knows about one script.
pub struct ScriptSession {
    script: ScriptInfo,
    elements: Vec<CueElement>,
    state: SyncPlayState,
    timing: TimingConfig,
    role: SessionRole,
    retiming: RetimingEngine,
    late_join: LateJoinReconciler,
    clock: SharedClock,
    publisher: Box<dyn UpdatePublisher>,
    applied_operations: VecDeque<String>,
    connected_users: u32,
    connection: ConnectionStatus,
}

impl ScriptSession {
    pub fn new(
        script: ScriptInfo,
        config: &SyncConfig,
        clock: SharedClock,
        publisher: Box<dyn UpdatePublisher>,
    ) -> Self {
        Self {
            script,
            elements: Vec::new(),
            state: SyncPlayState::new(),
            timing: config.timing.clone(),
            role: config.session.role,
            retiming: RetimingEngine::new(),
            late_join: LateJoinReconciler::new(),
            clock,
            publisher,
            applied_operations: VecDeque::with_capacity(APPLIED_OPERATION_HISTORY),
            connected_users: 0,
            connection: ConnectionStatus::Disconnected,
        }
    }

    pub fn script_id(&self) -> &str {
        &self.script.script_id
    }

    pub fn script(&self) -> &ScriptInfo {
        &self.script
    }

    /// Elements in (offset, sequence) order, with any retiming applied.
    pub fn elements(&self) -> &[CueElement] {
        &self.elements
    }

    pub fn state(&self) -> &SyncPlayState {
        &self.state
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn connected_users(&self) -> u32 {
        self.connected_users
    }

    pub fn connection(&self) -> &ConnectionStatus {
        &self.connection
    }

    /// Current show time, or `None` while stopped.
    pub fn show_time_ms(&self) -> Option<i64> {
        self.state.show_time_at(self.clock.now_ms())
    }

    /// Replace the element list, e.g. after the content fetch completes.
    pub fn load_elements(&mut self, mut elements: Vec<CueElement>) {
        sort_elements(&mut elements);
        debug!(script_id = %self.script.script_id, count = elements.len(), "elements loaded");
        self.elements = elements;
        self.rebuild();
        self.reconcile_late_join();
    }

    /// Change the viewer's lookahead window and recompile.
    pub fn set_lookahead_ms(&mut self, lookahead_ms: i64) {
        let lookahead_ms = lookahead_ms.max(0);
        if self.timing.lookahead_ms == lookahead_ms {
            return;
        }
        self.timing.lookahead_ms = lookahead_ms;
        self.rebuild();
    }

    pub fn set_tetris_enabled(&mut self, enabled: bool) {
        self.timing.tetris_enabled = enabled;
    }

    /// Apply a playback command.
    ///
    /// A resume that ends a pause triggers retiming on the controller. A
    /// `start_time` on PLAY replaces the declared start time first.
    pub fn handle_command(&mut self, msg: &PlaybackCommandMessage) -> Transition {
        let now_ms = self.clock.now_ms();
        if msg.command == PlaybackCommand::Play
            && let Some(start_time) = &msg.start_time
        {
            self.script.start_time = Some(start_time.clone());
        }

        let transition = self.state.apply_command(msg, now_ms);
        if transition.to == PlaybackState::Stopped {
            return transition;
        }

        if let Some(pause) = transition.pause {
            match self.role {
                SessionRole::Controller => self.retime(pause, now_ms),
                SessionRole::Viewer => debug!(
                    sequence = pause.sequence,
                    duration_ms = pause.duration_ms,
                    "pause ended; retiming arrives from the controller"
                ),
            }
        }
        self.reconcile_late_join();
        self.refresh();
        transition
    }

    /// Apply one content operation. Returns whether anything changed.
    pub fn apply_update(&mut self, update: ScriptUpdate) -> bool {
        if let Some(op) = update.operation_id()
            && self.applied_operations.iter().any(|seen| seen == op)
        {
            debug!(operation_id = op, "ignoring echo of applied operation");
            return false;
        }

        let changed = match update {
            ScriptUpdate::ElementUpdate(changes) => self
                .elements
                .iter_mut()
                .find(|e| e.element_id == changes.element_id)
                .is_some_and(|e| changes.apply_to(e)),
            ScriptUpdate::ElementCreate(element) => {
                match self
                    .elements
                    .iter_mut()
                    .find(|e| e.element_id == element.element_id)
                {
                    Some(existing) => *existing = element,
                    None => self.elements.push(element),
                }
                true
            }
            ScriptUpdate::ElementDelete { element_id } => {
                let before = self.elements.len();
                self.elements.retain(|e| e.element_id != element_id);
                self.state.forget_element(&element_id);
                self.elements.len() != before
            }
            ScriptUpdate::BulkOffsetAdjustment(adjustment) => {
                if let Err(e) = adjustment.validate() {
                    debug!(error = %e, "dropping bulk offset adjustment");
                    return false;
                }
                self.apply_adjustment(&adjustment);
                true
            }
            ScriptUpdate::ScriptInfo(ScriptInfoChanges { start_time }) => {
                let changed = start_time.is_some() && start_time != self.script.start_time;
                if changed {
                    self.script.start_time = start_time;
                }
                return changed;
            }
        };

        if changed {
            sort_elements(&mut self.elements);
            self.rebuild();
        }
        changed
    }

    /// Feed one transport event. Returns whether the snapshot changed.
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Status(status) => {
                let changed = self.connection != status;
                self.connection = status;
                changed
            }
            TransportEvent::ConnectedUsers(users) => {
                let changed = self.connected_users != users;
                self.connected_users = users;
                changed
            }
            TransportEvent::Playback(cmd) => !self.handle_command(&cmd).is_noop(),
            TransportEvent::ScriptUpdate {
                update_type,
                changes,
            } => match ScriptUpdate::from_wire(&update_type, changes) {
                Ok(update) => self.apply_update(update),
                Err(e) => {
                    debug!(error = %e, "dropping script update");
                    false
                }
            },
            TransportEvent::UpdateConfirmed | TransportEvent::ServerError(_) => false,
        }
    }

    /// One timer cycle: compute show time, process boundaries, schedule the next tick.
    pub fn tick(&mut self) -> TickOutcome {
        self.reconcile_late_join();
        let Some(show_ms) = self.show_time_ms() else {
            return TickOutcome::default();
        };
        let processed = self.refresh();

        let next_tick = if self.state.playback_state() == PlaybackState::Playing {
            next_boundary_after(self.state.timeline().boundaries(), show_ms)
                .map(|next| delay_until(show_ms, next))
        } else {
            None
        };
        TickOutcome {
            changed: processed.changed || !processed.newly_passed.is_empty(),
            next_tick,
        }
    }

    /// Elements to display, honoring the passed-cue filter.
    pub fn visible_elements(&self) -> Vec<&CueElement> {
        visible::visible_elements(&self.elements, &self.state, self.timing.tetris_enabled)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let with_highlight = |wanted: HighlightState| -> Vec<ElementId> {
            self.elements
                .iter()
                .filter(|e| self.state.highlight(&e.element_id) == Some(wanted))
                .map(|e| e.element_id.clone())
                .collect()
        };
        SessionSnapshot {
            script_id: self.script.script_id.clone(),
            playback_state: self.state.playback_state(),
            show_time_ms: self.show_time_ms(),
            cumulative_delay_ms: self.state.cumulative_delay_ms(),
            current: with_highlight(HighlightState::Current),
            upcoming: with_highlight(HighlightState::Upcoming),
            red_border: self
                .elements
                .iter()
                .filter(|e| self.state.border(&e.element_id) == Some(BorderState::RedBorder))
                .map(|e| e.element_id.clone())
                .collect(),
            visible: self
                .visible_elements()
                .into_iter()
                .map(|e| e.element_id.clone())
                .collect(),
            hidden_count: visible::hidden_count(
                &self.elements,
                &self.state,
                self.timing.tetris_enabled,
            ),
            connected_users: self.connected_users,
            connection: self.connection.clone(),
        }
    }

    /// Reset for leaving the script view.
    pub fn leave(&mut self) {
        let stop = PlaybackCommandMessage::new(PlaybackCommand::Stop);
        self.state.apply_command(&stop, self.clock.now_ms());
        self.late_join.reset();
        self.applied_operations.clear();
        info!(script_id = %self.script.script_id, "left script");
    }

    fn retime(&mut self, pause: PauseRecord, now_ms: i64) {
        match self
            .retiming
            .on_pause_resumed(pause, &self.script, &self.elements, now_ms)
        {
            RetimingOutcome::StartTimeShifted { new_start_time, .. } => {
                self.script.start_time = Some(new_start_time.clone());
                self.publish(&ScriptUpdate::ScriptInfo(ScriptInfoChanges {
                    start_time: Some(new_start_time),
                }));
            }
            RetimingOutcome::OffsetsShifted(adjustment) => {
                self.apply_adjustment(&adjustment);
                sort_elements(&mut self.elements);
                self.rebuild();
                self.publish(&ScriptUpdate::BulkOffsetAdjustment(adjustment));
            }
            RetimingOutcome::Duplicate | RetimingOutcome::Skipped(_) => {}
        }
    }

    fn reconcile_late_join(&mut self) {
        let Some(show_ms) = self.show_time_ms() else {
            return;
        };
        let Some(adjustment) = self
            .late_join
            .reconcile(&self.state, &self.elements, show_ms)
        else {
            return;
        };
        self.apply_adjustment(&adjustment);
        sort_elements(&mut self.elements);
        self.rebuild();
    }

    fn apply_adjustment(&mut self, adjustment: &BulkOffsetAdjustment) {
        let moved = adjustment.apply(&mut self.elements);
        debug!(
            operation_id = %adjustment.operation_id,
            delay_ms = adjustment.delay_ms,
            moved,
            "applied bulk offset adjustment"
        );
        if self.applied_operations.len() == APPLIED_OPERATION_HISTORY {
            self.applied_operations.pop_front();
        }
        self.applied_operations
            .push_back(adjustment.operation_id.clone());
    }

    fn publish(&self, update: &ScriptUpdate) {
        if let Err(e) = self.publisher.publish(update) {
            warn!(
                script_id = %self.script.script_id,
                error = %e,
                "failed to publish script update"
            );
        }
    }

    /// Recompile boundaries from the current elements and reprocess.
    fn rebuild(&mut self) -> ProcessOutcome {
        let windows = TimingWindows::from(&self.timing);
        self.state
            .set_timeline(compile_boundaries(&self.elements, windows));
        self.process_now()
    }

    /// Reprocess at the current show time, compiling first if a STOP cleared the timeline.
    fn refresh(&mut self) -> ProcessOutcome {
        if self.state.timeline().is_empty() && !self.elements.is_empty() {
            return self.rebuild();
        }
        self.process_now()
    }

    fn process_now(&mut self) -> ProcessOutcome {
        match self.show_time_ms() {
            Some(show_ms) => process_boundaries(&mut self.state, show_ms),
            None => ProcessOutcome::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::session::publisher::RecordingPublisher;

    fn session(role: SessionRole) -> (ScriptSession, Arc<ManualClock>, RecordingPublisher) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let publisher = RecordingPublisher::new();
        let mut config = SyncConfig::default();
        config.session.role = role;
        let mut session = ScriptSession::new(
            ScriptInfo::new("s1", Some("1970-01-01T00:00:00Z".into())),
            &config,
            clock.clone(),
            Box::new(publisher.clone()),
        );
        session.load_elements(vec![
            CueElement::new("c", 30_000, 2),
            CueElement::new("a", 10_000, 0),
            CueElement::new("b", 20_000, 1),
        ]);
        (session, clock, publisher)
    }

    fn offsets(session: &ScriptSession) -> Vec<i64> {
        session.elements().iter().map(|e| e.offset_ms).collect()
    }

    fn cmd(command: PlaybackCommand) -> PlaybackCommandMessage {
        PlaybackCommandMessage::new(command)
    }

    #[test]
    fn loads_in_script_order() {
        let (session, _, _) = session(SessionRole::Viewer);
        let ids: Vec<&str> = session.elements().iter().map(|e| e.element_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(!session.state().timeline().is_empty());
    }

    #[test]
    fn controller_retimes_and_publishes_once() {
        let (mut session, clock, publisher) = session(SessionRole::Controller);
        session.handle_command(&cmd(PlaybackCommand::Play));
        clock.advance(15_000);
        session.handle_command(&cmd(PlaybackCommand::Pause));
        clock.advance(2_500);
        session.handle_command(&cmd(PlaybackCommand::Play));

        assert_eq!(offsets(&session), [10_000, 23_000, 33_000]);
        assert_eq!(session.state().cumulative_delay_ms(), 3_000);
        let published = publisher.published();
        assert_eq!(published.len(), 1);

        // The server echoes the broadcast back.
        assert!(!session.apply_update(published[0].clone()));
        assert_eq!(offsets(&session), [10_000, 23_000, 33_000]);
    }

    #[test]
    fn viewer_waits_for_controller_adjustment() {
        let (mut session, clock, publisher) = session(SessionRole::Viewer);
        session.handle_command(&cmd(PlaybackCommand::Play));
        clock.advance(15_000);
        session.handle_command(&cmd(PlaybackCommand::Pause));
        clock.advance(2_500);
        session.handle_command(&cmd(PlaybackCommand::Play));
        assert_eq!(offsets(&session), [10_000, 20_000, 30_000]);
        assert!(publisher.published().is_empty());

        let adjustment = BulkOffsetAdjustment::plan(session.elements(), 15_000, 3_000);
        assert!(session.apply_update(ScriptUpdate::BulkOffsetAdjustment(adjustment.clone())));
        assert_eq!(offsets(&session), [10_000, 23_000, 33_000]);
        assert!(!session.apply_update(ScriptUpdate::BulkOffsetAdjustment(adjustment)));
    }

    #[test]
    fn out_of_range_adjustment_is_dropped() {
        let (mut session, _clock, _publisher) = session(SessionRole::Viewer);
        for delay_ms in [i64::MAX, 0, -5_000] {
            let adjustment = BulkOffsetAdjustment {
                operation_id: format!("op-{delay_ms}"),
                element_ids: vec![ElementId::new("b"), ElementId::new("c")],
                delay_ms,
                reference_time_ms: 0,
            };
            assert!(!session.apply_update(ScriptUpdate::BulkOffsetAdjustment(adjustment)));
        }
        assert_eq!(offsets(&session), [10_000, 20_000, 30_000]);
    }

    #[test]
    fn tick_schedules_next_boundary_while_playing() {
        let (mut session, clock, _) = session(SessionRole::Viewer);
        assert_eq!(session.tick(), TickOutcome::default());

        session.handle_command(&cmd(PlaybackCommand::Play));
        clock.advance(6_000);
        let outcome = session.tick();
        // Next boundary is "a" upcoming at 7000.
        assert_eq!(outcome.next_tick, Some(Duration::from_millis(1_000)));

        clock.advance(1_000);
        let outcome = session.tick();
        assert!(outcome.changed);
        assert_eq!(session.snapshot().upcoming, vec![ElementId::new("a")]);

        session.handle_command(&cmd(PlaybackCommand::Pause));
        assert_eq!(session.tick().next_tick, None);
    }

    #[test]
    fn content_updates_recompile() {
        let (mut session, clock, _) = session(SessionRole::Viewer);
        session.handle_command(&cmd(PlaybackCommand::Play));
        clock.advance(12_000);
        session.tick();
        assert_eq!(session.snapshot().current, vec![ElementId::new("a")]);

        let moved = ScriptUpdate::from_wire(
            "element_update",
            serde_json::json!({"element_id": "b", "offset_ms": 11_000}),
        )
        .unwrap();
        assert!(session.apply_update(moved));
        assert_eq!(
            session.snapshot().current,
            vec![ElementId::new("a"), ElementId::new("b")]
        );

        assert!(session.apply_update(ScriptUpdate::ElementDelete {
            element_id: "a".into()
        }));
        assert_eq!(session.elements().len(), 2);
        assert_eq!(session.state().highlight(&ElementId::new("a")), None);
        assert_eq!(session.snapshot().current, vec![ElementId::new("b")]);
    }

    #[test]
    fn malformed_transport_update_is_dropped() {
        let (mut session, _, _) = session(SessionRole::Viewer);
        let changed = session.handle_transport_event(TransportEvent::ScriptUpdate {
            update_type: "element_delete".into(),
            changes: serde_json::json!("nonsense"),
        });
        assert!(!changed);
        assert_eq!(session.elements().len(), 3);
    }

    #[test]
    fn play_start_time_replaces_declared_start() {
        let (mut session, _, _) = session(SessionRole::Viewer);
        session.handle_command(&cmd(PlaybackCommand::Play).with_start_time("2026-05-01T19:30:00Z"));
        assert_eq!(
            session.script().start_time.as_deref(),
            Some("2026-05-01T19:30:00Z")
        );
    }

    #[test]
    fn stop_then_play_recompiles() {
        let (mut session, clock, _) = session(SessionRole::Viewer);
        session.handle_command(&cmd(PlaybackCommand::Play));
        session.handle_command(&cmd(PlaybackCommand::Stop));
        assert!(session.state().timeline().is_empty());
        session.handle_command(&cmd(PlaybackCommand::Play));
        assert!(!session.state().timeline().is_empty());
        clock.advance(10_000);
        session.tick();
        assert_eq!(session.snapshot().current, vec![ElementId::new("a")]);
    }

    #[test]
    fn leave_resets_state_and_late_join_flag() {
        let (mut session, _, _) = session(SessionRole::Viewer);
        session.handle_command(
            &cmd(PlaybackCommand::Play)
                .with_show_time(15_000)
                .with_cumulative_delay(4_000),
        );
        assert_eq!(offsets(&session), [10_000, 24_000, 34_000]);
        session.leave();
        assert_eq!(session.state().playback_state(), PlaybackState::Stopped);
        assert_eq!(session.state().cumulative_delay_ms(), 0);
    }

    #[test]
    fn lookahead_change_recompiles() {
        let (mut session, _, _) = session(SessionRole::Viewer);
        let with_upcoming = session.state().timeline().boundaries().len();
        session.set_lookahead_ms(0);
        assert_eq!(session.state().timeline().boundaries().len(), with_upcoming - 3);
    }
}
