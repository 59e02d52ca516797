//! Host-driven API: GameCore receives frames, ticks and user input from the host, returns actions.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::directory::{PeerDirectory, PeerGameEntry, Upsert};
use crate::handshake::{PendingTune, SessionPhase, TuneIntent};
use crate::host::FeedbackKind;
use crate::protocol::{Body, GameNumber, Message};
use crate::session::SessionState;
use crate::settings::Settings;
use crate::stats::{MatchRecord, MatchResult, PlayerStats, StatsBook};
use crate::turn::{self, LocalMove, PlayerState, TurnError};
use crate::wire;

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Host { game_number: GameNumber, frequency: u32 },
    Browse { frequency: u32 },
    Next,
    Previous,
    Select,
    Move(LocalMove),
    PlayAgain,
    Quit,
    Back,
    Stats,
}

/// Action for host to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send `frame`, echoing it within `echo_window` (zero: no echoes).
    Broadcast {
        frame: Vec<u8>,
        echo_window: Duration,
    },
    /// Retune the transport; report the result with [`GameCore::on_tuned`].
    Tune { frequency: u32 },
    Feedback(FeedbackKind),
    Vibrate(FeedbackKind),
    /// Stamp with wall-clock time, persist, then hand back via [`GameCore::on_match_recorded`].
    RecordMatch(MatchResult),
}

/// Read-only snapshot for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub game_number: GameNumber,
    pub frequency: Option<u32>,
    pub local: PlayerState,
    pub remote: PlayerState,
    pub remote_name: Option<String>,
    pub selected: Option<PeerGameEntry>,
    pub games_found: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub viewing_stats: bool,
    pub stats: Option<PlayerStats>,
}

/// Main coordinator. Owns every piece of mutable game state; only the event consumer touches it.
pub struct GameCore {
    settings: Settings,
    phase: SessionPhase,
    session: SessionState,
    directory: PeerDirectory,
    stats: StatsBook,
    viewing_stats: bool,
    frequency: Option<u32>,
    pending_tune: Option<PendingTune>,
    ticks_since_beacon: u32,
}

impl GameCore {
    pub fn new(settings: Settings, now: Instant) -> Self {
        Self {
            settings,
            phase: SessionPhase::Idle,
            session: SessionState::new(GameNumber::default(), now),
            directory: PeerDirectory::new(),
            stats: StatsBook::new(),
            viewing_stats: false,
            frequency: None,
            pending_tune: None,
            ticks_since_beacon: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    pub fn stats(&self) -> &StatsBook {
        &self.stats
    }

    /// Seed statistics from previously persisted history.
    pub fn load_history(&mut self, history: &[MatchRecord]) {
        self.stats = StatsBook::from_history(history);
    }

    /// A match was stamped and stored by the host.
    pub fn on_match_recorded(&mut self, record: &MatchRecord) {
        self.stats.record(record);
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            game_number: self.session.game_number,
            frequency: self.frequency,
            local: self.session.local,
            remote: self.session.remote,
            remote_name: self.session.remote_name.clone(),
            selected: self.directory.current().cloned(),
            games_found: self.directory.len(),
            has_next: self.directory.has_next(),
            has_previous: self.directory.has_previous(),
            viewing_stats: self.viewing_stats,
            stats: self.stats.current().cloned(),
        }
    }

    /// Raw bytes from the transport. Malformed frames are logged and dropped.
    pub fn on_frame(&mut self, bytes: &[u8], now: Instant) -> Vec<Action> {
        match wire::decode(bytes) {
            Ok(msg) => self.on_message(msg, now),
            Err(e) if e.is_protocol_error() => {
                error!("dropping frame: {}", e);
                Vec::new()
            }
            Err(e) => {
                trace!("dropping frame: {}", e);
                Vec::new()
            }
        }
    }

    /// Decoded message from a remote node.
    pub fn on_message(&mut self, msg: Message, now: Instant) -> Vec<Action> {
        let game_number = msg.game_number;
        match msg.body {
            Body::Beacon => {
                if self.phase.accepts_beacons() {
                    let frequency = self.frequency.unwrap_or_default();
                    if self.directory.insert_or_update(game_number, msg.sender, frequency)
                        == Upsert::Refreshed
                    {
                        debug!("game {} beacon refreshed", game_number);
                    }
                }
                Vec::new()
            }
            Body::WithdrawBeacon => {
                self.directory.remove(game_number);
                Vec::new()
            }
            Body::Join { .. }
                if self.phase == SessionPhase::HostAdvertising
                    && game_number == self.session.game_number =>
            {
                self.accept_join(msg, now)
            }
            Body::JoinAck { .. }
                if self.phase == SessionPhase::JoinRequested
                    && game_number == self.session.game_number =>
            {
                self.accept_join_ack(msg, now);
                Vec::new()
            }
            Body::Join { .. } | Body::JoinAck { .. } => {
                if self.directory.remove(game_number) {
                    debug!("game {} claimed by another player", game_number);
                }
                Vec::new()
            }
            _ if !self.phase.in_session() || game_number != self.session.game_number => {
                trace!("ignoring {:?} for game {}", msg.body.purpose(), game_number);
                Vec::new()
            }
            Body::Move(mv) => {
                match turn::remote_transition(self.session.remote, mv) {
                    Ok(state) => {
                        debug!("remote {} -> {:?}", self.session.remote, state);
                        self.session.set_remote(state, now);
                    }
                    Err(e) => debug!("remote move {:?}: {}", mv, e),
                }
                Vec::new()
            }
            Body::PlayAgain => {
                if self.session.local.is_terminal() {
                    info!("remote asked to play again");
                    self.session.restart(now);
                }
                Vec::new()
            }
            Body::Quit => {
                info!("remote quit game {}", game_number);
                self.end_session(now);
                Vec::new()
            }
        }
    }

    fn accept_join(&mut self, msg: Message, now: Instant) -> Vec<Action> {
        let (name, contact) = msg.into_sender_and_contact();
        info!("{} joined game {}", name, self.session.game_number);
        self.session.remote_name = Some(name);
        self.session.remote_contact = contact;
        self.session.restart(now);
        self.phase = SessionPhase::SessionReady;
        let contact = self.settings.contact.clone();
        self.broadcast(Body::JoinAck { contact }).into_iter().collect()
    }

    fn accept_join_ack(&mut self, msg: Message, now: Instant) {
        let (name, contact) = msg.into_sender_and_contact();
        info!("{} accepted us into game {}", name, self.session.game_number);
        self.session.remote_name = Some(name);
        self.session.remote_contact = contact;
        self.session.restart(now);
        self.directory.clear();
        self.phase = SessionPhase::SessionReady;
    }

    /// Result of an [`Action::Tune`].
    pub fn on_tuned(&mut self, ok: bool, _now: Instant) -> Vec<Action> {
        let Some(PendingTune { intent, frequency }) = self.pending_tune.take() else {
            warn!("tune result with no tune pending");
            return Vec::new();
        };
        if !ok {
            warn!("frequency {} refused", frequency);
            self.frequency = None;
            self.phase = SessionPhase::BadFrequency(intent.role());
            return Vec::new();
        }
        self.frequency = Some(frequency);
        match intent {
            TuneIntent::Host => {
                info!(
                    "hosting game {} on {} Hz",
                    self.session.game_number, frequency
                );
                self.phase = SessionPhase::HostAdvertising;
                self.ticks_since_beacon = 0;
                self.broadcast(Body::Beacon).into_iter().collect()
            }
            TuneIntent::Browse => {
                self.phase = SessionPhase::Browsing;
                Vec::new()
            }
            TuneIntent::Join(game_number) => {
                self.session.game_number = game_number;
                self.phase = SessionPhase::JoinRequested;
                let contact = self.settings.contact.clone();
                self.broadcast(Body::Join { contact }).into_iter().collect()
            }
        }
    }

    /// Periodic timer: beacons, remote timeout and turn resolution.
    pub fn tick(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.phase {
            SessionPhase::HostAdvertising => {
                self.ticks_since_beacon += 1;
                if self.ticks_since_beacon >= self.settings.beacon_every_ticks {
                    self.ticks_since_beacon = 0;
                    actions.extend(self.broadcast(Body::Beacon));
                }
            }
            SessionPhase::SessionReady => {
                if self
                    .session
                    .remote_stalled(now, self.settings.remote_timeout())
                {
                    warn!("remote never started the turn, giving up");
                    self.session.set_local(PlayerState::RemoteTimedOut, now);
                    self.session.set_remote(PlayerState::Unknown, now);
                    actions.push(Action::Feedback(FeedbackKind::RemoteTimedOut));
                } else if let Some((local, remote)) = self
                    .session
                    .throws_to_resolve(now, self.settings.show_moves())
                {
                    let (l, r, outcome) = turn::settle(local, remote);
                    info!("{} vs {}: {:?}", local.name(), remote.name(), outcome);
                    self.session.set_local(l, now);
                    self.session.set_remote(r, now);
                    actions.push(Action::Feedback(outcome.into()));
                    actions.push(Action::RecordMatch(MatchResult {
                        local: l,
                        remote: r,
                        remote_name: self.session.remote_name.clone().unwrap_or_default(),
                        remote_contact: self.session.remote_contact.clone().unwrap_or_default(),
                    }));
                }
            }
            _ => {}
        }
        actions
    }

    pub fn on_input(&mut self, input: Input, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        match input {
            Input::Host {
                game_number,
                frequency,
            } => {
                if self.phase.in_session() {
                    debug!("ignoring host request during a game");
                    return actions;
                }
                actions.extend(self.leave_phase(now));
                self.session.game_number = game_number;
                actions.push(self.request_tune(TuneIntent::Host, frequency));
            }
            Input::Browse { frequency } => {
                if self.phase.in_session() {
                    debug!("ignoring browse request during a game");
                    return actions;
                }
                actions.extend(self.leave_phase(now));
                self.directory.clear();
                actions.push(self.request_tune(TuneIntent::Browse, frequency));
            }
            Input::Next | Input::Previous if self.viewing_stats => {
                if input == Input::Next {
                    self.stats.next();
                } else {
                    self.stats.previous();
                }
            }
            Input::Next if self.phase == SessionPhase::Browsing => self.directory.next(),
            Input::Previous if self.phase == SessionPhase::Browsing => self.directory.previous(),
            Input::Select if self.phase == SessionPhase::Browsing => {
                if let Some(entry) = self.directory.current() {
                    let (game_number, frequency) = (entry.game_number, entry.frequency);
                    info!("joining game {} hosted by {}", game_number, entry.sender_name);
                    actions.push(self.request_tune(TuneIntent::Join(game_number), frequency));
                }
            }
            Input::Move(mv) if self.phase.in_session() => {
                match turn::local_transition(self.session.local, mv) {
                    Ok((state, wire_move)) => {
                        self.session.set_local(state, now);
                        actions.push(Action::Vibrate(FeedbackKind::Move));
                        actions.extend(self.broadcast(Body::Move(wire_move)));
                    }
                    Err(TurnError::AlreadyCounted) => trace!("already counted"),
                    Err(e) => error!("local move {:?}: {}", mv, e),
                }
            }
            Input::PlayAgain if self.phase.in_session() && self.session.local.is_terminal() => {
                actions.extend(self.broadcast(Body::PlayAgain));
                self.session.restart(now);
            }
            Input::Quit | Input::Back if self.phase.in_session() => {
                actions.extend(self.broadcast(Body::Quit));
                self.end_session(now);
            }
            Input::Quit | Input::Back => {
                actions.extend(self.leave_phase(now));
            }
            Input::Stats if self.phase == SessionPhase::Idle => {
                self.stats.rewind();
                self.viewing_stats = true;
            }
            other => trace!("input {:?} ignored in {:?}", other, self.phase),
        }
        actions
    }

    /// Host is going down: withdraw our beacon or quit the game.
    pub fn shutdown(&mut self, now: Instant) -> Vec<Action> {
        if self.phase.in_session() {
            let actions = self.broadcast(Body::Quit).into_iter().collect();
            self.end_session(now);
            actions
        } else {
            self.leave_phase(now).into_iter().collect()
        }
    }

    /// Back to Idle from any pre-session phase. Withdraws our beacon if we were advertising.
    fn leave_phase(&mut self, now: Instant) -> Option<Action> {
        let withdraw = if self.phase == SessionPhase::HostAdvertising {
            info!("withdrawing game {}", self.session.game_number);
            self.broadcast(Body::WithdrawBeacon)
        } else {
            None
        };
        self.pending_tune = None;
        self.viewing_stats = false;
        self.session.end(now);
        self.phase = SessionPhase::Idle;
        withdraw
    }

    fn end_session(&mut self, now: Instant) {
        self.session.end(now);
        self.phase = SessionPhase::Idle;
    }

    fn request_tune(&mut self, intent: TuneIntent, frequency: u32) -> Action {
        self.pending_tune = Some(PendingTune { intent, frequency });
        self.phase = SessionPhase::Tuning(intent.role());
        Action::Tune { frequency }
    }

    fn broadcast(&mut self, body: Body) -> Option<Action> {
        let msg = Message::new(
            self.settings.player_name.as_str(),
            self.session.game_number,
            body,
        );
        match wire::encode(&msg) {
            Ok(frame) => {
                let echo_window = msg.purpose().echo_window();
                self.session.echo_window = echo_window;
                Some(Action::Broadcast { frame, echo_window })
            }
            Err(e) => {
                error!("cannot encode {:?}: {}", msg.purpose(), e);
                None
            }
        }
    }
}
