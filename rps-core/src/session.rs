//! Per-session context: both players' turn states, when they last changed, and who the remote is.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::protocol::{GameNumber, Hand};
use crate::turn::PlayerState;

#[derive(Debug, Clone)]
pub struct SessionState {
    pub local: PlayerState,
    pub remote: PlayerState,
    pub local_changed_at: Instant,
    pub remote_changed_at: Instant,
    pub game_number: GameNumber,
    /// Echo window of the last message we sent.
    pub echo_window: Duration,
    pub remote_name: Option<String>,
    pub remote_contact: Option<String>,
}

impl SessionState {
    pub fn new(game_number: GameNumber, now: Instant) -> Self {
        Self {
            local: PlayerState::Unknown,
            remote: PlayerState::Unknown,
            local_changed_at: now,
            remote_changed_at: now,
            game_number,
            echo_window: Duration::ZERO,
            remote_name: None,
            remote_contact: None,
        }
    }

    /// Both sides back to Ready for a fresh turn. The remote peer is kept.
    pub fn restart(&mut self, now: Instant) {
        debug!("game {} restarting turn", self.game_number);
        self.set_local(PlayerState::Ready, now);
        self.set_remote(PlayerState::Ready, now);
    }

    /// Forget the turn and the remote peer.
    pub fn end(&mut self, now: Instant) {
        self.set_local(PlayerState::Unknown, now);
        self.set_remote(PlayerState::Unknown, now);
        self.remote_name = None;
        self.remote_contact = None;
    }

    pub fn set_local(&mut self, state: PlayerState, now: Instant) {
        self.local = state;
        self.local_changed_at = now;
    }

    pub fn set_remote(&mut self, state: PlayerState, now: Instant) {
        self.remote = state;
        self.remote_changed_at = now;
    }

    /// Both throws, once both are in and the local one has been shown long enough.
    pub fn throws_to_resolve(&self, now: Instant, show_moves: Duration) -> Option<(Hand, Hand)> {
        match (self.local, self.remote) {
            (PlayerState::Chosen(l), PlayerState::Chosen(r))
                if now.saturating_duration_since(self.local_changed_at) > show_moves =>
            {
                Some((l, r))
            }
            _ => None,
        }
    }

    /// The remote has sat in Ready for longer than `timeout`.
    pub fn remote_stalled(&self, now: Instant, timeout: Duration) -> bool {
        self.remote == PlayerState::Ready
            && now.saturating_duration_since(self.remote_changed_at) > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(now: Instant) -> SessionState {
        let mut s = SessionState::new(GameNumber::new(42).unwrap(), now);
        s.restart(now);
        s
    }

    #[test]
    fn timeout_is_strictly_after_threshold() {
        let t0 = Instant::now();
        let s = session(t0);
        let timeout = Duration::from_secs(60);
        assert!(!s.remote_stalled(t0 + timeout, timeout));
        assert!(s.remote_stalled(t0 + timeout + Duration::from_millis(1), timeout));
    }

    #[test]
    fn counting_remote_never_stalls() {
        let t0 = Instant::now();
        let mut s = session(t0);
        s.set_remote(PlayerState::Counting1, t0);
        assert!(!s.remote_stalled(t0 + Duration::from_secs(600), Duration::from_secs(60)));
    }

    #[test]
    fn resolution_waits_for_show_time() {
        let t0 = Instant::now();
        let mut s = session(t0);
        let show = Duration::from_millis(500);
        s.set_remote(PlayerState::Chosen(Hand::Scissors), t0);
        s.set_local(PlayerState::Chosen(Hand::Rock), t0);
        assert_eq!(s.throws_to_resolve(t0 + show, show), None);
        assert_eq!(
            s.throws_to_resolve(t0 + show + Duration::from_millis(1), show),
            Some((Hand::Rock, Hand::Scissors))
        );
    }

    #[test]
    fn end_forgets_peer() {
        let t0 = Instant::now();
        let mut s = session(t0);
        s.remote_name = Some("Bob".into());
        s.end(t0);
        assert_eq!(s.local, PlayerState::Unknown);
        assert!(s.remote_name.is_none());
    }
}
