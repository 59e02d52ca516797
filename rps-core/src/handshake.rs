//! Handshake phases: hosting and advertising a game, browsing and joining one.

use std::fmt;

use crate::protocol::GameNumber;

/// Which side of the handshake we are on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Join,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    /// Waiting for the transport to report the tune result.
    Tuning(Role),
    HostAdvertising,
    Browsing,
    JoinRequested,
    SessionReady,
    /// The transport refused the frequency. Blocks until the user picks another.
    BadFrequency(Role),
}

impl SessionPhase {
    /// Beacons only populate the directory while looking for a game.
    pub fn accepts_beacons(self) -> bool {
        matches!(self, SessionPhase::Browsing | SessionPhase::Tuning(Role::Join))
    }

    pub fn in_session(self) -> bool {
        self == SessionPhase::SessionReady
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Tuning(_) => "tuning",
            SessionPhase::HostAdvertising => "waiting for a player",
            SessionPhase::Browsing => "looking for games",
            SessionPhase::JoinRequested => "joining",
            SessionPhase::SessionReady => "playing",
            SessionPhase::BadFrequency(_) => "frequency not allowed",
        };
        f.write_str(s)
    }
}

/// What to do once a requested tune completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TuneIntent {
    Host,
    Browse,
    Join(GameNumber),
}

impl TuneIntent {
    pub(crate) fn role(self) -> Role {
        match self {
            TuneIntent::Host => Role::Host,
            TuneIntent::Browse | TuneIntent::Join(_) => Role::Join,
        }
    }
}

/// A tune the core has asked the host to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingTune {
    pub intent: TuneIntent,
    pub frequency: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beacons_only_while_looking() {
        assert!(SessionPhase::Browsing.accepts_beacons());
        assert!(SessionPhase::Tuning(Role::Join).accepts_beacons());
        assert!(!SessionPhase::Tuning(Role::Host).accepts_beacons());
        assert!(!SessionPhase::HostAdvertising.accepts_beacons());
        assert!(!SessionPhase::SessionReady.accepts_beacons());
    }

    #[test]
    fn join_intent_is_joiner_role() {
        let g = GameNumber::new(7).unwrap();
        assert_eq!(TuneIntent::Join(g).role(), Role::Join);
        assert_eq!(TuneIntent::Host.role(), Role::Host);
    }
}
