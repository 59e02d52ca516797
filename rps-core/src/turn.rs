//! Turn state machine: count one, count two, throw; then settle both sides.

use std::fmt;

use crate::protocol::{Hand, WireMove};

/// Where one player is in the current turn.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    /// Nothing heard yet, or the session ended.
    #[default]
    Unknown,
    Ready,
    Counting1,
    Counting2,
    Chosen(Hand),
    Won(Hand),
    Lost(Hand),
    Tied(Hand),
    /// Local side only: the remote never started the turn.
    RemoteTimedOut,
}

impl PlayerState {
    /// Turn is over for this side; Play-Again is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlayerState::Won(_) | PlayerState::Lost(_) | PlayerState::Tied(_)
        )
    }

    pub fn hand(self) -> Option<Hand> {
        match self {
            PlayerState::Chosen(h)
            | PlayerState::Won(h)
            | PlayerState::Lost(h)
            | PlayerState::Tied(h) => Some(h),
            _ => None,
        }
    }

    /// One-character code used in the match history file.
    pub fn as_char(self) -> char {
        use crate::protocol::Hand::*;
        match self {
            PlayerState::Unknown => '?',
            PlayerState::Ready => 'G',
            PlayerState::Counting1 => '1',
            PlayerState::Counting2 => '2',
            PlayerState::Chosen(Rock) => 'R',
            PlayerState::Chosen(Paper) => 'P',
            PlayerState::Chosen(Scissors) => 'S',
            PlayerState::Lost(Rock) => 'L',
            PlayerState::Lost(Paper) => 'l',
            PlayerState::Lost(Scissors) => '-',
            PlayerState::Tied(Rock) => 'T',
            PlayerState::Tied(Paper) => 't',
            PlayerState::Tied(Scissors) => 'x',
            PlayerState::Won(Rock) => 'W',
            PlayerState::Won(Paper) => 'w',
            PlayerState::Won(Scissors) => '+',
            PlayerState::RemoteTimedOut => '7',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        use crate::protocol::Hand::*;
        Some(match c {
            '?' => PlayerState::Unknown,
            'G' => PlayerState::Ready,
            '1' => PlayerState::Counting1,
            '2' => PlayerState::Counting2,
            'R' => PlayerState::Chosen(Rock),
            'P' => PlayerState::Chosen(Paper),
            'S' => PlayerState::Chosen(Scissors),
            'L' => PlayerState::Lost(Rock),
            'l' => PlayerState::Lost(Paper),
            '-' => PlayerState::Lost(Scissors),
            'T' => PlayerState::Tied(Rock),
            't' => PlayerState::Tied(Paper),
            'x' => PlayerState::Tied(Scissors),
            'W' => PlayerState::Won(Rock),
            'w' => PlayerState::Won(Paper),
            '+' => PlayerState::Won(Scissors),
            '7' => PlayerState::RemoteTimedOut,
            _ => return None,
        })
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Unknown => f.write_str("-"),
            PlayerState::Ready => f.write_str("ready"),
            PlayerState::Counting1 => f.write_str("one"),
            PlayerState::Counting2 => f.write_str("two"),
            PlayerState::Chosen(h) => f.write_str(h.name()),
            PlayerState::Won(h) => write!(f, "{} (won)", h.name()),
            PlayerState::Lost(h) => write!(f, "{} (lost)", h.name()),
            PlayerState::Tied(h) => write!(f, "{} (tie)", h.name()),
            PlayerState::RemoteTimedOut => f.write_str("opponent timed out"),
        }
    }
}

/// Input the local player can make during a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalMove {
    Count,
    Throw(Hand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    /// Count pressed again after "two"; harmless.
    #[error("already counted to two")]
    AlreadyCounted,
    #[error("move out of sequence in state {0:?}")]
    OutOfSequence(PlayerState),
}

/// Apply a local move. Returns the new state and the move to broadcast.
pub fn local_transition(
    state: PlayerState,
    mv: LocalMove,
) -> Result<(PlayerState, WireMove), TurnError> {
    match (state, mv) {
        (PlayerState::Ready, LocalMove::Count) => Ok((PlayerState::Counting1, WireMove::Count1)),
        (PlayerState::Counting1, LocalMove::Count) => {
            Ok((PlayerState::Counting2, WireMove::Count2))
        }
        (PlayerState::Counting2, LocalMove::Count) => Err(TurnError::AlreadyCounted),
        (PlayerState::Counting2, LocalMove::Throw(h)) => {
            Ok((PlayerState::Chosen(h), WireMove::Throw(h)))
        }
        (s, _) => Err(TurnError::OutOfSequence(s)),
    }
}

/// Apply a move heard from the remote. Duplicates are out of sequence.
pub fn remote_transition(state: PlayerState, mv: WireMove) -> Result<PlayerState, TurnError> {
    match (state, mv) {
        (PlayerState::Ready, WireMove::Count1) => Ok(PlayerState::Counting1),
        (PlayerState::Counting1, WireMove::Count2) => Ok(PlayerState::Counting2),
        (PlayerState::Counting2, WireMove::Throw(h)) => Ok(PlayerState::Chosen(h)),
        (s, _) => Err(TurnError::OutOfSequence(s)),
    }
}

/// Result of a turn from the local player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

pub fn resolve(local: Hand, remote: Hand) -> Outcome {
    if local == remote {
        Outcome::Tie
    } else if local.beats(remote) {
        Outcome::Win
    } else {
        Outcome::Loss
    }
}

/// Terminal states for (local, remote) plus the local outcome.
pub fn settle(local: Hand, remote: Hand) -> (PlayerState, PlayerState, Outcome) {
    let outcome = resolve(local, remote);
    let (l, r) = match outcome {
        Outcome::Win => (PlayerState::Won(local), PlayerState::Lost(remote)),
        Outcome::Loss => (PlayerState::Lost(local), PlayerState::Won(remote)),
        Outcome::Tie => (PlayerState::Tied(local), PlayerState::Tied(remote)),
    };
    (l, r, outcome)
}
