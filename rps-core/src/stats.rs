//! Match history records and per-opponent statistics.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::turn::{Outcome, PlayerState};

/// Timestamp layout in the history file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A finished turn, before the host stamps it with wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub local: PlayerState,
    pub remote: PlayerState,
    pub remote_name: String,
    pub remote_contact: String,
}

impl MatchResult {
    pub fn played_at(self, played_at: NaiveDateTime) -> MatchRecord {
        MatchRecord {
            local: self.local,
            remote: self.remote,
            played_at,
            remote_name: self.remote_name,
            remote_contact: self.remote_contact,
        }
    }
}

/// One line of match history:
/// `<local><remote>\t<YYYY-MM-DDTHH:MM:SS>\t<remote name>\t<remote contact>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub local: PlayerState,
    pub remote: PlayerState,
    pub played_at: NaiveDateTime,
    pub remote_name: String,
    pub remote_contact: String,
}

impl MatchRecord {
    /// Outcome for the local player, if the turn was settled.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.local {
            PlayerState::Won(_) => Some(Outcome::Win),
            PlayerState::Lost(_) => Some(Outcome::Loss),
            PlayerState::Tied(_) => Some(Outcome::Tie),
            _ => None,
        }
    }
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}\t{}\t{}\t{}",
            self.local.as_char(),
            self.remote.as_char(),
            self.played_at.format(TIMESTAMP_FORMAT),
            self.remote_name.replace(['\t', '\n'], " "),
            self.remote_contact.replace(['\t', '\n'], " "),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordParseError {
    #[error("expected 4 tab-separated fields, got {0}")]
    Fields(usize),
    #[error("bad state pair {0:?}")]
    States(String),
    #[error("bad timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

impl FromStr for MatchRecord {
    type Err = RecordParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        let [states, when, name, contact] = fields[..] else {
            return Err(RecordParseError::Fields(fields.len()));
        };
        let mut chars = states.chars();
        let (local, remote) = match (
            chars.next().and_then(PlayerState::from_char),
            chars.next().and_then(PlayerState::from_char),
            chars.next(),
        ) {
            (Some(l), Some(r), None) => (l, r),
            _ => return Err(RecordParseError::States(states.to_string())),
        };
        Ok(MatchRecord {
            local,
            remote,
            played_at: NaiveDateTime::parse_from_str(when, TIMESTAMP_FORMAT)?,
            remote_name: name.to_string(),
            remote_contact: contact.to_string(),
        })
    }
}

/// Running totals against one opponent, from the local player's side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStats {
    pub name: String,
    pub contact: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub last_played: NaiveDateTime,
}

/// Opponents, most recently played first, with a browsing cursor.
#[derive(Debug, Default)]
pub struct StatsBook {
    players: Vec<PlayerStats>,
    cursor: usize,
}

impl StatsBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from history in file order (oldest first).
    pub fn from_history<'a>(records: impl IntoIterator<Item = &'a MatchRecord>) -> Self {
        let mut book = Self::new();
        for r in records {
            book.record(r);
        }
        info!("loaded stats for {} opponents", book.players.len());
        book
    }

    /// Count a match and move that opponent to the front. Resets the cursor.
    pub fn record(&mut self, record: &MatchRecord) {
        let mut stats = match self
            .players
            .iter()
            .position(|p| p.name == record.remote_name)
        {
            Some(i) => self.players.remove(i),
            None => PlayerStats {
                name: record.remote_name.clone(),
                contact: String::new(),
                wins: 0,
                losses: 0,
                ties: 0,
                last_played: record.played_at,
            },
        };
        match record.outcome() {
            Some(Outcome::Win) => stats.wins += 1,
            Some(Outcome::Loss) => stats.losses += 1,
            Some(Outcome::Tie) => stats.ties += 1,
            None => debug!("unsettled match against {} not counted", record.remote_name),
        }
        stats.contact.clone_from(&record.remote_contact);
        stats.last_played = record.played_at;
        self.players.insert(0, stats);
        self.cursor = 0;
    }

    pub fn current(&self) -> Option<&PlayerStats> {
        self.players.get(self.cursor)
    }

    pub fn next(&mut self) {
        if self.cursor + 1 < self.players.len() {
            self.cursor += 1;
        }
    }

    pub fn previous(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerStats> {
        self.players.iter()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::protocol::Hand;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, 5, 7)
            .unwrap()
    }

    fn record(local: PlayerState, name: &str, h: u32) -> MatchRecord {
        MatchRecord {
            local,
            remote: PlayerState::Lost(Hand::Scissors),
            played_at: at(h),
            remote_name: name.to_string(),
            remote_contact: "c2".to_string(),
        }
    }

    #[test]
    fn line_format() {
        let r = record(PlayerState::Won(Hand::Rock), "Bob", 14);
        assert_eq!(r.to_string(), "W-\t2024-03-09T14:05:07\tBob\tc2");
        assert_eq!(r.to_string().parse::<MatchRecord>().unwrap(), r);
    }

    #[test]
    fn empty_contact_parses() {
        let r: MatchRecord = "TT\t2024-03-09T01:02:03\tBob\t\n".parse().unwrap();
        assert_eq!(r.remote_contact, "");
        assert_eq!(r.outcome(), Some(Outcome::Tie));
    }

    #[test]
    fn malformed_lines() {
        assert_eq!(
            "W-\tBob".parse::<MatchRecord>(),
            Err(RecordParseError::Fields(2))
        );
        assert!(matches!(
            "Z-\t2024-03-09T01:02:03\tBob\tc".parse::<MatchRecord>(),
            Err(RecordParseError::States(_))
        ));
        assert!(matches!(
            "W-\tyesterday\tBob\tc".parse::<MatchRecord>(),
            Err(RecordParseError::Timestamp(_))
        ));
    }

    #[test]
    fn book_counts_and_orders_most_recent_first() {
        let history = vec![
            record(PlayerState::Won(Hand::Rock), "Bob", 1),
            record(PlayerState::Lost(Hand::Paper), "Carol", 2),
            record(PlayerState::Tied(Hand::Rock), "Bob", 3),
            record(PlayerState::RemoteTimedOut, "Carol", 4),
        ];
        let mut book = StatsBook::from_history(&history);
        assert_eq!(book.len(), 2);
        let carol = book.current().unwrap();
        assert_eq!(carol.name, "Carol");
        assert_eq!((carol.wins, carol.losses, carol.ties), (0, 1, 0));
        assert_eq!(carol.last_played, at(4));
        book.next();
        let bob = book.current().unwrap();
        assert_eq!((bob.wins, bob.losses, bob.ties), (1, 0, 1));
        book.next();
        assert_eq!(book.current().unwrap().name, "Bob");
        book.previous();
        book.previous();
        assert_eq!(book.current().unwrap().name, "Carol");
    }
}
