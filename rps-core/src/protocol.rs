//! RPS wire protocol: message types, purpose codes and version.

use std::fmt;
use std::time::Duration;

/// Literal tag sent after the sender name of every frame.
pub const PROTOCOL_TAG: &str = "RPS";

/// Current protocol version. One ASCII character, compared bytewise.
pub const PROTOCOL_VERSION: u8 = b'A';

/// Largest frame the radio will carry, including the trailing CR/LF.
pub const MAX_MESSAGE_LEN: usize = 60;

/// Game number advertised in beacons: 0..=999, always three digits on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameNumber(u16);

impl GameNumber {
    pub const MAX: u16 = 999;

    pub fn new(n: u16) -> Option<Self> {
        (n <= Self::MAX).then_some(GameNumber(n))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for GameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// The single byte after the tag telling the receiver what kind of message this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    Move,
    Beacon,
    WithdrawBeacon,
    PlayAgain,
    Quit,
    Join,
    JoinAck,
}

impl Purpose {
    pub const ALL: [Purpose; 7] = [
        Purpose::Move,
        Purpose::Beacon,
        Purpose::WithdrawBeacon,
        Purpose::PlayAgain,
        Purpose::Quit,
        Purpose::Join,
        Purpose::JoinAck,
    ];

    pub fn code(self) -> u8 {
        match self {
            Purpose::Move => b'M',
            Purpose::Beacon => b'B',
            Purpose::WithdrawBeacon => b'N',
            Purpose::PlayAgain => b'P',
            Purpose::Quit => b'Q',
            Purpose::Join => b'J',
            Purpose::JoinAck => b'A',
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    /// How long outbound copies of this purpose may be echoed. Zero means never echoed.
    pub fn echo_window(self) -> Duration {
        match self {
            Purpose::Join => Duration::from_millis(42),
            Purpose::JoinAck => Duration::from_millis(12),
            _ => Duration::ZERO,
        }
    }
}

/// One of the three throws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Rock,
    Paper,
    Scissors,
}

impl Hand {
    pub const ALL: [Hand; 3] = [Hand::Rock, Hand::Paper, Hand::Scissors];

    /// True when `self` defeats `other`.
    pub fn beats(self, other: Hand) -> bool {
        matches!(
            (self, other),
            (Hand::Rock, Hand::Scissors) | (Hand::Scissors, Hand::Paper) | (Hand::Paper, Hand::Rock)
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Hand::Rock => "Rock",
            Hand::Paper => "Paper",
            Hand::Scissors => "Scissors",
        }
    }
}

/// Move payload carried by a Move message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireMove {
    Count1,
    Count2,
    Throw(Hand),
}

impl WireMove {
    pub fn code(self) -> u8 {
        match self {
            WireMove::Count1 => b'1',
            WireMove::Count2 => b'2',
            WireMove::Throw(Hand::Rock) => b'R',
            WireMove::Throw(Hand::Paper) => b'P',
            WireMove::Throw(Hand::Scissors) => b'S',
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'1' => Some(WireMove::Count1),
            b'2' => Some(WireMove::Count2),
            b'R' => Some(WireMove::Throw(Hand::Rock)),
            b'P' => Some(WireMove::Throw(Hand::Paper)),
            b'S' => Some(WireMove::Throw(Hand::Scissors)),
            _ => None,
        }
    }
}

/// Purpose-specific part of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Move(WireMove),
    Beacon,
    WithdrawBeacon,
    PlayAgain,
    Quit,
    /// Contact runs to CR/LF; it never contains either.
    Join { contact: String },
    JoinAck { contact: String },
}

impl Body {
    pub fn purpose(&self) -> Purpose {
        match self {
            Body::Move(_) => Purpose::Move,
            Body::Beacon => Purpose::Beacon,
            Body::WithdrawBeacon => Purpose::WithdrawBeacon,
            Body::PlayAgain => Purpose::PlayAgain,
            Body::Quit => Purpose::Quit,
            Body::Join { .. } => Purpose::Join,
            Body::JoinAck { .. } => Purpose::JoinAck,
        }
    }
}

/// A decoded (or about to be encoded) frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub version: u8,
    pub game_number: GameNumber,
    pub body: Body,
}

impl Message {
    /// Message stamped with our own protocol version.
    pub fn new(sender: impl Into<String>, game_number: GameNumber, body: Body) -> Self {
        Self {
            sender: sender.into(),
            version: PROTOCOL_VERSION,
            game_number,
            body,
        }
    }

    pub fn purpose(&self) -> Purpose {
        self.body.purpose()
    }

    /// Split into sender name and contact, consuming the message.
    /// Contact is `None` for purposes that carry none.
    pub fn into_sender_and_contact(self) -> (String, Option<String>) {
        let contact = match self.body {
            Body::Join { contact } | Body::JoinAck { contact } => Some(contact),
            _ => None,
        };
        (self.sender, contact)
    }
}
