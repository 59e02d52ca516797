//! Broadcast-radio Rock/Paper/Scissors protocol reference implementation.
//! Host-driven: no I/O; host passes events and receives actions.

pub mod core;
pub mod directory;
pub mod dispatcher;
pub mod handshake;
pub mod host;
pub mod protocol;
pub mod reliability;
pub mod session;
pub mod settings;
pub mod stats;
pub mod turn;
pub mod wire;

pub use crate::core::{Action, GameCore, Input, SessionView};
pub use directory::{PeerDirectory, PeerGameEntry, Upsert};
pub use dispatcher::{Dispatcher, Event, Flow};
pub use handshake::{Role, SessionPhase};
pub use host::{Feedback, FeedbackKind, MatchStore, StoreError, Transport};
pub use protocol::{Body, GameNumber, Hand, Message, Purpose, WireMove, PROTOCOL_VERSION};
pub use reliability::{RetryPolicy, SendError};
pub use settings::Settings;
pub use stats::{MatchRecord, MatchResult, PlayerStats, StatsBook};
pub use turn::{LocalMove, Outcome, PlayerState};
pub use wire::{decode, encode, DecodeError, EncodeError};
