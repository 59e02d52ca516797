//! Collaborator interfaces implemented by the host: radio, feedback and match history.

use crate::stats::MatchRecord;
use crate::turn::Outcome;

/// Broadcast radio. Writes are non-blocking and unacknowledged; a `false` return means the
/// frame was refused and may be retried.
pub trait Transport {
    /// Tune to `frequency` (Hz) on `channel`. `false` if the frequency is not usable here.
    fn start(&mut self, channel: u8, frequency: u32) -> bool;
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    fn write(&mut self, frame: &[u8]) -> bool;
    /// Copy pending received bytes into `buf`. Returns 0 when nothing is pending.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

/// What a feedback cue is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    /// Local move accepted.
    Move,
    Win,
    Loss,
    Tie,
    RemoteTimedOut,
}

impl From<Outcome> for FeedbackKind {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Win => FeedbackKind::Win,
            Outcome::Loss => FeedbackKind::Loss,
            Outcome::Tie => FeedbackKind::Tie,
        }
    }
}

/// Sound/LED/vibration. Implementations must return within a bounded time.
pub trait Feedback {
    fn play_feedback_sequence(&mut self, kind: FeedbackKind);
    fn vibrate(&mut self, kind: FeedbackKind);
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("match history i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent match history. Unreadable lines are skipped by the loader, not reported.
pub trait MatchStore {
    fn append_match_record(&mut self, record: &MatchRecord) -> Result<(), StoreError>;
    fn load_match_history(&self) -> Result<Vec<MatchRecord>, StoreError>;
}
