//! Terminal feedback: a bell for results, a log line for everything.

use std::io::Write;

use rps_core::{Feedback, FeedbackKind};
use tracing::{debug, info};

pub struct TerminalFeedback<W> {
    out: W,
}

impl TerminalFeedback<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalFeedback<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn bell(&mut self, times: usize) {
        let _ = self.out.write_all(&b"\x07".repeat(times));
        let _ = self.out.flush();
    }
}

impl<W: Write> Feedback for TerminalFeedback<W> {
    fn play_feedback_sequence(&mut self, kind: FeedbackKind) {
        info!("feedback: {:?}", kind);
        match kind {
            FeedbackKind::Win => self.bell(3),
            FeedbackKind::Tie | FeedbackKind::RemoteTimedOut => self.bell(2),
            FeedbackKind::Loss | FeedbackKind::Move => self.bell(1),
        }
    }

    fn vibrate(&mut self, kind: FeedbackKind) {
        debug!("bzz ({:?})", kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_rings_three_times() {
        let mut f = TerminalFeedback::new(Vec::new());
        f.play_feedback_sequence(FeedbackKind::Win);
        f.vibrate(FeedbackKind::Move);
        assert_eq!(f.out, b"\x07\x07\x07");
    }
}
