//! Single event consumer: feeds events to the core and carries out the actions it returns.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::core::{Action, GameCore, Input, SessionView};
use crate::host::{Feedback, MatchStore, Transport};
use crate::reliability::{self, RetryPolicy};

/// Room for one received frame; the codec ignores anything past its own limit.
const READ_BUF_LEN: usize = 128;

/// Everything the consumer can be woken for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The transport has bytes waiting.
    DataAvailable,
    Tick,
    Input(Input),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

type Sleep = Box<dyn FnMut(Duration) + Send>;
type Clock = Box<dyn FnMut() -> NaiveDateTime + Send>;

/// Owns the core and its collaborators. Only one thread ever calls [`Dispatcher::dispatch`].
pub struct Dispatcher<T, F, S> {
    core: GameCore,
    transport: T,
    feedback: F,
    store: S,
    retry: RetryPolicy,
    rng: StdRng,
    sleep: Sleep,
    clock: Clock,
}

impl<T: Transport, F: Feedback, S: MatchStore> Dispatcher<T, F, S> {
    /// Loads persisted history into the core. An unreadable history is logged and skipped.
    pub fn new(mut core: GameCore, transport: T, feedback: F, store: S) -> Self {
        match store.load_match_history() {
            Ok(history) => core.load_history(&history),
            Err(e) => warn!("match history not loaded: {}", e),
        }
        let retry = core.settings().retry.into();
        Self {
            core,
            transport,
            feedback,
            store,
            retry,
            rng: StdRng::from_entropy(),
            sleep: Box::new(std::thread::sleep),
            clock: Box::new(|| chrono::Local::now().naive_local()),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_sleep(mut self, sleep: impl FnMut(Duration) + Send + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn with_clock(mut self, clock: impl FnMut() -> NaiveDateTime + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn core(&self) -> &GameCore {
        &self.core
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn view(&self) -> SessionView {
        self.core.view()
    }

    pub fn dispatch(&mut self, event: Event, now: Instant) -> Flow {
        match event {
            Event::DataAvailable => {
                let mut buf = [0u8; READ_BUF_LEN];
                loop {
                    let n = self.transport.read(&mut buf);
                    if n == 0 {
                        break;
                    }
                    let actions = self.core.on_frame(&buf[..n], now);
                    self.execute(actions, now);
                }
            }
            Event::Tick => {
                let actions = self.core.tick(now);
                self.execute(actions, now);
            }
            Event::Input(input) => {
                let actions = self.core.on_input(input, now);
                self.execute(actions, now);
            }
            Event::Shutdown => {
                info!("shutting down");
                let actions = self.core.shutdown(now);
                self.execute(actions, now);
                self.transport.stop();
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn execute(&mut self, actions: Vec<Action>, now: Instant) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Broadcast { frame, echo_window } => {
                    let echoes = reliability::echo_delays(echo_window, &mut self.rng);
                    if let Err(e) = reliability::transmit(
                        &mut self.transport,
                        &frame,
                        &echoes,
                        &self.retry,
                        &mut *self.sleep,
                    ) {
                        warn!("broadcast dropped: {}", e);
                    }
                }
                Action::Tune { frequency } => {
                    self.transport.stop();
                    let ok = self
                        .transport
                        .start(self.core.settings().channel, frequency);
                    debug!("tuned to {} Hz: {}", frequency, ok);
                    queue.extend(self.core.on_tuned(ok, now));
                }
                Action::Feedback(kind) => self.feedback.play_feedback_sequence(kind),
                Action::Vibrate(kind) => self.feedback.vibrate(kind),
                Action::RecordMatch(result) => {
                    let record = result.played_at((self.clock)());
                    if let Err(e) = self.store.append_match_record(&record) {
                        error!("match not saved: {}", e);
                    }
                    self.core.on_match_recorded(&record);
                }
            }
        }
    }
}
