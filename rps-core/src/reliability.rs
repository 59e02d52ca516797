//! Reliability over a lossy broadcast channel: jittered echoes and bounded retry of refused writes.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::host::Transport;

/// Echoes of one message never spread over more than this.
pub const ECHO_BUDGET: Duration = Duration::from_millis(49);

pub const MAX_ECHOES: usize = 3;

/// Smallest useful gap between two copies of a frame.
const MIN_GAP: Duration = Duration::from_millis(4);

/// Gaps to wait before each echo of a frame, in order. Gaps are weighted 1:2:3 and jittered
/// downward by up to a quarter, so they strictly increase and sum to at most the window.
/// Windows too short for three gaps get fewer echoes; a zero window gets none.
pub fn echo_delays<R: Rng + ?Sized>(window: Duration, rng: &mut R) -> Vec<Duration> {
    let window = window.min(ECHO_BUDGET);
    let Some(count) = (1..=MAX_ECHOES)
        .rev()
        .find(|&n| window / weight_sum(n) >= MIN_GAP)
    else {
        return Vec::new();
    };
    let unit = window.as_micros() as u64 / u64::from(weight_sum(count));
    (1..=count as u64)
        .map(|weight| {
            let gap = unit * weight;
            Duration::from_micros(gap - rng.gen_range(0..=gap / 4))
        })
        .collect()
}

fn weight_sum(n: usize) -> u32 {
    (n * (n + 1) / 2) as u32
}

/// Bounded exponential backoff for writes the transport refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(160),
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th refusal (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("transport refused frame {attempts} times")]
    Exhausted { attempts: u32 },
}

/// Write once, retrying refusals per `policy`.
pub fn send_with_retry<T: Transport + ?Sized>(
    transport: &mut T,
    frame: &[u8],
    policy: &RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> Result<(), SendError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        if transport.write(frame) {
            if attempt > 0 {
                debug!("frame accepted after {} retries", attempt);
            }
            return Ok(());
        }
        if attempt + 1 < attempts {
            sleep(policy.backoff(attempt));
        }
    }
    error!("transport refused frame {} times, dropping", attempts);
    Err(SendError::Exhausted { attempts })
}

/// Send `frame`, then echo it after each delay in `echoes`. Only the first copy is retried;
/// a refused echo is logged and skipped.
pub fn transmit<T: Transport + ?Sized>(
    transport: &mut T,
    frame: &[u8],
    echoes: &[Duration],
    policy: &RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> Result<(), SendError> {
    send_with_retry(transport, frame, policy, sleep)?;
    for (i, delay) in echoes.iter().enumerate() {
        sleep(*delay);
        if !transport.write(frame) {
            warn!("echo {} of {} refused", i + 1, echoes.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    /// Refuses the first `refusals` writes, then accepts.
    struct Flaky {
        refusals: u32,
        writes: Vec<Vec<u8>>,
    }

    impl Transport for Flaky {
        fn start(&mut self, _channel: u8, _frequency: u32) -> bool {
            true
        }
        fn stop(&mut self) {}
        fn is_running(&self) -> bool {
            true
        }
        fn write(&mut self, frame: &[u8]) -> bool {
            if self.refusals > 0 {
                self.refusals -= 1;
                return false;
            }
            self.writes.push(frame.to_vec());
            true
        }
        fn read(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
    }

    #[test]
    fn join_window_gets_three_increasing_echoes() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let d = echo_delays(Duration::from_millis(42), &mut rng);
            assert_eq!(d.len(), 3);
            assert!(d.windows(2).all(|w| w[0] < w[1]), "{d:?}");
            assert!(d.iter().sum::<Duration>() <= Duration::from_millis(42));
        }
    }

    #[test]
    fn short_windows_get_fewer_echoes() {
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(echo_delays(Duration::from_millis(12), &mut rng).len(), 2);
        assert_eq!(echo_delays(Duration::from_millis(5), &mut rng).len(), 1);
        assert!(echo_delays(Duration::from_millis(3), &mut rng).is_empty());
        assert!(echo_delays(Duration::ZERO, &mut rng).is_empty());
    }

    #[test]
    fn echoes_stay_under_budget() {
        let mut rng = StdRng::seed_from_u64(3);
        let d = echo_delays(Duration::from_secs(1), &mut rng);
        assert!(d.iter().sum::<Duration>() <= ECHO_BUDGET);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(0), Duration::from_millis(5));
        assert_eq!(p.backoff(1), Duration::from_millis(10));
        assert_eq!(p.backoff(5), Duration::from_millis(160));
        assert_eq!(p.backoff(40), Duration::from_millis(160));
    }

    #[test]
    fn retry_succeeds_after_refusals() {
        let mut t = Flaky {
            refusals: 3,
            writes: Vec::new(),
        };
        let mut slept = Vec::new();
        send_with_retry(&mut t, b"x", &RetryPolicy::default(), &mut |d| slept.push(d)).unwrap();
        assert_eq!(t.writes.len(), 1);
        assert_eq!(
            slept,
            vec![
                Duration::from_millis(5),
                Duration::from_millis(10),
                Duration::from_millis(20)
            ]
        );
    }

    #[test]
    fn retry_is_bounded() {
        let mut t = Flaky {
            refusals: u32::MAX,
            writes: Vec::new(),
        };
        let err = send_with_retry(&mut t, b"x", &RetryPolicy::default(), &mut |_| {}).unwrap_err();
        assert_eq!(err, SendError::Exhausted { attempts: 8 });
        assert!(t.writes.is_empty());
    }

    #[test]
    fn transmit_writes_frame_and_echoes() {
        let mut t = Flaky {
            refusals: 0,
            writes: Vec::new(),
        };
        let echoes = [Duration::from_millis(5), Duration::from_millis(10)];
        let mut slept = Vec::new();
        transmit(&mut t, b"f", &echoes, &RetryPolicy::default(), &mut |d| {
            slept.push(d)
        })
        .unwrap();
        assert_eq!(t.writes.len(), 3);
        assert_eq!(slept, echoes.to_vec());
    }
}
