//! stdout as the screen. A render thread redraws from the latest published snapshot.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use rps_core::{PlayerState, SessionPhase, SessionView};
use tracing::{trace, warn};

pub type SharedView = Arc<Mutex<SessionView>>;

/// How long the render thread waits for the view lock before skipping a frame.
pub const RENDER_LOCK_WAIT: Duration = Duration::from_millis(200);
/// How long the event consumer waits before dropping a publish.
pub const EVENT_LOCK_WAIT: Duration = Duration::from_millis(20);
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Replace the shared snapshot. Skipped if the render thread holds the lock too long;
/// the next event publishes again.
pub fn publish(shared: &SharedView, view: SessionView) {
    match shared.try_lock_for(EVENT_LOCK_WAIT) {
        Some(mut guard) => *guard = view,
        None => warn!("view busy, publish dropped"),
    }
}

pub struct Renderer {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Renderer {
    pub fn spawn(shared: SharedView) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("render".into())
            .spawn(move || {
                let mut last: Option<SessionView> = None;
                while !flag.load(Ordering::Relaxed) {
                    let snapshot = match shared.try_lock_for(RENDER_LOCK_WAIT) {
                        Some(guard) => guard.clone(),
                        None => {
                            trace!("view locked, skipping frame");
                            continue;
                        }
                    };
                    if last.as_ref() != Some(&snapshot) {
                        println!("{}", render(&snapshot));
                        last = Some(snapshot);
                    }
                    std::thread::sleep(FRAME_INTERVAL);
                }
            })?;
        Ok(Self { stop, handle })
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

fn mhz(frequency: u32) -> String {
    format!("{:.2} MHz", f64::from(frequency) / 1_000_000.0)
}

/// Text for one screen.
pub fn render(view: &SessionView) -> String {
    let mut s = String::new();
    if view.viewing_stats {
        match &view.stats {
            None => s.push_str("-- no games played --"),
            Some(p) => {
                let _ = write!(
                    s,
                    "-- {} --\nlast played {}\nwin:{}  lost:{}  tied:{}\ncontact: {}",
                    p.name,
                    p.last_played.format("%Y-%m-%d %H:%M"),
                    p.wins,
                    p.losses,
                    p.ties,
                    contact_line(&p.contact),
                );
            }
        }
        return s;
    }

    let _ = write!(s, "-- {} --", view.phase);
    match view.phase {
        SessionPhase::Idle => s.push_str("\nhost | browse | stats | help"),
        SessionPhase::Tuning(_) => {}
        SessionPhase::BadFrequency(_) => s.push_str("\npick another frequency"),
        SessionPhase::HostAdvertising => {
            let _ = write!(s, "\ngame {}", view.game_number);
            if let Some(f) = view.frequency {
                let _ = write!(s, " on {}", mhz(f));
            }
        }
        SessionPhase::Browsing => match &view.selected {
            None => s.push_str("\nno games yet"),
            Some(e) => {
                let _ = write!(
                    s,
                    "\n{} game {} by {} ({} found)",
                    if view.has_previous { "<" } else { " " },
                    e.game_number,
                    e.sender_name,
                    view.games_found,
                );
                if view.has_next {
                    s.push_str(" >");
                }
            }
        },
        SessionPhase::JoinRequested => {
            let _ = write!(s, "\nwaiting for game {} to accept", view.game_number);
        }
        SessionPhase::SessionReady => {
            let _ = write!(
                s,
                "\ngame {} vs {}\nyou: {}   them: {}",
                view.game_number,
                view.remote_name.as_deref().unwrap_or("?"),
                view.local,
                hide_throw(view.local, view.remote),
            );
            if view.local.is_terminal() {
                s.push_str("\nagain | quit");
            } else if view.local == PlayerState::RemoteTimedOut {
                s.push_str("\nback");
            }
        }
    }
    s
}

/// A contact's first character tags its kind; the rest is the address.
fn contact_line(contact: &str) -> String {
    let mut chars = contact.chars();
    match chars.next() {
        None => "-".to_string(),
        Some(kind) => format!("[{}] {}", kind, chars.as_str()),
    }
}

/// The remote throw stays hidden until ours is in.
fn hide_throw(local: PlayerState, remote: PlayerState) -> String {
    match remote {
        PlayerState::Chosen(_) if local.hand().is_none() => "ready to throw".to_string(),
        r => r.to_string(),
    }
}
