// Broadcast Rock/Paper/Scissors for Linux: UDP multicast radio, stdin keypad, stdout screen.

mod config;
mod feedback;
mod input;
mod radio;
mod render;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use parking_lot::Mutex;
use rps_core::{Dispatcher, Event, Flow, GameCore, GameNumber};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::feedback::TerminalFeedback;
use crate::radio::UdpRadio;
use crate::render::{Renderer, SharedView};
use crate::store::FileMatchStore;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producers block once this many events are waiting.
const EVENT_QUEUE_CAPACITY: usize = 8;

fn main() -> anyhow::Result<()> {
    let mut config_path: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("rps-linux {}", VERSION);
                return Ok(());
            }
            "--config" => {
                config_path = Some(args.next().context("--config needs a path")?.into());
            }
            other => bail!("unknown argument {:?}", other),
        }
    }

    // the log filter lives in the config, so config problems go to a stderr logger of their own
    let early = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .finish();
    let cfg = config::load_with(config_path.as_deref(), early);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_filter)),
        )
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run(cfg));
    // stdin reads sit on a blocking thread that never returns on its own
    rt.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run(cfg: Config) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

    let data_dir = cfg.data_dir();
    let store = FileMatchStore::open(&data_dir)
        .with_context(|| format!("cannot create {}", data_dir.display()))?;
    info!("match history in {}", store.path().display());
    let radio = UdpRadio::new(&cfg, tokio::runtime::Handle::current(), tx.clone());
    let core = GameCore::new(cfg.core.clone(), Instant::now());
    let dispatcher = Dispatcher::new(core, radio, TerminalFeedback::stdout(), store);

    let view: SharedView = Arc::new(Mutex::new(dispatcher.view()));
    let renderer = Renderer::spawn(view.clone())?;

    let defaults = input::Defaults {
        game_number: GameNumber::new(cfg.default_game_number)
            .context("default_game_number must be 0..=999")?,
        frequency: cfg.default_frequency,
    };
    info!(
        "rps-linux {} as {:?}, {} channels from port {}",
        VERSION,
        cfg.core.player_name,
        cfg.frequencies.len(),
        cfg.base_port
    );
    println!("{}", input::HELP);

    tokio::spawn(ticker(
        tx.clone(),
        Duration::from_millis(cfg.tick_interval_ms.max(1)),
    ));
    tokio::spawn(input::run(tx.clone(), defaults));
    let signal_tx = tx.clone();
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("signal handler: {}", e);
            return;
        }
        let _ = signal_tx.send(Event::Shutdown).await;
    });
    drop(tx);

    let consumer = tokio::task::spawn_blocking(move || consume(dispatcher, rx, view));
    consumer.await?;
    renderer.stop();
    Ok(())
}

/// The only place game state is touched. Runs until Shutdown or every producer is gone.
fn consume(
    mut dispatcher: Dispatcher<UdpRadio, TerminalFeedback<std::io::Stdout>, FileMatchStore>,
    mut rx: mpsc::Receiver<Event>,
    view: SharedView,
) {
    while let Some(event) = rx.blocking_recv() {
        let flow = dispatcher.dispatch(event, Instant::now());
        render::publish(&view, dispatcher.view());
        if flow == Flow::Exit {
            break;
        }
    }
    info!("event loop finished");
}

async fn ticker(tx: mpsc::Sender<Event>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        interval.tick().await;
        if tx.send(Event::Tick).await.is_err() {
            return;
        }
    }
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticker_feeds_bounded_queue() {
        let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let task = tokio::spawn(ticker(tx, Duration::from_secs(1)));
        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(Event::Tick));
        }
        drop(rx);
        tokio::time::advance(Duration::from_secs(2)).await;
        task.await.unwrap();
    }
}
