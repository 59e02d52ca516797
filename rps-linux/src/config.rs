//! Load config from file and environment.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use rps_core::Settings;
use tracing::warn;

/// Host configuration. File: ~/.config/rps/config.toml or /etc/rps/config.toml.
/// Env overrides: RPS_NAME, RPS_CONTACT, RPS_FREQUENCY, RPS_BASE_PORT, RPS_DATA_DIR.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub core: Settings,
    /// Channel plan in Hz. Each entry gets its own multicast port.
    #[serde(default = "default_frequencies")]
    pub frequencies: Vec<u32>,
    /// Frequency used by `host` and `browse` when none is given (default 433.92 MHz).
    #[serde(default = "default_frequency")]
    pub default_frequency: u32,
    #[serde(default = "default_game_number")]
    pub default_game_number: u16,
    #[serde(default = "default_multicast_group")]
    pub multicast_group: Ipv4Addr,
    /// Port of the first frequency in the plan (default 45800).
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Where games.txt lives (default ~/.local/share/rps).
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// tracing filter when RUST_LOG is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_frequencies() -> Vec<u32> {
    vec![
        300_000_000,
        303_875_000,
        304_250_000,
        310_000_000,
        315_000_000,
        318_000_000,
        390_000_000,
        418_000_000,
        433_075_000,
        433_420_000,
        433_920_000,
        434_420_000,
        434_775_000,
        438_900_000,
        868_350_000,
        915_000_000,
        925_000_000,
    ]
}
fn default_frequency() -> u32 {
    433_920_000
}
fn default_game_number() -> u16 {
    42
}
fn default_multicast_group() -> Ipv4Addr {
    Ipv4Addr::new(239, 255, 42, 99)
}
fn default_base_port() -> u16 {
    45800
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: Settings::default(),
            frequencies: default_frequencies(),
            default_frequency: default_frequency(),
            default_game_number: default_game_number(),
            multicast_group: default_multicast_group(),
            base_port: default_base_port(),
            tick_interval_ms: default_tick_interval_ms(),
            data_dir: None,
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        if let Some(d) = &self.data_dir {
            return d.clone();
        }
        match std::env::var_os("HOME") {
            Some(h) => PathBuf::from(h).join(".local/share/rps"),
            None => PathBuf::from("."),
        }
    }

    /// Position of `frequency` in the channel plan.
    pub fn channel_index(&self, frequency: u32) -> Option<usize> {
        self.frequencies.iter().position(|&f| f == frequency)
    }
}

/// Load config: merge default, then config file (explicit path or first found), then env vars.
pub fn load(explicit: Option<&Path>) -> Config {
    let file = match explicit {
        Some(p) => load_path(p),
        None => load_file(),
    };
    let mut c = file.unwrap_or_default();
    apply_env(&mut c, |k| std::env::var(k).ok());
    c
}

/// [`load`] with its warnings sent to `subscriber`, for use before the global one is installed.
pub fn load_with<S>(explicit: Option<&Path>, subscriber: S) -> Config
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    tracing::subscriber::with_default(subscriber, || load(explicit))
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("RPS_NAME") {
        c.core.player_name = s;
    }
    if let Some(s) = var("RPS_CONTACT") {
        c.core.contact = s;
    }
    if let Some(s) = var("RPS_FREQUENCY") {
        if let Ok(f) = s.parse::<u32>() {
            c.default_frequency = f;
        }
    }
    if let Some(s) = var("RPS_BASE_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.base_port = p;
        }
    }
    if let Some(s) = var("RPS_DATA_DIR") {
        c.data_dir = Some(PathBuf::from(s));
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/rps/config.toml"));
    }
    out.push(PathBuf::from("/etc/rps/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    config_paths()
        .into_iter()
        .find(|p| p.exists())
        .and_then(|p| load_path(&p))
}

fn load_path(p: &Path) -> Option<Config> {
    let s = match std::fs::read_to_string(p) {
        Ok(s) => s,
        Err(e) => {
            warn!("cannot read {}: {}", p.display(), e);
            return None;
        }
    };
    match toml::from_str::<Config>(&s) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("ignoring {}: {}", p.display(), e);
            None
        }
    }
}
