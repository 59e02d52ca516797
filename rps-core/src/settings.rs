//! Game tunables. Hosts embed this in their own config file under `[core]`.

use std::time::Duration;

use serde::Deserialize;

use crate::reliability::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Name sent in every frame (no `:`).
    #[serde(default = "default_player_name")]
    pub player_name: String,
    /// Contact sent with Join / Join-Acknowledge.
    #[serde(default)]
    pub contact: String,
    /// Radio channel passed to the transport when tuning.
    #[serde(default)]
    pub channel: u8,
    /// Beacon period while hosting, in ticks (default 3).
    #[serde(default = "default_beacon_every_ticks")]
    pub beacon_every_ticks: u32,
    /// Remote must start counting within this long (default 60 s).
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
    /// Both throws stay visible this long before the result (default 500 ms).
    #[serde(default = "default_show_moves_ms")]
    pub show_moves_ms: u64,
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_player_name() -> String {
    "Player".to_string()
}
fn default_beacon_every_ticks() -> u32 {
    3
}
fn default_remote_timeout_ms() -> u64 {
    60_000
}
fn default_show_moves_ms() -> u64 {
    500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_name: default_player_name(),
            contact: String::new(),
            channel: 0,
            beacon_every_ticks: default_beacon_every_ticks(),
            remote_timeout_ms: default_remote_timeout_ms(),
            show_moves_ms: default_show_moves_ms(),
            retry: RetrySettings::default(),
        }
    }
}

impl Settings {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn show_moves(&self) -> Duration {
        Duration::from_millis(self.show_moves_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    8
}
fn default_initial_delay_ms() -> u64 {
    5
}
fn default_max_delay_ms() -> u64 {
    160
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(s: RetrySettings) -> Self {
        RetryPolicy {
            max_attempts: s.max_attempts,
            initial_delay: Duration::from_millis(s.initial_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_matches_policy_default() {
        assert_eq!(
            RetryPolicy::from(RetrySettings::default()),
            RetryPolicy::default()
        );
    }

    #[test]
    fn durations() {
        let s = Settings::default();
        assert_eq!(s.remote_timeout(), Duration::from_secs(60));
        assert_eq!(s.show_moves(), Duration::from_millis(500));
    }
}
