//! Runtime configuration.
//!
//! Process settings come from environment variables (optionally via `.env`).
//! The timer rules come from a JSON document, see [`RuleSet`].

mod rules;

pub use rules::{KickRules, RuleSet, TikTokRules};

#[cfg(test)]
pub(crate) use rules::sample_rules;

use std::path::PathBuf;
use std::time::Duration;

use subathon_platforms::{KICK_WS_URL, TIKTOK_RELAY_URL};

/// Fixed delay before reconnecting a dropped platform connection.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Process configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Path of the rules document
    pub rules_path: PathBuf,
    /// TikTok username to follow at boot (empty = disabled)
    pub tiktok_user: String,
    /// Kick channel to follow at boot (empty = disabled)
    pub kick_channel: String,
    /// TikTok relay URL template, `{user}` is substituted
    pub tiktok_relay_url: String,
    /// Kick chat WebSocket URL
    pub kick_ws_url: String,
    /// Reconnect the TikTok relay after an unexpected close
    pub tiktok_reconnect: bool,
    /// Reconnect Kick chat after an unexpected close
    pub kick_reconnect: bool,
    /// Directory for rolling log files
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            rules_path: PathBuf::from("rules.json"),
            tiktok_user: String::new(),
            kick_channel: String::new(),
            tiktok_relay_url: TIKTOK_RELAY_URL.to_string(),
            kick_ws_url: KICK_WS_URL.to_string(),
            tiktok_reconnect: false,
            kick_reconnect: true,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `API_BIND_ADDRESS` (e.g. "0.0.0.0")
    /// - `PORT` or `API_PORT` (e.g. "8080")
    /// - `RULES_PATH`
    /// - `TIKTOK_USERNAME`, `KICK_CHANNEL`
    /// - `TIKTOK_RELAY_URL`, `KICK_WS_URL`
    /// - `TIKTOK_RECONNECT`, `KICK_RECONNECT`
    /// - `LOG_DIR`
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bind_address) = non_empty("API_BIND_ADDRESS") {
            config.bind_address = bind_address;
        }

        if let Some(port) = non_empty("PORT").or_else(|| non_empty("API_PORT"))
            && let Ok(parsed) = port.trim().parse::<u16>()
        {
            config.port = parsed;
        }

        if let Some(path) = non_empty("RULES_PATH") {
            config.rules_path = PathBuf::from(path);
        }

        if let Some(user) = lookup("TIKTOK_USERNAME") {
            config.tiktok_user = user.trim().to_string();
        }
        if let Some(channel) = lookup("KICK_CHANNEL") {
            config.kick_channel = channel.trim().to_string();
        }

        if let Some(url) = non_empty("TIKTOK_RELAY_URL") {
            config.tiktok_relay_url = url;
        }
        if let Some(url) = non_empty("KICK_WS_URL") {
            config.kick_ws_url = url;
        }

        if let Some(flag) = non_empty("TIKTOK_RECONNECT").and_then(|v| parse_bool(&v)) {
            config.tiktok_reconnect = flag;
        }
        if let Some(flag) = non_empty("KICK_RECONNECT").and_then(|v| parse_bool(&v)) {
            config.kick_reconnect = flag;
        }

        config.log_dir = non_empty("LOG_DIR").map(PathBuf::from);

        config
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
