//! Server configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use storylink_session::domain::identity::{DEFAULT_PLAYER_NAME, ParticipantRole};
use storylink_sync::config::SyncConfig;

use crate::error::AppError;

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Role of the participant this server hosts.
    pub role: ParticipantRole,
    /// Name substituted into dialogue.
    pub player_name: String,
    /// Story file to load at startup; the built-in sample is used when unset.
    pub story_path: Option<PathBuf>,
    /// Protocol and runtime settings.
    pub sync: SyncConfig,
}

impl ServerConfig {
    /// Reads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's value
    /// or `None` when it is unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = SyncConfig::default();
        let millis = |key: &str, default: Duration| -> Result<Duration, AppError> {
            lookup(key).map_or(Ok(default), |value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| AppError::Config(format!("{key} must be milliseconds: {e}")))
            })
        };

        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => 3000,
        };
        let role = match lookup("STORYLINK_ROLE") {
            Some(value) => value
                .parse()
                .map_err(|e| AppError::Config(format!("STORYLINK_ROLE: {e}")))?,
            None => ParticipantRole::Controller,
        };
        let sequence_guard = match lookup("STORYLINK_SEQUENCE_GUARD") {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                AppError::Config(format!(
                    "STORYLINK_SEQUENCE_GUARD must be a boolean, got '{value}'"
                ))
            })?,
            None => defaults.sequence_guard,
        };
        let topic_prefix = lookup("STORYLINK_TOPIC_PREFIX")
            .map(|prefix| prefix.trim().trim_end_matches('/').to_owned())
            .unwrap_or_else(|| defaults.topic_prefix.clone());
        if topic_prefix.is_empty() || topic_prefix.contains(['+', '#']) {
            return Err(AppError::Config(format!(
                "STORYLINK_TOPIC_PREFIX must be a plain topic, got '{topic_prefix}'"
            )));
        }

        let sync = SyncConfig {
            topic_prefix,
            cooldown: millis("STORYLINK_COOLDOWN_MS", defaults.cooldown)?,
            heartbeat_interval: millis("STORYLINK_HEARTBEAT_MS", defaults.heartbeat_interval)?,
            presence_sweep_interval: millis(
                "STORYLINK_PRESENCE_SWEEP_MS",
                defaults.presence_sweep_interval,
            )?,
            presence_timeout: millis("STORYLINK_PRESENCE_TIMEOUT_MS", defaults.presence_timeout)?,
            reconnect_delay: millis("STORYLINK_RECONNECT_DELAY_MS", defaults.reconnect_delay)?,
            reconnect_max_delay: millis(
                "STORYLINK_RECONNECT_MAX_DELAY_MS",
                defaults.reconnect_max_delay,
            )?,
            sequence_guard,
        };
        if sync.heartbeat_interval.is_zero() || sync.presence_sweep_interval.is_zero() {
            return Err(AppError::Config(
                "STORYLINK_HEARTBEAT_MS and STORYLINK_PRESENCE_SWEEP_MS must be positive".into(),
            ));
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port,
            role,
            player_name: lookup("STORYLINK_PLAYER_NAME")
                .unwrap_or_else(|| DEFAULT_PLAYER_NAME.to_owned()),
            story_path: lookup("STORYLINK_STORY_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            sync,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.role, ParticipantRole::Controller);
        assert_eq!(config.player_name, DEFAULT_PLAYER_NAME);
        assert_eq!(config.story_path, None);
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("STORYLINK_ROLE", "viewer"),
            ("STORYLINK_PLAYER_NAME", "Rex"),
            ("STORYLINK_STORY_PATH", "/tmp/story.yaml"),
            ("STORYLINK_TOPIC_PREFIX", "arena/"),
            ("STORYLINK_COOLDOWN_MS", "500"),
            ("STORYLINK_SEQUENCE_GUARD", "on"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.role, ParticipantRole::Viewer);
        assert_eq!(config.player_name, "Rex");
        assert_eq!(config.story_path, Some(PathBuf::from("/tmp/story.yaml")));
        assert_eq!(config.sync.topic_prefix, "arena");
        assert_eq!(config.sync.cooldown, Duration::from_millis(500));
        assert!(config.sync.sequence_guard);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(matches!(
            config_from(&[("PORT", "http")]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!(matches!(
            config_from(&[("STORYLINK_ROLE", "spectator")]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_wildcard_prefix_is_rejected() {
        assert!(matches!(
            config_from(&[("STORYLINK_TOPIC_PREFIX", "nerfwar/#")]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_zero_heartbeat_is_rejected() {
        assert!(matches!(
            config_from(&[("STORYLINK_HEARTBEAT_MS", "0")]),
            Err(AppError::Config(_))
        ));
    }
}
