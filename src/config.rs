use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Logical channel carrying relay messages between proxy and backends
pub const DEFAULT_CHANNEL: &str = "commandbridge:main";

/// Settings for one bridge process (proxy or backend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeConfig {
    /// This process's identity; relay messages addressed elsewhere are ignored
    #[serde(default = "default_server_id")]
    pub server_id: String,

    /// Logical channel name (default: commandbridge:main)
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Prefix of the per-command permission node
    #[serde(default = "default_permission_prefix")]
    pub permission_prefix: String,

    /// Bounds for `wait-until-player-is-online` polling
    #[serde(default)]
    pub presence_poll: PollConfig,
}

/// Presence polling bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollConfig {
    /// Presence checks before the step gives up (default: 20)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Milliseconds between checks (default: 1000)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_server_id() -> String {
    "proxy".to_string()
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_permission_prefix() -> String {
    "commandbridge.command.".to_string()
}

fn default_max_attempts() -> u32 {
    20
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_id: default_server_id(),
            channel: default_channel(),
            permission_prefix: default_permission_prefix(),
            presence_poll: PollConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Default settings for the process identified by `server_id`.
    pub fn for_server(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    /// Returns default config if the file does not exist.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_id.trim().is_empty() {
            return Err(BridgeError::Config("server-id must not be empty".to_string()));
        }
        if self.channel.is_empty() {
            return Err(BridgeError::Config("channel must not be empty".to_string()));
        }
        if self.presence_poll.max_attempts == 0 {
            return Err(BridgeError::Config(
                "presence-poll.max-attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Permission node guarding the named command
    pub fn permission_for(&self, command: &str) -> String {
        format!("{}{}", self.permission_prefix, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.server_id, "proxy");
        assert_eq!(config.channel, "commandbridge:main");
        assert_eq!(config.presence_poll.max_attempts, 20);
        assert_eq!(config.presence_poll.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_permission_node() {
        let config = BridgeConfig::default();
        assert_eq!(config.permission_for("heal"), "commandbridge.command.heal");
    }

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
            server-id = "lobby-2"

            [presence-poll]
            max-attempts = 5
            interval-ms = 250
        "#;
        let config = BridgeConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.server_id, "lobby-2");
        assert_eq!(config.channel, DEFAULT_CHANNEL);
        assert_eq!(config.presence_poll.max_attempts, 5);
        assert_eq!(config.presence_poll.interval_ms, 250);
    }

    #[test]
    fn test_config_rejects_zero_attempts() {
        let toml_str = r#"
            [presence-poll]
            max-attempts = 0
        "#;
        assert!(matches!(
            BridgeConfig::from_toml_str(toml_str),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_config_rejects_empty_server_id() {
        assert!(BridgeConfig::from_toml_str("server-id = \"\"").is_err());
    }

    #[test]
    fn test_config_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "server-id = \"proxy-1\"\n").unwrap();
        let config = BridgeConfig::from_file(&path).unwrap();
        assert_eq!(config.server_id, "proxy-1");
    }
}
