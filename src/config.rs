use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{AssistantError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Global kill switch for the assistant.  Can be overridden with the
    /// `FEATURE_AI_ASSISTANT_ENABLED` env var.
    #[serde(default = "default_true")]
    pub assistant_enabled: bool,

    #[serde(default)]
    pub billing: BillingConfig,

    #[serde(default)]
    pub stream: StreamConfig,
}

// -- Billing -----------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// When false the entitlement gate never talks to the billing backend.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metered feature that every assistant request is reported against.
    #[serde(default = "default_feature_id")]
    pub feature_id: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feature_id: default_feature_id(),
        }
    }
}

// -- Stream ------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Topic shared by every thread's message updates.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Buffer size of the in-process broadcast transport.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_feature_id() -> String {
    "jovu-requests".to_string()
}
fn default_topic() -> String {
    "assistantMessageUpdated".to_string()
}
fn default_channel_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assistant_enabled: true,
            billing: BillingConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl Config {
    /// Load config from the given path, or the default location, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        let flag = std::env::var("FEATURE_AI_ASSISTANT_ENABLED").ok();
        config.apply_assistant_flag(flag.as_deref())?;
        Ok(config)
    }

    /// Load config from a file only; the environment is not consulted.
    pub fn load_file(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)
                .map_err(|e| AssistantError::Config(format!("parse error: {e}")))
        } else {
            info!("no config file found, using defaults");
            Ok(Config::default())
        }
    }

    /// Apply a `FEATURE_AI_ASSISTANT_ENABLED` value, if one is set.
    pub fn apply_assistant_flag(&mut self, value: Option<&str>) -> Result<()> {
        if let Some(v) = value {
            self.assistant_enabled = parse_flag(v).ok_or_else(|| {
                AssistantError::Config(format!("FEATURE_AI_ASSISTANT_ENABLED: invalid value '{v}'"))
            })?;
        }
        Ok(())
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/assistant-core/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("assistant-core")
            .join("config.toml")
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
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
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let c = Config::default();
        assert!(c.assistant_enabled);
        assert!(c.billing.enabled);
        assert_eq!(c.billing.feature_id, "jovu-requests");
        assert_eq!(c.stream.topic, "assistantMessageUpdated");
        assert_eq!(c.stream.channel_capacity, 256);
    }

    #[test]
    fn example_config_parses_to_defaults() {
        let c: Config = toml::from_str(Config::default_config_contents()).unwrap();
        let d = Config::default();
        assert_eq!(c.assistant_enabled, d.assistant_enabled);
        assert_eq!(c.billing.feature_id, d.billing.feature_id);
        assert_eq!(c.stream.topic, d.stream.topic);
        assert_eq!(c.stream.channel_capacity, d.stream.channel_capacity);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c: Config = toml::from_str("[billing]\nenabled = false\n").unwrap();
        assert!(!c.billing.enabled);
        assert_eq!(c.billing.feature_id, "jovu-requests");
        assert!(c.assistant_enabled);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[stream]\ntopic = \"custom\"\nchannel_capacity = 8\n").unwrap();
        let c = Config::load_file(Some(&path)).unwrap();
        assert_eq!(c.stream.topic, "custom");
        assert_eq!(c.stream.channel_capacity, 8);
    }

    #[test]
    fn load_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "assistant_enabled = \"maybe\"").unwrap();
        let err = Config::load_file(Some(&path)).unwrap_err();
        assert!(matches!(err, AssistantError::Config(_)));
    }

    #[test]
    fn load_nonexistent_returns_defaults() {
        let c = Config::load_file(Some(Path::new("/tmp/nonexistent-assistant-core-test.toml"))).unwrap();
        assert_eq!(c.billing.feature_id, "jovu-requests");
    }

    #[test]
    fn assistant_flag_overrides_file_value() {
        let mut c = Config::default();
        c.apply_assistant_flag(Some("false")).unwrap();
        assert!(!c.assistant_enabled);
        c.apply_assistant_flag(Some("true")).unwrap();
        assert!(c.assistant_enabled);
    }

    #[test]
    fn assistant_flag_unset_keeps_value() {
        let mut c: Config = toml::from_str("assistant_enabled = false").unwrap();
        c.apply_assistant_flag(None).unwrap();
        assert!(!c.assistant_enabled);
    }

    #[test]
    fn assistant_flag_invalid_value_is_config_error() {
        let mut c = Config::default();
        let err = c.apply_assistant_flag(Some("maybe")).unwrap_err();
        assert!(matches!(err, AssistantError::Config(ref m) if m.contains("maybe")));
        assert!(c.assistant_enabled);
    }

    #[test]
    fn parse_flag_values() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" ON "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("nope"), None);
    }
}
