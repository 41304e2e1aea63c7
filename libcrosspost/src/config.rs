//! Configuration management for Crosspost
//!
//! Non-secret settings live in a TOML file; secrets (Notion API key, Discord
//! bot token) come from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const DEFAULT_DRAFT_CHANNEL: &str = "1450436525585072138";
pub const DEFAULT_PUBLISH_CHANNEL: &str = "1450436543595417732";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub extension: ExtensionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(default)]
    pub main_database_id: Option<String>,
    #[serde(default = "default_notion_api_base")]
    pub api_base: String,
    /// How long the main configuration database may be served from cache
    #[serde(default = "default_config_ttl")]
    pub config_ttl: String,
}

/// Hardcoded fallbacks used when the store has no value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default = "default_draft_channel")]
    pub draft_fallback: String,
    #[serde(default = "default_publish_channel")]
    pub publish_fallback: String,
    #[serde(default)]
    pub inspiration_default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_selection_timeout")]
    pub selection_timeout: String,
    #[serde(default = "default_text_timeout")]
    pub text_timeout: String,
    #[serde(default = "default_image_timeout")]
    pub image_timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

/// Parsed collector timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowTimeouts {
    pub selection: Duration,
    pub text: Duration,
    pub image: Duration,
}

impl Default for WorkflowTimeouts {
    fn default() -> Self {
        Self {
            selection: Duration::from_secs(60),
            text: Duration::from_secs(300),
            image: Duration::from_secs(60),
        }
    }
}

fn default_notion_api_base() -> String {
    "https://api.notion.com".to_string()
}

fn default_config_ttl() -> String {
    "5m".to_string()
}

fn default_draft_channel() -> String {
    DEFAULT_DRAFT_CHANNEL.to_string()
}

fn default_publish_channel() -> String {
    DEFAULT_PUBLISH_CHANNEL.to_string()
}

fn default_selection_timeout() -> String {
    "60s".to_string()
}

fn default_text_timeout() -> String {
    "5m".to_string()
}

fn default_image_timeout() -> String {
    "60s".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_body_limit_mb() -> usize {
    50
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            main_database_id: None,
            api_base: default_notion_api_base(),
            config_ttl: default_config_ttl(),
        }
    }
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            draft_fallback: default_draft_channel(),
            publish_fallback: default_publish_channel(),
            inspiration_default: None,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            selection_timeout: default_selection_timeout(),
            text_timeout: default_text_timeout(),
            image_timeout: default_image_timeout(),
        }
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, then apply environment overrides
    ///
    /// A missing file is not an error: built-in defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Overlay values that may come from the environment
    pub fn apply_env(&mut self) {
        if let Ok(id) = std::env::var("NOTION_MAIN_DATABASE_ID") {
            if !id.trim().is_empty() {
                self.notion.main_database_id = Some(id.trim().to_string());
            }
        }
        if let Ok(id) = std::env::var("SITE_INSPIRATION_CHANNEL_ID") {
            if !id.trim().is_empty() {
                self.channels.inspiration_default = Some(id.trim().to_string());
            }
        }
    }

    pub fn main_database_id(&self) -> Result<&str> {
        self.notion
            .main_database_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConfigError::MissingField("notion.main_database_id".to_string()).into())
    }

    pub fn config_ttl(&self) -> Result<Duration> {
        parse_duration("notion.config_ttl", &self.notion.config_ttl)
    }

    pub fn timeouts(&self) -> Result<WorkflowTimeouts> {
        Ok(WorkflowTimeouts {
            selection: parse_duration(
                "workflow.selection_timeout",
                &self.workflow.selection_timeout,
            )?,
            text: parse_duration("workflow.text_timeout", &self.workflow.text_timeout)?,
            image: parse_duration("workflow.image_timeout", &self.workflow.image_timeout)?,
        })
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).map_err(|e| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Read a required secret from the environment
pub fn secret_from_env(var: &str) -> Result<SecretString> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value.trim().to_string())),
        _ => Err(ConfigError::MissingField(var.to_string()).into()),
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSPOST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosspost").join("config.toml"))
}
