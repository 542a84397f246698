use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONSOLE_CONFIG: &str = "MANUS_CONSOLE_CONFIG";
pub const ENV_SERVER_URL: &str = "MANUS_CONSOLE_SERVER_URL";

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5001";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RECONNECTION_ATTEMPTS: u32 = 5;
const DEFAULT_RECONNECTION_DELAY_MS: u64 = 1000;
const DEFAULT_RECONNECTION_DELAY_MAX_MS: u64 = 5000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_TOAST_DURATION_MS: u64 = 3000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsoleConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    #[serde(default = "default_reconnection_attempts")]
    pub reconnection_attempts: u32,
    #[serde(default = "default_reconnection_delay_ms")]
    pub reconnection_delay_ms: u64,
    #[serde(default = "default_reconnection_delay_max_ms")]
    pub reconnection_delay_max_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiConfig {
    #[serde(default = "default_toast_duration_ms")]
    pub toast_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_secs: default_request_timeout_secs(),
            channel: ChannelConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnection_attempts: default_reconnection_attempts(),
            reconnection_delay_ms: default_reconnection_delay_ms(),
            reconnection_delay_max_ms: default_reconnection_delay_max_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            toast_duration_ms: default_toast_duration_ms(),
            font_path: None,
        }
    }
}

impl ConsoleConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.ui.toast_duration_ms)
    }
}

impl ChannelConfig {
    /// Delay before reconnection attempt `attempt` (1-based).
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let scaled = self
            .reconnection_delay_ms
            .saturating_mul(u64::from(attempt.max(1)));
        Duration::from_millis(scaled.min(self.reconnection_delay_max_ms))
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_reconnection_attempts() -> u32 {
    DEFAULT_RECONNECTION_ATTEMPTS
}

fn default_reconnection_delay_ms() -> u64 {
    DEFAULT_RECONNECTION_DELAY_MS
}

fn default_reconnection_delay_max_ms() -> u64 {
    DEFAULT_RECONNECTION_DELAY_MAX_MS
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_toast_duration_ms() -> u64 {
    DEFAULT_TOAST_DURATION_MS
}

pub fn load_from_env() -> Result<ConsoleConfig, ConfigError> {
    let path = config_path_from_env()?;
    let mut config = load_from_path(&path)?;

    if let Ok(url) = std::env::var(ENV_SERVER_URL) {
        if !url.trim().is_empty() {
            config.server_url = url.trim().to_string();
            validate(&config)?;
        }
    }

    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConsoleConfig, ConfigError> {
    let config = load_or_create_config(path.as_ref())?;
    validate(&config)?;
    Ok(config)
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve the user configuration directory")
    })?;
    Ok(base.join("manus-console").join("config.toml"))
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_CONSOLE_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "MANUS_CONSOLE_CONFIG contained invalid UTF-8",
        )),
    }
}

fn load_or_create_config(path: &Path) -> Result<ConsoleConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let config = ConsoleConfig::default();
            persist_config(path, &config)?;
            return Ok(config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read config from {}: {err}",
                path.display()
            )));
        }
    };

    toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse config from {}: {err}",
            path.display()
        ))
    })
}

fn persist_config(path: &Path, config: &ConsoleConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| {
                ConfigError::configuration(format!(
                    "Failed to create config directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
    }

    let serialized = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!("Failed to serialize default config: {err}"))
    })?;
    std::fs::write(path, serialized).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write config to {}: {err}",
            path.display()
        ))
    })
}

fn validate(config: &ConsoleConfig) -> Result<(), ConfigError> {
    let url = url::Url::parse(config.server_url.trim()).map_err(|err| {
        ConfigError::configuration(format!(
            "server_url {:?} is not a valid URL: {err}",
            config.server_url
        ))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::configuration(format!(
            "server_url must use http or https, got {}",
            url.scheme()
        )));
    }
    if config.channel.reconnection_attempts == 0 {
        return Err(ConfigError::configuration(
            "channel.reconnection_attempts must be at least 1",
        ));
    }
    Ok(())
}
