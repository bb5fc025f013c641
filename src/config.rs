use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HTTPConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(skip)]
    pub credentials: Credentials,
}
impl AppConfig {
    /// An explicitly given config file must exist, while the default
    /// `config.toml` is optional and falls back to built-in defaults.
    pub fn load(config_filepath: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_filepath {
            Some(config_path) => Self::from_file(&config_path)?,
            None => {
                let config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if config_path.is_file() {
                    Self::from_file(&config_path)?
                } else {
                    debug!("No {DEFAULT_CONFIG_PATH} found, using default configuration");
                    Self::default()
                }
            }
        };

        config.credentials = Credentials::from_env();
        Ok(config)
    }

    fn from_file(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;

        Self::parse(&config_content)
            .with_context(|| format!("Failed to parse TOML config file: {config_path:?}"))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        if config.telegram.max_message_length == 0 {
            bail!("telegram.max_message_length must be greater than zero");
        }
        if config.completion.timeout_secs == 0 {
            bail!("completion.timeout_secs must be greater than zero");
        }
        if config.telegram.timeout_secs == 0 {
            bail!("telegram.timeout_secs must be greater than zero");
        }

        Ok(config)
    }
}

/// Secrets are only ever taken from the environment, and their absence is
/// reported rather than rejected so the health endpoint still comes up.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub telegram_bot_token: Option<String>,
    pub completion_api_key: Option<String>,
    pub webhook_secret: Option<String>,
}
impl Credentials {
    pub fn from_env() -> Self {
        let credentials = Self {
            telegram_bot_token: non_empty_env("TELEGRAM_BOT_TOKEN"),
            completion_api_key: non_empty_env("NVIDIA_API_KEY"),
            webhook_secret: non_empty_env("TELEGRAM_WEBHOOK_SECRET"),
        };

        if credentials.telegram_bot_token.is_none() {
            warn!("Missing TELEGRAM_BOT_TOKEN environment variable, replies cannot be sent!");
        }
        if credentials.completion_api_key.is_none() {
            warn!("Missing NVIDIA_API_KEY environment variable, completion requests will be unauthenticated!");
        }

        credentials
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct HTTPConfig {
    #[serde(default = "default_http_address")]
    pub address: SocketAddr,

    #[serde(default)]
    pub tls: Option<TLSConfig>,
}
impl Default for HTTPConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            tls: None,
        }
    }
}

#[cfg_attr(
    not(any(feature = "tls-rustls", feature = "tls-native")),
    allow(dead_code)
)]
#[derive(Debug, Clone, Deserialize)]
pub struct TLSConfig {
    #[serde(deserialize_with = "deserialize_existing_file")]
    pub certificate_path: PathBuf,

    #[serde(deserialize_with = "deserialize_existing_file")]
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,

    /// Prepended as a system turn when set.
    #[serde(default)]
    pub system_prompt: Option<String>,
}
impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_completion_endpoint(),
            model: default_completion_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_completion_timeout(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    #[serde(default = "default_telegram_timeout")]
    pub timeout_secs: u64,

    /// Public base URL (eg: https://relay.example.com), registered on startup if set.
    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}
impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_telegram_api_base(),
            timeout_secs: default_telegram_timeout(),
            public_url: None,
            max_message_length: default_max_message_length(),
        }
    }
}

fn default_http_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8080)
}
fn default_completion_endpoint() -> String {
    "https://integrate.api.nvidia.com/v1/chat/completions".to_string()
}
fn default_completion_model() -> String {
    "moonshotai/kimi-k2.5".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_completion_timeout() -> u64 {
    30
}
fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_telegram_timeout() -> u64 {
    10
}

/// Hard limit imposed by the Bot API on sendMessage text.
fn default_max_message_length() -> usize {
    4096
}

fn deserialize_existing_file<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path = PathBuf::deserialize(deserializer)?;
    if !path.exists() {
        return Err(serde::de::Error::custom(format!(
            "File does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(serde::de::Error::custom(format!(
            "Path is not a file: {}",
            path.display()
        )));
    }
    Ok(path)
}
