//! Environment-driven configuration for the chat server and client.
//!
//! Values come from process environment variables, optionally seeded from a
//! `.env` file by [`load_env`]. Command-line flags layer on top in the binary.

use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumString};
use thiserror::Error;
use tracing::debug;

pub const API_KEY_VAR: &str = "PARLEY_API_KEY";
/// Accepted when [`API_KEY_VAR`] is unset.
pub const FALLBACK_API_KEY_VAR: &str = "OTHER_API_KEY";
pub const BASE_URL_VAR: &str = "PARLEY_BASE_URL";
pub const MODEL_VAR: &str = "PARLEY_MODEL";
pub const MAX_STEPS_VAR: &str = "PARLEY_MAX_STEPS";
pub const TOOL_TIMEOUT_VAR: &str = "PARLEY_TOOL_TIMEOUT_SECS";
pub const REQUEST_TIMEOUT_VAR: &str = "PARLEY_REQUEST_TIMEOUT_SECS";
pub const ENDPOINT_VAR: &str = "PARLEY_ENDPOINT";
pub const CONTEXT_MODE_VAR: &str = "PARLEY_CONTEXT_MODE";

pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-V3.2";
pub const DEFAULT_MAX_STEPS: usize = 5;
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/chat";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COPY_FEEDBACK: Duration = Duration::from_millis(2000);
pub const DEFAULT_INPUT_MAX_ROWS: u16 = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No API key configured; set {API_KEY_VAR} or {FALLBACK_API_KEY_VAR}")]
    MissingApiKey,

    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Load a `.env` file from the working directory if one exists.
pub fn load_env() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(target: "config", path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => debug!(target: "config", error = %e, "Ignoring unreadable .env"),
    }
}

/// Which messages the client sends with each request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ContextMode {
    /// Every message in the transcript.
    #[default]
    #[strum(serialize = "full")]
    FullHistory,
    /// System messages plus the most recent user turn.
    #[strum(serialize = "latest-turn")]
    LatestTurnOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub max_steps: usize,
    pub tool_timeout: Duration,
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get(API_KEY_VAR)
            .or_else(|| get(FALLBACK_API_KEY_VAR))
            .ok_or(ConfigError::MissingApiKey)?;

        let max_steps = match get(MAX_STEPS_VAR) {
            Some(raw) => {
                let steps: usize = parse_value(MAX_STEPS_VAR, &raw)?;
                if steps == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: MAX_STEPS_VAR,
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    });
                }
                steps
            }
            None => DEFAULT_MAX_STEPS,
        };

        Ok(Self {
            api_key,
            base_url: get(BASE_URL_VAR),
            model: get(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_steps,
            tool_timeout: parse_secs(TOOL_TIMEOUT_VAR, get(TOOL_TIMEOUT_VAR))?
                .unwrap_or(DEFAULT_TOOL_TIMEOUT),
            request_timeout: parse_secs(REQUEST_TIMEOUT_VAR, get(REQUEST_TIMEOUT_VAR))?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub connect_timeout: Duration,
    /// How long "Copied!" stays visible after a copy.
    pub copy_feedback: Duration,
    /// Rows the input grows to before it scrolls.
    pub input_max_rows: u16,
    pub context_mode: ContextMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            copy_feedback: DEFAULT_COPY_FEEDBACK,
            input_max_rows: DEFAULT_INPUT_MAX_ROWS,
            context_mode: ContextMode::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(endpoint) = get(ENDPOINT_VAR) {
            config.endpoint = endpoint;
        }
        if let Some(mode) = get(CONTEXT_MODE_VAR) {
            config.context_mode = parse_value(CONTEXT_MODE_VAR, &mode)?;
        }
        Ok(config)
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_secs(key: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    raw.map(|raw| parse_value::<u64>(key, &raw).map(Duration::from_secs))
        .transpose()
}
