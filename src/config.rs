//! Server configuration parsed from environment variables.
//!
//! Every value has a fallback so the server starts against a local
//! OpenAI-compatible proxy with no environment at all.

use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "http://localhost:4000/v1";
pub const DEFAULT_API_KEY: &str = "sk-1234";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Timeouts for upstream calls. `request_secs` bounds catalog requests only;
/// chat streams run until the upstream closes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub timeouts: LlmTimeouts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
    pub event_buffer: usize,
}

impl AppConfig {
    /// Build typed config from the process environment.
    ///
    /// - `LLM_API_BASE`: default `http://localhost:4000/v1`
    /// - `LLM_API_KEY`: default `sk-1234`
    /// - `LLM_REQUEST_TIMEOUT_SECS`: default 30
    /// - `LLM_CONNECT_TIMEOUT_SECS`: default 10
    /// - `PORT`: default 3000
    /// - `STATIC_DIR`: optional directory served as the browser UI
    /// - `EVENT_BUFFER`: default 1024
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is not a valid port or `EVENT_BUFFER` is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary variable lookup. Empty values are
    /// treated as unset.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base = get("LLM_API_BASE")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let api_key = get("LLM_API_KEY").unwrap_or_else(|| DEFAULT_API_KEY.to_string());
        let timeouts = LlmTimeouts {
            request_secs: parse_or(get("LLM_REQUEST_TIMEOUT_SECS"), DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_or(get("LLM_CONNECT_TIMEOUT_SECS"), DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid { var: "PORT", reason: e.to_string() })?,
            None => DEFAULT_PORT,
        };

        let event_buffer = parse_or(get("EVENT_BUFFER"), DEFAULT_EVENT_BUFFER);
        if event_buffer == 0 {
            return Err(ConfigError::Invalid { var: "EVENT_BUFFER", reason: "must be greater than zero".into() });
        }

        Ok(Self {
            llm: LlmConfig { api_base, api_key, timeouts },
            port,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            event_buffer,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
