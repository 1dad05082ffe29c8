//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";
pub const DEFAULT_WS_URL: &str = "ws://localhost:3001/ws";
pub const DEFAULT_STORE_PATH: &str = ".scholarix/storage.json";
pub const DEFAULT_LLM_URL: &str = "http://localhost:11434";
pub const DEFAULT_LLM_MODEL: &str = "llama3";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RECONNECT_INITIAL_MS: u64 = 1000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {var}: {value} (expected {expected})")]
    InvalidUrl { var: &'static str, value: String, expected: &'static str },
}

/// Reconnect policy for the socket transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Give up after this many consecutive failures. `0` retries forever.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_RECONNECT_INITIAL_MS),
            max_delay: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            multiplier: 2.0,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt number `attempt` (zero-based), capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled)
    }

    /// `true` once `failures` consecutive failures exhaust the attempt budget.
    #[must_use]
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts > 0 && failures >= self.max_attempts
    }
}

/// Realtime channel settings used by the connection handle.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeConfig {
    pub ws_url: String,
    /// Default sender id stamped on outbound messages.
    pub user_id: Option<String>,
    pub reconnect: ReconnectConfig,
}

/// Local LLM service used by the objection coach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub http_timeout: Duration,
    pub store_path: PathBuf,
    pub realtime: RealtimeConfig,
    pub llm: LlmConfig,
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `SCHOLARIX_API_URL`: REST base URL, default `http://localhost:3001/api`
    /// - `SCHOLARIX_WS_URL`: socket URL, default `ws://localhost:3001/ws`
    /// - `SCHOLARIX_USER_ID`: sender id for outbound messages
    /// - `SCHOLARIX_STORE_PATH`: local storage file
    /// - `SCHOLARIX_LLM_URL`, `SCHOLARIX_LLM_MODEL`, `SCHOLARIX_LLM_TIMEOUT_SECS`
    /// - `SCHOLARIX_HTTP_TIMEOUT_SECS`: default 30
    /// - `SCHOLARIX_RECONNECT_INITIAL_MS`, `SCHOLARIX_RECONNECT_MAX_MS`,
    ///   `SCHOLARIX_RECONNECT_MAX_ATTEMPTS`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] when a URL has the wrong scheme.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env_url("SCHOLARIX_API_URL", DEFAULT_API_URL, &["http://", "https://"], "http(s)://")?;
        let ws_url = env_url("SCHOLARIX_WS_URL", DEFAULT_WS_URL, &["ws://", "wss://"], "ws(s)://")?;
        let llm_url = env_url("SCHOLARIX_LLM_URL", DEFAULT_LLM_URL, &["http://", "https://"], "http(s)://")?;

        let user_id = std::env::var("SCHOLARIX_USER_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let store_path = std::env::var("SCHOLARIX_STORE_PATH")
            .map_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH), PathBuf::from);

        let reconnect = ReconnectConfig {
            initial_delay: Duration::from_millis(env_parse("SCHOLARIX_RECONNECT_INITIAL_MS", DEFAULT_RECONNECT_INITIAL_MS)),
            max_delay: Duration::from_millis(env_parse("SCHOLARIX_RECONNECT_MAX_MS", DEFAULT_RECONNECT_MAX_MS)),
            multiplier: 2.0,
            max_attempts: env_parse("SCHOLARIX_RECONNECT_MAX_ATTEMPTS", 0),
        };

        let llm = LlmConfig {
            base_url: llm_url,
            model: std::env::var("SCHOLARIX_LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            timeout: Duration::from_secs(env_parse("SCHOLARIX_LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)),
        };

        Ok(Self {
            api_url,
            http_timeout: Duration::from_secs(env_parse("SCHOLARIX_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)),
            store_path,
            realtime: RealtimeConfig { ws_url, user_id, reconnect },
            llm,
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_url(
    var: &'static str,
    default: &str,
    schemes: &[&str],
    expected: &'static str,
) -> Result<String, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    let value = raw.trim().trim_end_matches('/').to_string();
    if !schemes.iter().any(|scheme| value.starts_with(scheme)) {
        return Err(ConfigError::InvalidUrl { var, value, expected });
    }
    Ok(value)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
