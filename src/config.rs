//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default management API base URL.
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

/// Default poll interval, matching the admin page's refresh cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default per-request timeout for management API calls.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Console configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Management API base URL (no trailing slash required).
    pub base_url: String,
    /// Optional bearer token sent with every request.
    pub api_token: Option<SecretString>,
    /// Process to attach to on startup. `None` starts detached.
    pub process_id: Option<i64>,
    /// Fixed interval between scheduled list calls.
    pub poll_interval: Duration,
    /// Per-request timeout handed to the HTTP client.
    pub request_timeout: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            process_id: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ConsoleConfig {
    /// Build config from `CRAWLER_CONSOLE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Missing keys fall back to
    /// defaults; present but unparseable keys are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("CRAWLER_CONSOLE_BASE_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.base_url);

        let api_token = lookup("CRAWLER_CONSOLE_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        let process_id = match lookup("CRAWLER_CONSOLE_PROCESS_ID") {
            Some(raw) if !raw.trim().is_empty() => {
                Some(parse_process_id("CRAWLER_CONSOLE_PROCESS_ID", &raw)?)
            }
            _ => None,
        };

        let poll_interval = match lookup("CRAWLER_CONSOLE_POLL_INTERVAL_MS") {
            Some(raw) => {
                let ms = parse_positive("CRAWLER_CONSOLE_POLL_INTERVAL_MS", &raw)?;
                Duration::from_millis(ms)
            }
            None => defaults.poll_interval,
        };

        let request_timeout = match lookup("CRAWLER_CONSOLE_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = parse_positive("CRAWLER_CONSOLE_REQUEST_TIMEOUT_SECS", &raw)?;
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        Ok(Self {
            base_url,
            api_token,
            process_id,
            poll_interval,
            request_timeout,
        })
    }
}

/// Parse a process identifier. Process ids are positive integers.
pub fn parse_process_id(key: &str, raw: &str) -> Result<i64, ConfigError> {
    let id: i64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?} is not an integer ({e})"),
    })?;
    if id <= 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("process id must be positive, got {id}"),
        });
    }
    Ok(id)
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        }),
        Ok(v) => Ok(v),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?} is not a number ({e})"),
        }),
    }
}
