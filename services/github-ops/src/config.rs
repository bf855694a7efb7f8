//! Client configuration
//!
//! Values come from explicit construction or from environment variables:
//! - `GITHUB_API_URL` (default `https://api.github.com`)
//! - `GITHUB_HTTP_TIMEOUT_SECS` (default 30)
//! - `GITHUB_MAX_RETRIES` (default 5)
//!
//! A value that is set but unparseable, or a zero timeout, is rejected.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{GitHubError, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_USER_AGENT: &str = concat!("github-ops/", env!("CARGO_PKG_VERSION"));

/// Backoff settings for rate-limited responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each subsequent one
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps, used against mock servers
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Exponential delay for a 0-based retry attempt, capped at `max_delay`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Settings for [`crate::client::GitHubClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from a key lookup; unset or blank keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = value("GITHUB_API_URL") {
            config.api_url = url.trim().to_string();
        }
        if let Some(raw) = value("GITHUB_HTTP_TIMEOUT_SECS") {
            let secs: u64 = parse_var("GITHUB_HTTP_TIMEOUT_SECS", &raw)?;
            if secs == 0 {
                return Err(GitHubError::Validation(
                    "GITHUB_HTTP_TIMEOUT_SECS must be at least 1".to_string(),
                ));
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = value("GITHUB_MAX_RETRIES") {
            config.retry.max_retries = parse_var("GITHUB_MAX_RETRIES", &raw)?;
        }

        Ok(config)
    }

    /// Point the client at another API root (GitHub Enterprise, mock servers)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// API root without a trailing slash
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| GitHubError::Validation(format!("{key} must be a non-negative integer, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(4), Duration::from_secs(10));
        assert_eq!(policy.backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn test_immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.backoff(2), Duration::ZERO);
    }

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let config = ClientConfig::default().with_api_url("http://127.0.0.1:8080/");
        assert_eq!(config.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("GITHUB_API_URL", "https://ghe.example.com/api/v3/"),
            ("GITHUB_HTTP_TIMEOUT_SECS", "5"),
            ("GITHUB_MAX_RETRIES", "0"),
        ]))
        .unwrap();
        assert_eq!(config.base_url(), "https://ghe.example.com/api/v3");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn test_lookup_unset_or_blank_keeps_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[("GITHUB_API_URL", "  ")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("GITHUB_HTTP_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, GitHubError::Validation(_)));
    }

    #[test]
    fn test_unparseable_values_rejected() {
        for (key, raw) in [
            ("GITHUB_HTTP_TIMEOUT_SECS", "thirty"),
            ("GITHUB_MAX_RETRIES", "-1"),
        ] {
            let err = ClientConfig::from_lookup(lookup(&[(key, raw)])).unwrap_err();
            assert!(matches!(err, GitHubError::Validation(_)), "accepted {key}={raw}");
        }
    }
}
