use std::time::Duration;

use tracing::Level;
use url::Url;

use crate::{Error, Result};

pub const API_URL_ENV: &str = "NT_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api/";
pub const DEFAULT_CHAT_MODEL: &str = "mistral small";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout: Duration,
    /// Extra attempts for idempotent reads.
    pub retries: u32,
    pub chat_model: String,
    pub log_level: Level,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            log_level: Level::INFO,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api_url = url;
            }
        }
        config
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// The base URL with a trailing slash, so relative endpoints join under it.
    pub fn base_url(&self) -> Result<Url> {
        let mut raw = self.api_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Backoff before retry number `attempt` (0-based): 1s, 2s, 4s... capped at 30s.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX).min(30);
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.chat_model, "mistral small");
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = ClientConfig::default().with_api_url("http://news.local:8080/api");
        let base = config.base_url().unwrap();
        assert_eq!(base.as_str(), "http://news.local:8080/api/");
        assert_eq!(base.join("length").unwrap().as_str(), "http://news.local:8080/api/length");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ClientConfig::default().with_api_url("not a url");
        assert!(matches!(config.base_url(), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let config = ClientConfig::default();
        assert_eq!(config.retry_delay(0), Duration::from_secs(1));
        assert_eq!(config.retry_delay(2), Duration::from_secs(4));
        assert_eq!(config.retry_delay(10), Duration::from_secs(30));
        assert_eq!(config.retry_delay(80), Duration::from_secs(30));
    }
}
