use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:1337";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const BASE_URL_ENV: &str = "CMS_BASE_URL";
pub const API_TOKEN_ENV: &str = "CMS_API_TOKEN";
pub const TIMEOUT_ENV: &str = "CMS_TIMEOUT_SECS";

/// Connection settings for one CMS backend.
///
/// Built once and handed to [`crate::CmsClient::new`]; the client never
/// mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CmsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `CMS_BASE_URL`, `CMS_API_TOKEN` and `CMS_TIMEOUT_SECS`,
    /// keeping defaults for anything unset. Empty values count as unset.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();

        if let Some(base_url) = read_env(BASE_URL_ENV) {
            config.base_url = base_url;
        }

        config.api_token = read_env(API_TOKEN_ENV);

        if let Some(secs) = read_env(TIMEOUT_ENV) {
            let secs: u64 = secs
                .parse()
                .map_err(|_| format!("{} must be a whole number of seconds", TIMEOUT_ENV))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Base URL must start with http:// or https://".to_string());
        }

        if let Some(token) = &self.api_token {
            if token.trim().is_empty() {
                return Err("API token cannot be blank".to_string());
            }
            if HeaderValue::from_str(&format!("Bearer {}", token)).is_err() {
                return Err("API token contains characters not allowed in a header".to_string());
            }
        }

        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
