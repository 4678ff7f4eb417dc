use crate::criteria::PageBoundsPolicy;
use crate::state::ResponseFencing;
use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the scraper API (`SEARCH_API_URL`).
    pub api_url: String,
    /// Per-request timeout (`SEARCH_TIMEOUT_SECS`); unset means none.
    pub timeout: Option<Duration>,
    pub page_policy: PageBoundsPolicy,
    pub fencing: ResponseFencing,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: None,
            page_policy: PageBoundsPolicy::default(),
            fencing: ResponseFencing::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("SEARCH_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        if let Some(secs) = lookup("SEARCH_TIMEOUT_SECS") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "SEARCH_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(policy) = lookup("SEARCH_PAGE_POLICY") {
            config.page_policy = policy
                .trim()
                .parse::<PageBoundsPolicy>()
                .map_err(|reason| ConfigError::InvalidValue {
                    key: "SEARCH_PAGE_POLICY",
                    reason,
                })?;
        }
        if let Some(fencing) = lookup("SEARCH_FENCING") {
            config.fencing = fencing
                .trim()
                .parse::<ResponseFencing>()
                .map_err(|reason| ConfigError::InvalidValue {
                    key: "SEARCH_FENCING",
                    reason,
                })?;
        }
        Ok(config)
    }
}
