//! Portal endpoints, client identity and timeouts.

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

const SEARCH_PATH: &str = "/tcs/dss/selectDataSetList.do";
const DETAIL_FUNCTION_PATH: &str = "/tcs/dss/selectApiDetailFunction.do";

/// Configuration for talking to the portal.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Portal web root hosting the search and detail pages.
    pub portal_url: String,
    /// Root of the hosted API gateway; legacy pages are scanned for URLs under its host.
    pub api_base_url: String,
    /// User-Agent header.
    pub user_agent: String,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds.
    pub read_timeout_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            portal_url: "https://www.data.go.kr".to_string(),
            api_base_url: "https://apis.data.go.kr".to_string(),
            user_agent:
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                    .to_string(),
            connect_timeout_ms: 5_000,
            read_timeout_ms: 15_000,
        }
    }
}

impl PortalConfig {
    /// Defaults overridden by `GOVCAT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(v) = env::var("GOVCAT_PORTAL_URL") {
            config.portal_url = parse_url("GOVCAT_PORTAL_URL", v)?;
        }
        if let Ok(v) = env::var("GOVCAT_API_BASE_URL") {
            config.api_base_url = parse_url("GOVCAT_API_BASE_URL", v)?;
        }
        if let Ok(v) = env::var("GOVCAT_USER_AGENT") {
            config.user_agent = v;
        }
        if let Ok(v) = env::var("GOVCAT_CONNECT_TIMEOUT_MS") {
            config.connect_timeout_ms = parse_number("GOVCAT_CONNECT_TIMEOUT_MS", v)?;
        }
        if let Ok(v) = env::var("GOVCAT_READ_TIMEOUT_MS") {
            config.read_timeout_ms = parse_number("GOVCAT_READ_TIMEOUT_MS", v)?;
        }

        Ok(config)
    }

    /// Overall request timeout: connect + read.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.saturating_add(self.read_timeout_ms))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn search_url(&self) -> String {
        format!("{}{}", self.portal_root(), SEARCH_PATH)
    }

    pub fn detail_url(&self, catalog_id: &str) -> String {
        format!("{}/data/{}/openapi.do", self.portal_root(), catalog_id)
    }

    pub fn detail_function_url(&self) -> String {
        format!("{}{}", self.portal_root(), DETAIL_FUNCTION_PATH)
    }

    /// Host of `api_base_url`, e.g. `apis.data.go.kr`.
    pub fn api_host(&self) -> Option<String> {
        Url::parse(&self.api_base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    fn portal_root(&self) -> &str {
        self.portal_url.trim_end_matches('/')
    }
}

fn parse_url(key: &'static str, value: String) -> Result<String, ConfigError> {
    match Url::parse(&value) {
        Ok(_) => Ok(value),
        Err(_) => Err(ConfigError::InvalidUrl { key, value }),
    }
}

fn parse_number(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { key, value })
}
