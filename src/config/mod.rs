//! Configuration module for the admin client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::path::PathBuf;

use reqwest::Url;

/// Production API host.
pub const DEFAULT_API_URL: &str = "https://api.green-sys.es";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend API, without a trailing slash
    pub api_base_url: String,
    /// File holding the persisted bearer token
    pub token_path: PathBuf,
    /// Host name the front end is deployed under
    pub app_host: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidApiUrl(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidApiUrl(url) => write!(f, "invalid GREENSYS_API_URL: {}", url),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_base_url =
            env::var("GREENSYS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let token_path = env::var("GREENSYS_TOKEN_PATH")
            .unwrap_or_else(|_| "./data/auth_token".to_string())
            .into();

        let app_host = env::var("GREENSYS_APP_HOST").unwrap_or_else(|_| "localhost".to_string());

        let log_level = env::var("GREENSYS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self::new(api_base_url, token_path, app_host, log_level)
    }

    /// Build a configuration, validating the API URL.
    pub fn new(
        api_base_url: impl Into<String>,
        token_path: PathBuf,
        app_host: impl Into<String>,
        log_level: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let api_base_url = api_base_url.into();
        match Url::parse(&api_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidApiUrl(api_base_url)),
        }

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token_path,
            app_host: app_host.into(),
            log_level: log_level.into(),
        })
    }

    /// Sandbox deployments are recognised by their host name.
    pub fn is_sandbox(&self) -> bool {
        self.app_host.to_ascii_lowercase().contains("sandbox")
    }
}
