//! Expert Gateway configuration.
//!
//! Configuration is loaded from environment variables. API keys are held as
//! `SecretString` and one-time tokens are never printed; both are redacted
//! in Debug output.

use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default session lifetime in seconds (4 hours).
pub const DEFAULT_SESSION_LIFETIME_SECONDS: u64 = 4 * 60 * 60;

/// Longest accepted session lifetime in seconds (30 days).
pub const MAX_SESSION_LIFETIME_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Default expired-session sweep interval in seconds.
pub const DEFAULT_SESSION_SWEEP_INTERVAL_SECONDS: u64 = 600;

/// Default number of expert links returned per search.
pub const DEFAULT_MAX_EXPERT_RESULTS: u8 = 8;

/// Upper bound imposed by the search API on results per request.
pub const MAX_EXPERT_RESULTS_LIMIT: u8 = 10;

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default chat completion model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Default Google Custom Search API base URL.
pub const DEFAULT_GOOGLE_SEARCH_BASE_URL: &str = "https://www.googleapis.com";

/// Expert Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// One-time tokens available for exchange at startup.
    pub auth_tokens: Vec<String>,

    /// Session lifetime in seconds (default: 14400).
    pub session_lifetime_seconds: u64,

    /// Interval between expired-session sweeps. Zero disables the sweeper.
    pub session_sweep_interval_seconds: u64,

    /// Browser origin allowed by CORS. No CORS layer when unset.
    pub frontend_url: Option<String>,

    /// API key for the chat completion API.
    pub openai_api_key: SecretString,

    /// Base URL of the chat completion API.
    pub openai_base_url: String,

    /// Chat completion model name.
    pub openai_model: String,

    /// API key for Google Custom Search.
    pub google_api_key: SecretString,

    /// Google programmable search engine id (`cx`).
    pub google_search_engine_id: String,

    /// Base URL of the Google Custom Search API.
    pub google_search_base_url: String,

    /// Maximum expert links per search (1..=10).
    pub max_expert_results: u8,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("auth_tokens", &format!("[{} REDACTED]", self.auth_tokens.len()))
            .field("session_lifetime_seconds", &self.session_lifetime_seconds)
            .field(
                "session_sweep_interval_seconds",
                &self.session_sweep_interval_seconds,
            )
            .field("frontend_url", &self.frontend_url)
            .field("openai_api_key", &"[REDACTED]")
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("google_api_key", &"[REDACTED]")
            .field("google_search_engine_id", &self.google_search_engine_id)
            .field("google_search_base_url", &self.google_search_base_url)
            .field("max_expert_results", &self.max_expert_results)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid session lifetime configuration: {0}")]
    InvalidSessionLifetime(String),

    #[error("Invalid session sweep interval configuration: {0}")]
    InvalidSweepInterval(String),

    #[error("Invalid max expert results configuration: {0}")]
    InvalidMaxResults(String),

    #[error("Invalid frontend URL configuration: {0}")]
    InvalidFrontendUrl(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_tokens = vars
            .get("AUTH_TOKENS")
            .map(String::as_str)
            .map(parse_token_list)
            .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_TOKENS".to_string()))?;

        let openai_api_key =
            SecretString::from(required_any(vars, &["OPENAI_API_KEY", "OpenAi__ApiKey"])?);

        let google_api_key =
            SecretString::from(required_any(vars, &["GOOGLE_API_KEY", "Google__ApiKey"])?);

        let google_search_engine_id = required_any(
            vars,
            &["GOOGLE_SEARCH_ENGINE_ID", "Google__SearchEngineId"],
        )?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let frontend_url = match vars.get("FRONTEND_URL").map(|s| s.trim()) {
            Some(url) if !url.is_empty() => {
                if url.parse::<axum::http::HeaderValue>().is_err() {
                    return Err(ConfigError::InvalidFrontendUrl(format!(
                        "FRONTEND_URL is not a valid origin: '{}'",
                        url
                    )));
                }
                Some(url.trim_end_matches('/').to_string())
            }
            _ => None,
        };

        // Parse session lifetime with validation
        let session_lifetime_seconds =
            if let Some(value_str) = vars.get("SESSION_LIFETIME_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidSessionLifetime(format!(
                        "SESSION_LIFETIME_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidSessionLifetime(
                        "SESSION_LIFETIME_SECONDS must be greater than 0".to_string(),
                    ));
                }

                if value > MAX_SESSION_LIFETIME_SECONDS {
                    return Err(ConfigError::InvalidSessionLifetime(format!(
                        "SESSION_LIFETIME_SECONDS must be at most {}, got {}",
                        MAX_SESSION_LIFETIME_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_SESSION_LIFETIME_SECONDS
            };

        let session_sweep_interval_seconds =
            if let Some(value_str) = vars.get("SESSION_SWEEP_INTERVAL_SECONDS") {
                value_str.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidSweepInterval(format!(
                        "SESSION_SWEEP_INTERVAL_SECONDS must be a valid non-negative integer, got '{}': {}",
                        value_str, e
                    ))
                })?
            } else {
                DEFAULT_SESSION_SWEEP_INTERVAL_SECONDS
            };

        let max_expert_results = if let Some(value_str) = vars.get("MAX_EXPERT_RESULTS") {
            let value: u8 = value_str.parse().map_err(|e| {
                ConfigError::InvalidMaxResults(format!(
                    "MAX_EXPERT_RESULTS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_EXPERT_RESULTS_LIMIT {
                return Err(ConfigError::InvalidMaxResults(format!(
                    "MAX_EXPERT_RESULTS must be between 1 and {}, got {}",
                    MAX_EXPERT_RESULTS_LIMIT, value
                )));
            }

            value
        } else {
            DEFAULT_MAX_EXPERT_RESULTS
        };

        let openai_base_url = vars
            .get("OPENAI_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        let openai_model = vars
            .get("OPENAI_MODEL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

        let google_search_base_url = vars
            .get("GOOGLE_SEARCH_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_GOOGLE_SEARCH_BASE_URL.to_string());

        Ok(Config {
            bind_address,
            auth_tokens,
            session_lifetime_seconds,
            session_sweep_interval_seconds,
            frontend_url,
            openai_api_key,
            openai_base_url,
            openai_model,
            google_api_key,
            google_search_engine_id,
            google_search_base_url,
            max_expert_results,
        })
    }
}

/// Split a comma-separated token list, trimming entries and dropping blanks.
pub fn parse_token_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// First non-blank value among `names`, or `MissingEnvVar` naming the first.
fn required_any(vars: &HashMap<String, String>, names: &[&str]) -> Result<String, ConfigError> {
    names
        .iter()
        .filter_map(|name| vars.get(*name))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ConfigError::MissingEnvVar(names.first().copied().unwrap_or_default().to_string())
        })
}
