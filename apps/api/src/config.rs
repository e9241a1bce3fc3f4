use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
///
/// Upstream credentials are optional at startup: a missing key only fails the
/// requests that actually need the upstream service.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub search_engine_id: Option<String>,
    /// Credit limit assigned to users whose profile carries none.
    pub default_search_limit: u32,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub cache_ttl_days: i64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            search_api_key: optional_env("GOOGLE_SEARCH_API_KEY"),
            search_engine_id: optional_env("GOOGLE_SEARCH_ENGINE_ID"),
            default_search_limit: parse_env("JOB_SEARCH_LIMIT", 10)?,
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 60)?),
            probe_timeout: Duration::from_secs(parse_env("PROBE_TIMEOUT_SECS", 3)?),
            cache_ttl_days: parse_env("CACHE_TTL_DAYS", 14)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Names of the upstream credentials that are not configured.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        [
            ("ANTHROPIC_API_KEY", &self.anthropic_api_key),
            ("GOOGLE_SEARCH_API_KEY", &self.search_api_key),
            ("GOOGLE_SEARCH_ENGINE_ID", &self.search_engine_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: None,
            anthropic_api_key: None,
            search_api_key: None,
            search_engine_id: None,
            default_search_limit: 10,
            request_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(3),
            cache_ttl_days: 14,
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_lists_every_absent_key() {
        let config = Config {
            search_api_key: Some("key".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.missing_credentials(),
            vec!["ANTHROPIC_API_KEY", "GOOGLE_SEARCH_ENGINE_ID"]
        );
    }

    #[test]
    fn test_missing_credentials_empty_when_all_present() {
        let config = Config {
            anthropic_api_key: Some("a".to_string()),
            search_api_key: Some("b".to_string()),
            search_engine_id: Some("c".to_string()),
            ..Config::default()
        };
        assert!(config.missing_credentials().is_empty());
    }
}
