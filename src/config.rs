use std::env;
use std::fmt;
use std::time::Duration;

use axum::http::HeaderValue;
use dotenvy::dotenv;
use url::Url;

use crate::constants::{
    DEFAULT_HOST, DEFAULT_MAX_PROMPT_LENGTH, DEFAULT_MAX_RESPONSE_LENGTH, DEFAULT_PORT,
    DEFAULT_UPSTREAM_TIMEOUT_SECS,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not a valid number: {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} is not a valid http(s) URL: {value:?}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("{name} is not usable as a header value: {value:?}")]
    InvalidOrigin { name: &'static str, value: String },
}

/// Upstream bearer credential. Never printed, not even through `Debug`.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Prompt and response length limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum prompt length, in characters
    pub max_prompt_length: usize,
    /// Maximum relayed output, in characters
    pub max_response_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_prompt_length: DEFAULT_MAX_PROMPT_LENGTH,
            max_response_length: DEFAULT_MAX_RESPONSE_LENGTH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub url: Url,
    pub api_key: ApiKey,
    /// Forwarded as the `model` field when set
    pub model: Option<String>,
    pub timeout: Duration,
}

/// Immutable process configuration, built once in `main` and shared through `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Compared byte-for-byte against `Origin` and echoed in
    /// `Access-Control-Allow-Origin`
    pub allowed_origin: HeaderValue,
    pub limits: Limits,
    pub upstream: UpstreamConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get("PROMPT_RELAY_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_number(&get, "PROMPT_RELAY_PORT", DEFAULT_PORT)?;

        let raw_origin = get("PROMPT_RELAY_ALLOWED_ORIGIN")
            .ok_or(ConfigError::Missing("PROMPT_RELAY_ALLOWED_ORIGIN"))?;
        let allowed_origin = HeaderValue::from_str(raw_origin.trim()).map_err(|_| {
            ConfigError::InvalidOrigin {
                name: "PROMPT_RELAY_ALLOWED_ORIGIN",
                value: raw_origin.clone(),
            }
        })?;

        let limits = Limits {
            max_prompt_length: parse_number(
                &get,
                "PROMPT_RELAY_MAX_PROMPT_LENGTH",
                DEFAULT_MAX_PROMPT_LENGTH,
            )?,
            max_response_length: parse_number(
                &get,
                "PROMPT_RELAY_MAX_RESPONSE_LENGTH",
                DEFAULT_MAX_RESPONSE_LENGTH,
            )?,
        };

        let raw_url = get("PROMPT_RELAY_UPSTREAM_URL")
            .ok_or(ConfigError::Missing("PROMPT_RELAY_UPSTREAM_URL"))?;
        let url = Url::parse(raw_url.trim())
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| ConfigError::InvalidUrl {
                name: "PROMPT_RELAY_UPSTREAM_URL",
                value: raw_url.clone(),
            })?;

        let api_key = get("PROMPT_RELAY_UPSTREAM_API_KEY")
            .map(ApiKey::new)
            .ok_or(ConfigError::Missing("PROMPT_RELAY_UPSTREAM_API_KEY"))?;

        let model = get("PROMPT_RELAY_UPSTREAM_MODEL").map(|m| m.trim().to_string());
        let timeout_secs: u64 = parse_number(
            &get,
            "PROMPT_RELAY_UPSTREAM_TIMEOUT_SECS",
            DEFAULT_UPSTREAM_TIMEOUT_SECS,
        )?;

        Ok(Self {
            host,
            port,
            allowed_origin,
            limits,
            upstream: UpstreamConfig {
                url,
                api_key,
                model,
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}

fn parse_number<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("PROMPT_RELAY_ALLOWED_ORIGIN", "https://app.example.com"),
        ("PROMPT_RELAY_UPSTREAM_URL", "https://api.example.com/v1/generate"),
        ("PROMPT_RELAY_UPSTREAM_API_KEY", "sk-test"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.limits.max_prompt_length, 1000);
        assert_eq!(config.limits.max_response_length, 5000);
        assert_eq!(config.allowed_origin, "https://app.example.com");
        assert!(config.allowed_origin.to_str().is_ok());
        assert_eq!(config.upstream.model, None);
        assert_eq!(
            config.upstream.timeout,
            Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PROMPT_RELAY_PORT", "9000"),
            ("PROMPT_RELAY_MAX_PROMPT_LENGTH", "10"),
            ("PROMPT_RELAY_MAX_RESPONSE_LENGTH", " 42 "),
            ("PROMPT_RELAY_UPSTREAM_MODEL", "text-small"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.limits.max_prompt_length, 10);
        assert_eq!(config.limits.max_response_length, 42);
        assert_eq!(config.upstream.model.as_deref(), Some("text-small"));
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing("PROMPT_RELAY_ALLOWED_ORIGIN")
        ));

        // Blank values count as unset
        let mut vars = REQUIRED[..2].to_vec();
        vars.push(("PROMPT_RELAY_UPSTREAM_API_KEY", "  "));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing("PROMPT_RELAY_UPSTREAM_API_KEY")
        ));
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PROMPT_RELAY_MAX_PROMPT_LENGTH", "lots"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("PROMPT_RELAY_MAX_PROMPT_LENGTH"));

        let vars = [
            ("PROMPT_RELAY_ALLOWED_ORIGIN", "https://app.example.com"),
            ("PROMPT_RELAY_UPSTREAM_URL", "ftp://api.example.com"),
            ("PROMPT_RELAY_UPSTREAM_API_KEY", "sk-test"),
        ];
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_unrepresentable_origin_rejected() {
        for origin in ["https://exämple.com", "https://app.example.com\nX-Injected: 1"] {
            let mut vars = REQUIRED[1..].to_vec();
            vars.push(("PROMPT_RELAY_ALLOWED_ORIGIN", origin));
            let err = Config::from_lookup(lookup(&vars)).unwrap_err();
            assert!(
                matches!(
                    err,
                    ConfigError::InvalidOrigin {
                        name: "PROMPT_RELAY_ALLOWED_ORIGIN",
                        ..
                    }
                ),
                "origin {origin:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_origin_trimmed() {
        let mut vars = REQUIRED[1..].to_vec();
        vars.push(("PROMPT_RELAY_ALLOWED_ORIGIN", " https://app.example.com "));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.allowed_origin, "https://app.example.com");
    }

    #[test]
    fn test_api_key_redacted() {
        let config = Config::from_lookup(lookup(REQUIRED)).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("<redacted>"));
        assert_eq!(config.upstream.api_key.expose(), "sk-test");
    }
}
