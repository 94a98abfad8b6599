//! Configuration management utilities
//!
//! [`Settings`] gathers the externally supplied configuration: model
//! credentials, the host/port a worker service binds to, and remote-call and
//! session timeouts. Values are read from the process environment after an
//! optional `.env` file has been loaded.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 10000;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_TTL_SECS: u64 = 1800;

/// Environment variable names read by [`Settings::from_env`]
pub mod vars {
    pub const API_KEY: &str = "OPENAI_API_KEY";
    pub const API_BASE: &str = "OPENAI_API_BASE";
    pub const MODEL: &str = "RELAY_MODEL";
    pub const HOST: &str = "RELAY_HOST";
    pub const PORT: &str = "RELAY_PORT";
    pub const REMOTE_TIMEOUT_SECS: &str = "RELAY_REMOTE_TIMEOUT_SECS";
    pub const SESSION_TTL_SECS: &str = "RELAY_SESSION_TTL_SECS";
}

/// Errors raised while reading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A variable was present but could not be parsed
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Externally supplied configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Model provider API key (opaque; may be empty for local servers)
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible endpoint
    pub api_base: String,
    /// Model identifier passed to the backend
    pub model: String,
    /// Host a worker service binds to
    pub host: String,
    /// Port a worker service binds to
    pub port: u16,
    /// Timeout for a single remote worker call
    pub remote_timeout: Duration,
    /// Idle time after which a remote session is discarded
    pub session_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

impl Settings {
    /// Load settings from `.env` (if present) and the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup
    ///
    /// Unset variables fall back to defaults; set-but-malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match non_empty(vars::PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| SettingsError::InvalidValue {
                name: vars::PORT,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.port,
        };

        let remote_timeout = match non_empty(vars::REMOTE_TIMEOUT_SECS) {
            Some(raw) => parse_secs(vars::REMOTE_TIMEOUT_SECS, &raw)?,
            None => defaults.remote_timeout,
        };

        let session_ttl = match non_empty(vars::SESSION_TTL_SECS) {
            Some(raw) => parse_secs(vars::SESSION_TTL_SECS, &raw)?,
            None => defaults.session_ttl,
        };

        Ok(Self {
            api_key: non_empty(vars::API_KEY),
            api_base: non_empty(vars::API_BASE).unwrap_or(defaults.api_base),
            model: non_empty(vars::MODEL).unwrap_or(defaults.model),
            host: non_empty(vars::HOST).unwrap_or(defaults.host),
            port,
            remote_timeout,
            session_ttl,
        })
    }

    /// `host:port` socket address string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_secs(name: &'static str, raw: &str) -> Result<Duration, SettingsError> {
    let secs = raw.trim().parse::<u64>().map_err(|e| SettingsError::InvalidValue {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    if secs == 0 {
        return Err(SettingsError::InvalidValue {
            name,
            value: raw.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.port, 10000);
        assert_eq!(settings.model, "gpt-4o-mini");
        assert!(settings.api_key.is_none());
        assert_eq!(settings.remote_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_reads_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("RELAY_HOST", "0.0.0.0"),
            ("RELAY_PORT", "11000"),
            ("RELAY_SESSION_TTL_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.bind_address(), "0.0.0.0:11000");
        assert_eq!(settings.session_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_port_is_error() {
        let err = Settings::from_lookup(lookup_from(&[("RELAY_PORT", "eleven")])).unwrap_err();
        assert!(err.to_string().contains("RELAY_PORT"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Settings::from_lookup(lookup_from(&[("RELAY_REMOTE_TIMEOUT_SECS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_values_fall_back() {
        let settings = Settings::from_lookup(lookup_from(&[("RELAY_MODEL", "   ")])).unwrap();
        assert_eq!(settings.model, "gpt-4o-mini");
    }
}
