//! Environment-driven pipeline configuration.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::jobs::RetryPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings of the AI endpoint. Absent means every handler runs its fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub generation_timeout: Duration,
    pub suggestion_timeout: Duration,
    pub provider_timeout: Duration,
    pub mail_timeout: Duration,
    pub retry: RetryPolicy,
    pub poll_interval: Duration,
    pub max_concurrent: usize,
    /// How long a claimed job may run before the queue hands it out again.
    pub visibility_timeout: Duration,
    pub public_base_domain: String,
    pub ai: Option<AiSettings>,
    pub database_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(120),
            suggestion_timeout: Duration::from_secs(12),
            provider_timeout: Duration::from_secs(12),
            mail_timeout: Duration::from_secs(12),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_millis(250),
            max_concurrent: 4,
            visibility_timeout: Duration::from_secs(300),
            public_base_domain: "folio.site".to_string(),
            ai: None,
            database_url: None,
        }
    }
}

impl PipelineConfig {
    /// Read `FOLIO_*` (and `DATABASE_URL`) from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys keep their defaults; set but
    /// malformed keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(secs) = parse(&get, "FOLIO_GENERATION_TIMEOUT_SECS")? {
            cfg.generation_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&get, "FOLIO_SUGGESTION_TIMEOUT_SECS")? {
            cfg.suggestion_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&get, "FOLIO_PROVIDER_TIMEOUT_SECS")? {
            cfg.provider_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&get, "FOLIO_MAIL_TIMEOUT_SECS")? {
            cfg.mail_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse(&get, "FOLIO_MAX_ATTEMPTS")? {
            cfg.retry.max_attempts = n;
        }
        if let Some(ms) = parse(&get, "FOLIO_RETRY_BASE_MS")? {
            cfg.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse(&get, "FOLIO_RETRY_MAX_MS")? {
            cfg.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse(&get, "FOLIO_POLL_INTERVAL_MS")? {
            cfg.poll_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parse::<usize>(&get, "FOLIO_MAX_CONCURRENT")? {
            if n == 0 {
                return Err(ConfigError::Invalid {
                    key: "FOLIO_MAX_CONCURRENT",
                    value: n.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            cfg.max_concurrent = n;
        }
        if let Some(secs) = parse(&get, "FOLIO_VISIBILITY_TIMEOUT_SECS")? {
            cfg.visibility_timeout = Duration::from_secs(secs);
        }
        if let Some(domain) = get("FOLIO_PUBLIC_BASE_DOMAIN") {
            cfg.public_base_domain = domain.trim().to_string();
        }
        if let Some(endpoint) = get("FOLIO_AI_ENDPOINT") {
            cfg.ai = Some(AiSettings {
                endpoint,
                api_key: get("FOLIO_AI_API_KEY").unwrap_or_default(),
                model: get("FOLIO_AI_MODEL"),
            });
        }
        cfg.database_url = get("DATABASE_URL");

        Ok(cfg)
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                value: raw,
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.generation_timeout, Duration::from_secs(120));
        assert_eq!(cfg.suggestion_timeout, Duration::from_secs(12));
        assert!(cfg.ai.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = PipelineConfig::from_lookup(lookup(&[
            ("FOLIO_MAX_ATTEMPTS", "7"),
            ("FOLIO_PUBLIC_BASE_DOMAIN", "example.dev"),
            ("FOLIO_AI_ENDPOINT", "http://localhost:9000/v1/messages"),
            ("FOLIO_AI_API_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(cfg.retry.max_attempts, 7);
        assert_eq!(cfg.public_base_domain, "example.dev");
        let ai = cfg.ai.unwrap();
        assert_eq!(ai.api_key, "secret");
        assert_eq!(ai.model, None);
    }

    #[test]
    fn malformed_number_is_an_error() {
        let err = PipelineConfig::from_lookup(lookup(&[("FOLIO_GENERATION_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "FOLIO_GENERATION_TIMEOUT_SECS", .. }));

        assert!(PipelineConfig::from_lookup(lookup(&[("FOLIO_MAX_CONCURRENT", "0")])).is_err());
    }
}
