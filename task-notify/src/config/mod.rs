//! Process configuration from environment variables.
//!
//! Both binaries read the same variables (optionally from a `.env` file loaded
//! by `dotenvy`). Unset variables fall back to defaults; set but invalid ones
//! are a [`crate::Error::Configuration`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::database::MaintenanceConfig;
use crate::resilience::{BreakerConfig, RetryPolicy};
use crate::webhook::HttpTransportConfig;
use crate::{Error, Result};

/// Default notification service port.
pub const DEFAULT_NOTIFY_PORT: u16 = 3001;

/// Default task API port.
pub const DEFAULT_TASK_API_PORT: u16 = 8000;

const DEFAULT_DATABASE_URL: &str = "sqlite:task-notify.db?mode=rwc";
const DEFAULT_WEBHOOK_URL: &str = "http://127.0.0.1:3001/notify";

/// Deployment environment (`APP_ENV`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Development,
    Local,
    Testing,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Outbound webhook settings.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub secret: String,
    pub transport: HttpTransportConfig,
    pub retry: RetryPolicy,
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: String,
    pub log_dir: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub webhook: WebhookSettings,
    pub breaker: BreakerConfig,
    pub idempotency_ttl: Duration,
    pub notification_ttl_days: u32,
    pub maintenance: MaintenanceConfig,
}

impl AppConfig {
    /// Load from the process environment. `default_port` differs per binary.
    pub fn from_env(default_port: u16) -> Result<Self> {
        Self::from_lookup(default_port, |key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(default_port: u16, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let secret = vars
            .string("WEBHOOK_SECRET")
            .ok_or_else(|| Error::config("WEBHOOK_SECRET must be set to a non-empty value"))?;

        let breaker_defaults = BreakerConfig::default();
        let retry_defaults = RetryPolicy::default();

        let transport = HttpTransportConfig {
            url: vars
                .string("WEBHOOK_URL")
                .unwrap_or_else(|| DEFAULT_WEBHOOK_URL.to_string()),
            timeout: Duration::from_secs(vars.parse_or("WEBHOOK_TIMEOUT_SECS", 30u64)?),
            connect_retries: vars.parse_or("WEBHOOK_CONNECT_RETRIES", 1u32)?,
            connect_retry_delay: Duration::from_millis(
                vars.parse_or("WEBHOOK_CONNECT_RETRY_DELAY_MS", 500u64)?,
            ),
        };
        if !transport.url.starts_with("http://") && !transport.url.starts_with("https://") {
            return Err(Error::config(format!(
                "WEBHOOK_URL must be an http(s) URL, got '{}'",
                transport.url
            )));
        }

        let max_attempts = vars.parse_or("WEBHOOK_MAX_ATTEMPTS", retry_defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(Error::config("WEBHOOK_MAX_ATTEMPTS must be at least 1"));
        }
        let backoff = match vars.string("WEBHOOK_BACKOFF_SECS") {
            Some(list) => parse_backoff(&list)?,
            None => retry_defaults.backoff,
        };

        let breaker = BreakerConfig {
            failure_threshold: vars.positive(
                "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                breaker_defaults.failure_threshold,
            )?,
            success_threshold: vars.positive(
                "CIRCUIT_BREAKER_SUCCESS_THRESHOLD",
                breaker_defaults.success_threshold,
            )?,
            timeout: Duration::from_secs(vars.parse_or(
                "CIRCUIT_BREAKER_TIMEOUT_SECS",
                breaker_defaults.timeout.as_secs(),
            )?),
            state_ttl: Duration::from_secs(vars.parse_or(
                "CIRCUIT_BREAKER_STATE_TTL_SECS",
                breaker_defaults.state_ttl.as_secs(),
            )?),
        };

        Ok(Self {
            environment: vars.parse_or("APP_ENV", Environment::Production)?,
            database_url: vars
                .string("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            log_dir: vars
                .string("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            bind_address: vars
                .string("API_BIND_ADDRESS")
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: vars.parse_or("API_PORT", default_port)?,
            webhook: WebhookSettings {
                secret,
                transport,
                retry: RetryPolicy::new(max_attempts, backoff),
            },
            breaker,
            idempotency_ttl: Duration::from_secs(vars.positive("IDEMPOTENCY_TTL_SECS", 600u64)?),
            notification_ttl_days: vars.positive("NOTIFICATION_TTL_DAYS", 30u32)?,
            maintenance: MaintenanceConfig {
                interval: Duration::from_secs(
                    vars.positive("MAINTENANCE_INTERVAL_SECS", 60 * 60u64)?,
                ),
            },
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed, non-empty value.
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::config(format!("invalid {key} '{raw}': {e}"))),
        }
    }

    fn positive<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: std::fmt::Display,
    {
        let value = self.parse_or(key, default)?;
        if value <= T::default() {
            return Err(Error::config(format!("{key} must be greater than zero")));
        }
        Ok(value)
    }
}

/// Parse a comma separated list of seconds, e.g. `10,30,60`.
fn parse_backoff(list: &str) -> Result<Vec<Duration>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| Error::config(format!("invalid WEBHOOK_BACKOFF_SECS entry '{s}': {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(DEFAULT_NOTIFY_PORT, |key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("WEBHOOK_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.port, DEFAULT_NOTIFY_PORT);
        assert_eq!(config.webhook.secret, "s3cret");
        assert_eq!(config.webhook.transport.url, DEFAULT_WEBHOOK_URL);
        assert_eq!(config.webhook.transport.timeout, Duration::from_secs(30));
        assert_eq!(config.webhook.transport.connect_retries, 1);
        assert_eq!(config.webhook.retry, RetryPolicy::default());
        assert_eq!(config.breaker, BreakerConfig::default());
        assert_eq!(config.idempotency_ttl, Duration::from_secs(600));
        assert_eq!(config.notification_ttl_days, 30);
    }

    #[test]
    fn test_secret_is_required() {
        assert!(matches!(load(&[]), Err(Error::Configuration(_))));
        assert!(matches!(
            load(&[("WEBHOOK_SECRET", "   ")]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("WEBHOOK_SECRET", "s"),
            ("APP_ENV", "Local"),
            ("API_PORT", "9000"),
            ("WEBHOOK_MAX_ATTEMPTS", "3"),
            ("WEBHOOK_BACKOFF_SECS", "1, 2,5"),
            ("CIRCUIT_BREAKER_FAILURE_THRESHOLD", "3"),
            ("CIRCUIT_BREAKER_TIMEOUT_SECS", "10"),
        ])
        .unwrap();
        assert_eq!(config.environment, Environment::Local);
        assert!(!config.environment.is_production());
        assert_eq!(config.port, 9000);
        assert_eq!(config.webhook.retry.max_attempts, 3);
        assert_eq!(
            config.webhook.retry.backoff,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5)
            ]
        );
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("API_PORT", "http"),
            ("APP_ENV", "moon"),
            ("WEBHOOK_BACKOFF_SECS", "10,soon"),
            ("WEBHOOK_MAX_ATTEMPTS", "0"),
            ("CIRCUIT_BREAKER_SUCCESS_THRESHOLD", "0"),
            ("WEBHOOK_URL", "ftp://example.com"),
        ] {
            let result = load(&[("WEBHOOK_SECRET", "s"), (key, value)]);
            assert!(
                matches!(result, Err(Error::Configuration(_))),
                "{key}={value} should be rejected"
            );
        }
    }
}
