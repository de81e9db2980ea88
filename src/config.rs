//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a
//! type-safe struct, then `validate` refuses to boot with weak secrets.

use std::time::Duration;

use serde::Deserialize;

/// Shortest accepted JWT verification key.
const MIN_SECRET_KEY_LEN: usize = 32;

/// Shortest accepted webhook signing secret.
const MIN_WEBHOOK_SECRET_LEN: usize = 24;

/// Placeholder values shipped in sample env files.
const WEAK_SECRETS: &[&str] = &[
    "change_me",
    "change_me_docker",
    "__set_strong_secret_key__",
    "__set_me_strong_secret__",
    "test-secret",
];

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `SECRET_KEY` (required): HS256 key for caller tokens
/// - `PAYMENT_WEBHOOK_SECRET` (required): HMAC key for provider webhooks
/// - `DEFAULT_CURRENCY` (optional): defaults to `KZT`
/// - `GATEWAY_TIMEOUT_MS` (optional): provider call bound, defaults to 5000
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    pub secret_key: String,

    pub payment_webhook_secret: String,

    #[serde(default = "default_currency")]
    pub default_currency: String,

    #[serde(default = "default_gateway_timeout_ms")]
    pub gateway_timeout_ms: u64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_currency() -> String {
    "KZT".to_string()
}

fn default_gateway_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be at least {min} characters")]
    TooShort { name: &'static str, min: usize },

    #[error("{0} uses a placeholder value; set a strong secret")]
    WeakSecret(&'static str),

    #[error("DEFAULT_CURRENCY must be a three-letter ISO 4217 code")]
    InvalidCurrency,

    #[error("GATEWAY_TIMEOUT_MS must be greater than zero")]
    InvalidTimeout,
}

fn check_secret(name: &'static str, value: &str, min: usize) -> Result<(), ConfigError> {
    let value = value.trim();
    if WEAK_SECRETS.contains(&value) {
        return Err(ConfigError::WeakSecret(name));
    }
    if value.chars().count() < min {
        return Err(ConfigError::TooShort { name, min });
    }
    Ok(())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Does nothing if there is no .env file
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Reject configurations that must not reach production.
    ///
    /// # Errors
    ///
    /// - `WeakSecret`: a secret is one of the sample placeholders
    /// - `TooShort`: `SECRET_KEY` under 32 or `PAYMENT_WEBHOOK_SECRET` under 24 characters
    /// - `InvalidCurrency` / `InvalidTimeout`: malformed optional settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_secret("SECRET_KEY", &self.secret_key, MIN_SECRET_KEY_LEN)?;
        check_secret(
            "PAYMENT_WEBHOOK_SECRET",
            &self.payment_webhook_secret,
            MIN_WEBHOOK_SECRET_LEN,
        )?;

        let currency = self.default_currency.trim();
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidCurrency);
        }

        if self.gateway_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(())
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/shop".to_string(),
            server_port: default_port(),
            database_max_connections: default_max_connections(),
            secret_key: "k".repeat(MIN_SECRET_KEY_LEN),
            payment_webhook_secret: "w".repeat(MIN_WEBHOOK_SECRET_LEN),
            default_currency: default_currency(),
            gateway_timeout_ms: default_gateway_timeout_ms(),
        }
    }

    #[test]
    fn strong_config_is_valid() {
        assert_eq!(config().validate(), Ok(()));
    }

    #[test]
    fn placeholder_secrets_are_rejected() {
        let mut cfg = config();
        cfg.secret_key = "change_me".to_string();
        assert_eq!(cfg.validate(), Err(ConfigError::WeakSecret("SECRET_KEY")));

        let mut cfg = config();
        cfg.payment_webhook_secret = "__set_me_strong_secret__".to_string();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::WeakSecret("PAYMENT_WEBHOOK_SECRET"))
        );
    }

    #[test]
    fn short_secrets_are_rejected() {
        let mut cfg = config();
        cfg.secret_key = "k".repeat(MIN_SECRET_KEY_LEN - 1);
        assert!(matches!(cfg.validate(), Err(ConfigError::TooShort { name: "SECRET_KEY", .. })));

        let mut cfg = config();
        cfg.payment_webhook_secret = String::new();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooShort { name: "PAYMENT_WEBHOOK_SECRET", .. })
        ));
    }

    #[test]
    fn malformed_currency_and_timeout_are_rejected() {
        let mut cfg = config();
        cfg.default_currency = "TENGE".to_string();
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidCurrency));

        let mut cfg = config();
        cfg.gateway_timeout_ms = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidTimeout));
    }

    #[test]
    fn env_vars_deserialize_with_defaults() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://db/shop".to_string()),
            ("SECRET_KEY".to_string(), "s".repeat(40)),
            ("PAYMENT_WEBHOOK_SECRET".to_string(), "w".repeat(30)),
        ];

        let cfg: Config = envy::from_iter(vars).unwrap();

        assert_eq!(cfg.server_port, 3000);
        assert_eq!(cfg.database_max_connections, 5);
        assert_eq!(cfg.default_currency, "KZT");
        assert_eq!(cfg.gateway_timeout(), Duration::from_millis(5000));
    }
}
