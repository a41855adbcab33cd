//! # Settings
//!
//! Layered configuration: built-in defaults, then a `.env` file if present,
//! then process environment variables named `APP__<SECTION>__<KEY>`, e.g.
//! `APP__SERVER__PORT=8080` or `APP__AUTH__JWT_SECRET=...`.
//!
//! Secrets (`jwt_secret`, the metrics password, database and Redis URLs) are
//! held as [`SecretString`] and only exposed at the point of use.

use std::time::Duration;

use config::{Config, Environment, Map};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub auth: AuthSettings,
    pub basic: BasicAuthSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Free-form deployment name reported by the health endpoint.
    pub env: String,
    /// Base URL of the web client; activation links point at it.
    pub frontend_url: String,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: SecretString,
    pub max_connections: u32,
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub redis_url: Option<SecretString>,
    pub ttl_secs: u64,
    /// Upper bound on a single cache call, connection checkout included.
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitSettings {
    pub requests_per_window: u32,
    pub window_secs: u64,
    pub enabled: bool,
    /// Key callers by the first `X-Forwarded-For` hop. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub issuer: String,
    pub token_ttl_secs: u64,
    pub invitation_ttl_secs: u64,
}

/// Credentials guarding the operational endpoints. Without a password
/// `/metrics` is not served at all.
#[derive(Debug, Deserialize)]
pub struct BasicAuthSettings {
    pub user: String,
    pub pass: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    pub json: bool,
}

impl DatabaseSettings {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Settings {
    /// Reads `.env` (if any) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::Invalid(format!(".env: {e}"))),
        }
        Self::from_env(None)
    }

    /// `vars` replaces the process environment when given; used by tests.
    pub fn from_env(vars: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.env", "development")?
            .set_default("server.frontend_url", "http://localhost:5173")?
            .set_default("database.url", "sqlite://rusty_social.db")?
            .set_default("database.max_connections", 10)?
            .set_default("database.query_timeout_secs", 5)?
            .set_default("cache.backend", "memory")?
            .set_default("cache.ttl_secs", 60)?
            .set_default("cache.timeout_ms", 500)?
            .set_default("rate_limit.requests_per_window", 20)?
            .set_default("rate_limit.window_secs", 5)?
            .set_default("rate_limit.enabled", true)?
            .set_default("rate_limit.trust_forwarded_for", true)?
            .set_default("auth.issuer", "rusty-social")?
            .set_default("auth.token_ttl_secs", 60 * 60 * 24 * 3)?
            .set_default("auth.invitation_ttl_secs", 60 * 60 * 24 * 3)?
            .set_default("basic.user", "admin")?
            .set_default("log.json", false)?
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.requests_per_window == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.requests_per_window must be positive".into(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid("rate_limit.window_secs must be positive".into()));
        }
        if self.auth.jwt_secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be positive".into()));
        }
        if self.cache.timeout_ms == 0 {
            return Err(ConfigError::Invalid("cache.timeout_ms must be positive".into()));
        }
        if let Some(pass) = &self.basic.pass {
            if self.basic.user.trim().is_empty() || pass.expose_secret().is_empty() {
                return Err(ConfigError::Invalid(
                    "basic.user and basic.pass must not be empty".into(),
                ));
            }
        }
        if self.cache.backend == CacheBackend::Redis && self.cache.redis_url.is_none() {
            return Err(ConfigError::Invalid(
                "cache.redis_url is required for the redis backend".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_apply_once_a_secret_is_given() {
        let settings = Settings::from_env(vars(&[("APP__AUTH__JWT_SECRET", "s3cret")])).unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.cache.backend, CacheBackend::Memory);
        assert_eq!(settings.cache.ttl(), Duration::from_secs(60));
        assert_eq!(settings.rate_limit.requests_per_window, 20);
        assert!(settings.rate_limit.enabled);
        assert!(!settings.log.json);
        assert_eq!(settings.auth.jwt_secret.expose_secret(), "s3cret");
        assert_eq!(settings.cache.timeout(), Duration::from_millis(500));
        assert!(settings.rate_limit.trust_forwarded_for);
        assert_eq!(settings.basic.user, "admin");
        assert!(settings.basic.pass.is_none());
    }

    #[test]
    fn metrics_credentials_come_from_the_basic_section() {
        let settings = Settings::from_env(vars(&[
            ("APP__AUTH__JWT_SECRET", "s3cret"),
            ("APP__BASIC__USER", "ops"),
            ("APP__BASIC__PASS", "letmein"),
            ("APP__RATE_LIMIT__TRUST_FORWARDED_FOR", "false"),
        ]))
        .unwrap();

        assert_eq!(settings.basic.user, "ops");
        assert_eq!(
            settings.basic.pass.as_ref().map(|p| p.expose_secret().to_string()),
            Some("letmein".to_string())
        );
        assert!(!settings.rate_limit.trust_forwarded_for);
    }

    #[test]
    fn empty_metrics_password_is_rejected() {
        let result = Settings::from_env(vars(&[
            ("APP__AUTH__JWT_SECRET", "s3cret"),
            ("APP__BASIC__PASS", ""),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = Settings::from_env(vars(&[
            ("APP__AUTH__JWT_SECRET", "s3cret"),
            ("APP__SERVER__PORT", "9090"),
            ("APP__RATE_LIMIT__ENABLED", "false"),
            ("APP__RATE_LIMIT__WINDOW_SECS", "30"),
            ("APP__LOG__JSON", "true"),
        ]))
        .unwrap();

        assert_eq!(settings.server.bind_address(), "0.0.0.0:9090");
        assert!(!settings.rate_limit.enabled);
        assert_eq!(settings.rate_limit.window(), Duration::from_secs(30));
        assert!(settings.log.json);
    }

    #[test]
    fn missing_secret_fails_to_load() {
        assert!(matches!(
            Settings::from_env(vars(&[])),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn zero_window_is_rejected() {
        let result = Settings::from_env(vars(&[
            ("APP__AUTH__JWT_SECRET", "s3cret"),
            ("APP__RATE_LIMIT__WINDOW_SECS", "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn redis_backend_needs_a_url() {
        let result = Settings::from_env(vars(&[
            ("APP__AUTH__JWT_SECRET", "s3cret"),
            ("APP__CACHE__BACKEND", "redis"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
