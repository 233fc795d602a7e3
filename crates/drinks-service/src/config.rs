//! Drinks Service configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! redacted in Debug output.

use common::jwt::MAX_LEEWAY;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address (the port the web frontend expects).
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";

/// Default SQLite database location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:database.db?mode=rwc";

/// Default JWKS cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default timeout for a single JWKS fetch in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Maximum timeout for a single JWKS fetch in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Default minimum interval between forced JWKS refreshes on unknown `kid`.
pub const DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECONDS: u64 = 30;

/// Path of the key set document under the identity provider domain.
pub const JWKS_WELL_KNOWN_PATH: &str = "/.well-known/jwks.json";

/// Drinks Service configuration.
#[derive(Clone)]
pub struct Config {
    /// Identity provider domain (e.g., "new-coffee-shop.auth0.com").
    pub auth_domain: String,

    /// Expected `aud` claim.
    pub api_audience: String,

    /// Expected `iss` claim (default: `https://{auth_domain}/`).
    pub auth_issuer: String,

    /// Key set URL (default: `https://{auth_domain}/.well-known/jwks.json`).
    pub jwks_url: String,

    /// JWKS cache TTL in seconds. Zero disables caching.
    pub jwks_cache_ttl_seconds: u64,

    /// Timeout for a single JWKS fetch in seconds.
    pub jwks_fetch_timeout_seconds: u64,

    /// Minimum seconds between forced refreshes triggered by an unknown `kid`.
    pub jwks_min_refresh_interval_seconds: u64,

    /// Leeway applied to `exp` validation in seconds.
    pub jwt_clock_skew_seconds: u64,

    /// SQLite connection URL.
    pub database_url: String,

    /// Drop and recreate the drinks table on start, seeding a default drink.
    pub database_reset: bool,

    /// Server bind address.
    pub bind_address: String,

    /// Graceful shutdown drain period in seconds.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("auth_domain", &self.auth_domain)
            .field("api_audience", &self.api_audience)
            .field("auth_issuer", &self.auth_issuer)
            .field("jwks_url", &self.jwks_url)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field(
                "jwks_fetch_timeout_seconds",
                &self.jwks_fetch_timeout_seconds,
            )
            .field(
                "jwks_min_refresh_interval_seconds",
                &self.jwks_min_refresh_interval_seconds,
            )
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("database_url", &"[REDACTED]")
            .field("database_reset", &self.database_reset)
            .field("bind_address", &self.bind_address)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid identity provider domain: {0}")]
    InvalidAuthDomain(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_domain = required(vars, "AUTH0_DOMAIN")?
            .trim()
            .trim_end_matches('/')
            .to_string();
        if auth_domain.is_empty() || auth_domain.contains("://") || auth_domain.contains('/') {
            return Err(ConfigError::InvalidAuthDomain(format!(
                "AUTH0_DOMAIN must be a bare host name, got '{}'",
                auth_domain
            )));
        }

        let api_audience = required(vars, "API_AUDIENCE")?;

        let auth_issuer = vars
            .get("AUTH_ISSUER")
            .cloned()
            .unwrap_or_else(|| format!("https://{}/", auth_domain));

        let jwks_url = vars
            .get("JWKS_URL")
            .cloned()
            .unwrap_or_else(|| format!("https://{}{}", auth_domain, JWKS_WELL_KNOWN_PATH));

        let jwks_cache_ttl_seconds = parse_u64(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
        )?;

        let jwks_fetch_timeout_seconds = parse_u64(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
        )?;
        if jwks_fetch_timeout_seconds == 0 {
            return Err(ConfigError::InvalidJwks(
                "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }
        if jwks_fetch_timeout_seconds > MAX_JWKS_FETCH_TIMEOUT_SECONDS {
            return Err(ConfigError::InvalidJwks(format!(
                "JWKS_FETCH_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                MAX_JWKS_FETCH_TIMEOUT_SECONDS, jwks_fetch_timeout_seconds
            )));
        }

        let jwks_min_refresh_interval_seconds = parse_u64(
            vars,
            "JWKS_MIN_REFRESH_INTERVAL_SECONDS",
            DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECONDS,
        )?;

        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_LEEWAY.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_LEEWAY.as_secs(),
                    value
                )));
            }

            value
        } else {
            0
        };

        let database_url = vars
            .get("DATABASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let database_reset = match vars.get("DATABASE_RESET").map(|v| v.trim()) {
            None | Some("") => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(v) => {
                return Err(ConfigError::InvalidValue(
                    "DATABASE_RESET".to_string(),
                    format!("expected true/false, got '{}'", v),
                ))
            }
        };

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let drain_seconds = parse_u64(vars, "DRAIN_SECONDS", 0)?;

        Ok(Config {
            auth_domain,
            api_audience,
            auth_issuer,
            jwks_url,
            jwks_cache_ttl_seconds,
            jwks_fetch_timeout_seconds,
            jwks_min_refresh_interval_seconds,
            jwt_clock_skew_seconds,
            database_url,
            database_reset,
            bind_address,
            drain_seconds,
        })
    }

    /// JWKS cache TTL as a Duration.
    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }

    /// JWKS fetch timeout as a Duration.
    pub fn jwks_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_seconds)
    }

    /// Minimum interval between forced JWKS refreshes as a Duration.
    pub fn jwks_min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.jwks_min_refresh_interval_seconds)
    }

    /// Leeway for `exp` validation as a Duration.
    pub fn jwt_leeway(&self) -> Duration {
        Duration::from_secs(self.jwt_clock_skew_seconds)
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_u64(vars: &HashMap<String, String>, name: &str, default: u64) -> Result<u64, ConfigError> {
    match vars.get(name) {
        Some(value_str) => value_str.trim().parse().map_err(|e| {
            ConfigError::InvalidValue(
                name.to_string(),
                format!(
                    "must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ),
            )
        }),
        None => Ok(default),
    }
}
