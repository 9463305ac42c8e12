//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Base URL of the identity server (e.g. `https://project.supabase.co`).
    pub identity_url: String,
    pub identity_anon_key: String,
    /// Public origin of this service, used for OAuth redirects and CORS.
    pub public_url: String,
    pub oauth_provider: String,
    /// Name of the cookie carrying the primary access token.
    pub session_cookie: String,
    pub environment: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required =
            |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Load Server and Database Settings ---
        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Identity Server Settings ---
        let identity_url = required("IDENTITY_URL")?.trim_end_matches('/').to_string();
        let identity_anon_key = required("IDENTITY_ANON_KEY")?;
        let public_url = or_default("PUBLIC_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();
        let oauth_provider = or_default("OAUTH_PROVIDER", "google");

        let session_cookie = or_default("SESSION_COOKIE", "session");
        if session_cookie.is_empty() || session_cookie.contains([';', '=', ' ']) {
            return Err(ConfigError::InvalidValue(
                "SESSION_COOKIE".to_string(),
                format!("'{}' is not a valid cookie name", session_cookie),
            ));
        }

        let environment = or_default("APP_ENV", "development");

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            identity_url,
            identity_anon_key,
            public_url,
            oauth_provider,
            session_cookie,
            environment,
        })
    }
}
