//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PRYSM_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `PRYSM_BASE_URL` - Public URL the app is served from
//! - `PRYSM_SESSION_SECRET` - Session-credential signing secret (min 32 chars)
//! - `IDENTITY_API_KEY` - Identity provider API key
//!
//! ## Optional
//! - `PRYSM_HOST` - Bind address (default: 127.0.0.1)
//! - `PRYSM_PORT` - Listen port (default: 3000)
//! - `IDENTITY_API_BASE` - Identity provider REST base URL
//!   (default: <https://identitytoolkit.googleapis.com>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;

/// Blocklist of common placeholder patterns (case-insensitive).
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Prysm server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` connection URL (contains password).
    pub database_url: SecretString,
    /// IP address to bind the server to.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Public base URL for the app, without a trailing slash.
    pub base_url: String,
    /// Session-credential signing secret.
    pub session_secret: SecretString,
    /// Identity provider configuration.
    pub identity: IdentityProviderConfig,
    /// Sentry DSN for error tracking.
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag.
    pub sentry_environment: Option<String>,
}

/// Identity provider REST API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct IdentityProviderConfig {
    /// REST base URL, without a trailing slash.
    pub api_base: String,
    /// Project API key appended to every call.
    pub api_key: SecretString,
}

impl std::fmt::Debug for IdentityProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityProviderConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if the session secret fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("PRYSM_DATABASE_URL")?;
        let host = get_env_or_default("PRYSM_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("PRYSM_HOST".to_owned(), e.to_string()))?;
        let port = get_env_or_default("PRYSM_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PRYSM_PORT".to_owned(), e.to_string()))?;
        let base_url = get_required_env("PRYSM_BASE_URL")?
            .trim_end_matches('/')
            .to_owned();
        let session_secret = get_required_env("PRYSM_SESSION_SECRET").map(SecretString::from)?;
        validate_session_secret(&session_secret, "PRYSM_SESSION_SECRET")?;

        let identity = IdentityProviderConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            identity,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl IdentityProviderConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: get_env_or_default("IDENTITY_API_BASE", "https://identitytoolkit.googleapis.com")
                .trim_end_matches('/')
                .to_owned(),
            api_key: get_required_env("IDENTITY_API_KEY").map(SecretString::from)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_owned()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Validate that the session secret is long enough and not a placeholder.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }

    let lower = value.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_owned(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/prysm_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_owned(),
            session_secret: SecretString::from("kQ4vLx8nRm2pWj6tZc9bYf3hGd7sAu1e"),
            identity: IdentityProviderConfig {
                api_base: "https://identitytoolkit.googleapis.com".to_owned(),
                api_key: SecretString::from("test-api-key"),
            },
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_socket_addr() {
        let config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST").is_err());
    }

    #[test]
    fn test_session_secret_placeholder() {
        let secret = SecretString::from("changeme-changeme-changeme-changeme");
        assert!(validate_session_secret(&secret, "TEST").is_err());
    }

    #[test]
    fn test_session_secret_valid() {
        let secret = SecretString::from("kQ4vLx8nRm2pWj6tZc9bYf3hGd7sAu1e");
        assert!(validate_session_secret(&secret, "TEST").is_ok());
    }

    #[test]
    fn test_identity_config_debug_redacts_key() {
        let config = test_config();
        let debug_output = format!("{:?}", config.identity);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("test-api-key"));
    }
}
