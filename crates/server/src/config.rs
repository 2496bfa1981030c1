//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Databases
//! - `DATABASE_URL` - Tickets/users database (default: `sqlite://tickets.db`)
//! - `CATALOG_DATABASE_URL` - Catalog database (default: `sqlite://belgrano_ahorro.db`).
//!   May point at the same file as `DATABASE_URL`.
//!
//! ## Server
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 5000)
//! - `BASE_URL` - Public URL, decides whether cookies are `Secure`
//! - `APP_ENV` - `development` (default) or `production`
//!
//! ## Belgrano Ahorro API
//! - `BELGRANO_AHORRO_URL` - Base URL (default: <http://localhost:5000>)
//! - `BELGRANO_AHORRO_API_PREFIX` - Path prefix (default: `/api/v1`)
//! - `BELGRANO_AHORRO_API_KEY` - Shared API key. Required in production.
//!   Also the key expected on `X-API-Key` by the ticket ingestion endpoint.
//! - `BELGRANO_AHORRO_TIMEOUT` - Request timeout in seconds (default: 30)
//!
//! ## `DevOps` panel
//! - `DEVOPS_USERNAME` - Panel user (default: `devops`)
//! - `DEVOPS_PASSWORD` - Panel password. Required in production.
//!
//! ## Uploads
//! - `UPLOAD_FOLDER` - Root directory for catalog images (default: `uploads`)
//! - `MAX_UPLOAD_BYTES` - Multipart body limit (default: 16 MiB)
//!
//! ## Optional
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//! - `LOG_FORMAT` - `json` for structured logs

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const MIN_SECRET_LENGTH: usize = 12;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Development-only fallbacks. Never accepted when `APP_ENV=production`.
const DEV_API_KEY: &str = "belgrano-tickets-dev-key";
const DEV_DEVOPS_PASSWORD: &str = "devops123";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "default",
    "dev-key",
    "123",
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

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" | "test" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::InvalidEnvVar(
                "APP_ENV".to_string(),
                format!("unknown environment '{other}'"),
            )),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Tickets/users/sessions database URL
    pub database_url: SecretString,
    /// Catalog database URL
    pub catalog_database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Deployment environment
    pub environment: Environment,
    /// Belgrano Ahorro API client configuration
    pub ahorro: AhorroConfig,
    /// `DevOps` panel credentials
    pub devops: DevopsConfig,
    /// Image upload settings
    pub uploads: UploadConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Belgrano Ahorro API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct AhorroConfig {
    /// Base URL of the Belgrano Ahorro service
    pub base_url: String,
    /// Path prefix prepended to every endpoint (e.g. `/api/v1`)
    pub api_prefix: String,
    /// Shared API key (outbound requests and inbound ticket ingestion)
    pub api_key: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for AhorroConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AhorroConfig")
            .field("base_url", &self.base_url)
            .field("api_prefix", &self.api_prefix)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// `DevOps` panel credentials.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct DevopsConfig {
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for DevopsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevopsConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Image upload settings.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Root directory; files land in `<folder>/<entity_type>/`
    pub folder: PathBuf,
    /// Maximum accepted multipart body size
    pub max_bytes: usize,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed, or if a production
    /// deployment is missing a secret or uses a weak one.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let environment = Environment::parse(&env.or_default("APP_ENV", "development"))?;
        let production = environment == Environment::Production;

        let database_url = SecretString::from(env.or_default("DATABASE_URL", "sqlite://tickets.db"));
        let catalog_database_url = SecretString::from(
            env.or_default("CATALOG_DATABASE_URL", "sqlite://belgrano_ahorro.db"),
        );

        let host = env
            .or_default("HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = env.parsed("PORT", 5000_u16)?;
        let base_url = env
            .optional("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        let ahorro = AhorroConfig {
            base_url: env
                .or_default("BELGRANO_AHORRO_URL", "http://localhost:5000")
                .trim_end_matches('/')
                .to_string(),
            api_prefix: normalize_prefix(&env.or_default("BELGRANO_AHORRO_API_PREFIX", "/api/v1")),
            api_key: env.secret("BELGRANO_AHORRO_API_KEY", production, DEV_API_KEY)?,
            timeout: Duration::from_secs(env.parsed("BELGRANO_AHORRO_TIMEOUT", 30_u64)?),
        };

        let devops = DevopsConfig {
            username: env.or_default("DEVOPS_USERNAME", "devops"),
            password: env.secret("DEVOPS_PASSWORD", production, DEV_DEVOPS_PASSWORD)?,
        };

        let uploads = UploadConfig {
            folder: PathBuf::from(env.or_default("UPLOAD_FOLDER", "uploads")),
            max_bytes: env.parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        };

        let sentry_sample_rate = env
            .optional("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = env
            .optional("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            catalog_database_url,
            host,
            port,
            base_url,
            environment,
            ahorro,
            devops,
            uploads,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the deployment is production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Non-fatal problems with a production deployment.
    ///
    /// Empty outside production.
    #[must_use]
    pub fn production_warnings(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.is_production() {
            return issues;
        }
        if !self.base_url.starts_with("https://") {
            issues.push("BASE_URL is not https; session cookies will not be Secure".to_string());
        }
        if self.ahorro.base_url.contains("localhost") || self.ahorro.base_url.contains("127.0.0.1")
        {
            issues.push("BELGRANO_AHORRO_URL points at a local address".to_string());
        }
        if self.database_url.expose_secret().contains(":memory:") {
            issues.push("DATABASE_URL is an in-memory database; data will not persist".to_string());
        }
        issues
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Borrowed key lookup with the usual required/optional/default helpers.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable. Empty strings count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Load a secret. Production requires it and checks its strength;
    /// development falls back to `dev_default`.
    fn secret(
        &self,
        key: &str,
        production: bool,
        dev_default: &str,
    ) -> Result<SecretString, ConfigError> {
        match self.optional(key) {
            Some(value) => {
                if production {
                    validate_secret_strength(&value, key)?;
                }
                Ok(SecretString::from(value))
            }
            None if production => Err(ConfigError::MissingEnvVar(key.to_string())),
            None => Ok(SecretString::from(dev_default.to_string())),
        }
    }
}

/// Ensure the prefix starts with `/` and has no trailing slash.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is long enough, not a placeholder, and has
/// sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.chars().count() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("must be at least {MIN_SECRET_LENGTH} characters"),
        ));
    }

    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(validate_secret_strength("your-api-key-here", "K").is_err());
        assert!(validate_secret_strength("admin123admin123", "K").is_err());
        assert!(validate_secret_strength("short", "K").is_err());
        assert!(validate_secret_strength("zzzzzzzzzzzzzzzzzzzz", "K").is_err());
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "K").is_ok());
    }

    #[test]
    fn test_development_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, 5000);
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.ahorro.api_prefix, "/api/v1");
        assert_eq!(config.ahorro.timeout, Duration::from_secs(30));
        assert_eq!(config.devops.username, "devops");
        assert_eq!(config.ahorro.api_key.expose_secret(), DEV_API_KEY);
        assert_eq!(config.uploads.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.production_warnings().is_empty());
    }

    #[test]
    fn test_production_requires_secrets() {
        let result = AppConfig::from_lookup(lookup_from(&[("APP_ENV", "production")]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_production_rejects_placeholder_secret() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("APP_ENV", "production"),
            ("BELGRANO_AHORRO_API_KEY", "changeme-please"),
            ("DEVOPS_PASSWORD", "aB3$xY9!mK2@nL5#pQ7&"),
        ]));
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_production_warnings() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("APP_ENV", "production"),
            ("BELGRANO_AHORRO_API_KEY", "k9$Xq2!vL7#mB4@zR8&w"),
            ("DEVOPS_PASSWORD", "aB3$xY9!mK2@nL5#pQ7&"),
        ]))
        .unwrap();
        let warnings = config.production_warnings();
        assert!(warnings.iter().any(|w| w.contains("BASE_URL")));
        assert!(warnings.iter().any(|w| w.contains("BELGRANO_AHORRO_URL")));
    }

    #[test]
    fn test_invalid_port() {
        let result = AppConfig::from_lookup(lookup_from(&[("PORT", "cinco mil")]));
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(key, _)) if key == "PORT"));
    }

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(normalize_prefix("api/"), "/api");
        assert_eq!(normalize_prefix("/api/v1/"), "/api/v1");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn test_socket_addr() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("HOST", "127.0.0.1"), ("PORT", "8080")]))
                .unwrap();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("BELGRANO_AHORRO_API_KEY", "super-private-ahorro-key"),
            ("DEVOPS_PASSWORD", "super-private-devops-pass"),
        ]))
        .unwrap();
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-private-ahorro-key"));
        assert!(!debug_output.contains("super-private-devops-pass"));
    }
}
