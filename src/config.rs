//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

use crate::federation::SignatureAlgorithm;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub federation: FederationConfig,
    pub accounts: AccountsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public host, optionally with port (e.g., "social.example.com")
    ///
    /// This is the federation identity of the server: it appears in every
    /// actor URL and decides whether an address is local.
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://social.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// How a locally initiated follow of a remote actor is recorded.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FollowMode {
    /// Record Pending before delivery; the remote Accept confirms it.
    #[default]
    Pending,
    /// Legacy behaviour: record Following as soon as delivery succeeds.
    Optimistic,
}

/// Federation client and signer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Sent as User-Agent (and signed) on every outbound request
    pub software_name: String,
    #[serde(default)]
    pub follow_mode: FollowMode,
    /// Signature algorithms in order of preference
    pub signature_algorithms: Vec<SignatureAlgorithm>,
    /// Validity window of outbound signatures
    pub signature_expiry_seconds: u64,
    /// Deadline for a single outbound request
    pub request_timeout_seconds: u64,
    /// Scheme used to reach remote WebFinger endpoints ("https" in production)
    pub remote_scheme: String,
}

/// Account creation parameters
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    /// RSA modulus size for new account keys
    pub key_bits: usize,
    /// bcrypt cost factor for password hashes
    pub password_cost: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (ACTORHUB__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost:8080")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/actorhub.db")?
            .set_default("federation.software_name", "actorhub/0.1.0")?
            .set_default("federation.follow_mode", "pending")?
            .set_default(
                "federation.signature_algorithms",
                vec!["rsa-sha256", "rsa-sha512"],
            )?
            .set_default("federation.signature_expiry_seconds", 30)?
            .set_default("federation.request_timeout_seconds", 30)?
            .set_default("federation.remote_scheme", "https")?
            .set_default(
                "accounts.key_bits",
                crate::federation::DEFAULT_KEY_BITS as u64,
            )?
            .set_default("accounts.password_cost", bcrypt::DEFAULT_COST)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (ACTORHUB__*)
            .add_source(
                Environment::with_prefix("ACTORHUB")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("federation.signature_algorithms")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;
        use crate::federation::MAX_SIGNATURE_EXPIRY_SECONDS;

        const MIN_KEY_BITS: usize = 1024;

        if self.federation.signature_algorithms.is_empty() {
            return Err(AppError::Config(
                "federation.signature_algorithms must list at least one algorithm".to_string(),
            ));
        }

        if self.federation.signature_expiry_seconds == 0 {
            return Err(AppError::Config(
                "federation.signature_expiry_seconds must be greater than 0".to_string(),
            ));
        }

        if self.federation.signature_expiry_seconds > MAX_SIGNATURE_EXPIRY_SECONDS {
            return Err(AppError::Config(format!(
                "federation.signature_expiry_seconds must be at most {}",
                MAX_SIGNATURE_EXPIRY_SECONDS
            )));
        }

        if self.accounts.key_bits < MIN_KEY_BITS {
            return Err(AppError::Config(format!(
                "accounts.key_bits must be at least {}",
                MIN_KEY_BITS
            )));
        }

        if !(4..=31).contains(&self.accounts.password_cost) {
            return Err(AppError::Config(
                "accounts.password_cost must be between 4 and 31".to_string(),
            ));
        }

        if is_local_server_domain(&self.server.domain) {
            if !self.server.protocol.eq_ignore_ascii_case("https") {
                tracing::warn!(
                    domain = %self.server.domain,
                    protocol = %self.server.protocol,
                    "Serving federation URLs over plain HTTP for local development"
                );
            }
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
