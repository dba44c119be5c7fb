//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use sitechat_core::SiteProfile;
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
    /// Base URL of the remote RAG node, e.g. `https://ragnode.example.com`.
    pub node_url: String,
    /// Shared secret the admin UI presents in the `x-admin-token` header.
    pub admin_token: String,
    /// The public-facing base URL of this service; the remote verifier must
    /// be able to reach `{public_base_url}/challenge-token`.
    pub public_base_url: String,
    /// Identity facts sent during site registration.
    pub site: SiteProfile,
    /// Whether the commerce extension is installed for this site.
    pub commerce_enabled: bool,
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

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Relay Settings ---
        let node_url = std::env::var("RAG_NODE_URL")
            .map_err(|_| ConfigError::MissingVar("RAG_NODE_URL".to_string()))?;
        let admin_token = std::env::var("ADMIN_TOKEN")
            .map_err(|_| ConfigError::MissingVar("ADMIN_TOKEN".to_string()))?;

        let site_url = std::env::var("SITE_URL")
            .map_err(|_| ConfigError::MissingVar("SITE_URL".to_string()))?;
        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| site_url.clone());

        let site = SiteProfile {
            site_name: std::env::var("SITE_NAME").unwrap_or_else(|_| "My Site".to_string()),
            site_url,
            owner_email: std::env::var("OWNER_EMAIL")
                .map_err(|_| ConfigError::MissingVar("OWNER_EMAIL".to_string()))?,
            owner_name: std::env::var("OWNER_NAME")
                .unwrap_or_else(|_| "Site Admin".to_string()),
        };

        let commerce_enabled = match std::env::var("COMMERCE_ENABLED") {
            Ok(value) => match value.as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                other => {
                    return Err(ConfigError::InvalidValue(
                        "COMMERCE_ENABLED".to_string(),
                        format!("'{}' is not a boolean", other),
                    ))
                }
            },
            Err(_) => false,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            node_url,
            admin_token,
            public_base_url,
            site,
            commerce_enabled,
        })
    }

    /// The public URL the remote verifier fetches during registration.
    pub fn challenge_verification_url(&self) -> String {
        format!(
            "{}/challenge-token",
            self.public_base_url.trim_end_matches('/')
        )
    }
}
