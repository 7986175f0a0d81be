// ============================================================================
// Auth Service Configuration
// ============================================================================

use anyhow::{Context, Result};

use crate::constants::AUTH_SERVICE_DEV_PORT;
use crate::{required_var, validate_database_url, Environment};

/// Auth backend service configuration
#[derive(Clone, Debug)]
pub struct AuthServiceConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    /// Handed to the auth provider; validated present at startup
    pub database_url: String,
    /// Base URL of the authentication provider this service fronts
    pub provider_url: String,
    pub rust_log: String,
}

impl AuthServiceConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = required_var("DATABASE_URL")?;
        validate_database_url(&database_url)?;

        let port = match std::env::var("AUTH_SERVICE_PORT") {
            Ok(raw) => raw
                .parse()
                .context("AUTH_SERVICE_PORT must be a valid port number")?,
            Err(_) => AUTH_SERVICE_DEV_PORT,
        };

        Ok(Self {
            environment: Environment::from_env(),
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            database_url,
            provider_url: std::env::var("AUTH_PROVIDER_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
