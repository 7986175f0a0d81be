// ============================================================================
// Configuration
// ============================================================================
//
// Environment-driven configuration, resolved once at process start:
// - constants.rs: shared limits and timeouts
// - gateway.rs: gateway process configuration (port, routing, rate limits)
// - auth.rs: auth service configuration
//
// Required variables (API_GATEWAY_PORT, DATABASE_URL) are validated here;
// a missing or malformed value is a startup error, never a per-request one.
//
// ============================================================================

mod auth;
mod constants;
mod gateway;

pub use auth::AuthServiceConfig;
pub use constants::{
    ANONYMOUS_MAX_REQUESTS, AUTHENTICATED_MAX_REQUESTS, AUTH_SERVICE_DEV_PORT,
    MAX_REQUEST_BODY_SIZE, RATE_LIMIT_WINDOW_SECS, UPSTREAM_TIMEOUT_SECS,
};
pub use gateway::{GatewayConfig, RateLimitConfig, ServiceRoute};

use anyhow::{bail, Context, Result};

/// Deployment environment, from APP_ENV
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV") {
            Ok(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Read a required environment variable
pub(crate) fn required_var(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .with_context(|| format!("{} must be set", name))?;
    if value.trim().is_empty() {
        bail!("{} must not be empty", name);
    }
    Ok(value)
}

/// Validate that a database connection string is well-formed.
///
/// The gateway never opens this connection itself; it only refuses to start
/// without one, so a broken deployment fails at boot instead of at the first
/// request that reaches the auth provider.
pub(crate) fn validate_database_url(raw: &str) -> Result<()> {
    let Some((scheme, rest)) = raw.split_once("://") else {
        bail!("DATABASE_URL must include a scheme, e.g. postgres://user@host/db");
    };
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-')
    {
        bail!("DATABASE_URL has an invalid scheme: {:?}", scheme);
    }
    let authority = rest.split('/').next().unwrap_or("");
    let host = authority.rsplit('@').next().unwrap_or("");
    if host.is_empty() {
        bail!("DATABASE_URL is missing a host");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_accepts_postgres() {
        assert!(validate_database_url("postgres://user:pw@localhost:5432/app").is_ok());
        assert!(validate_database_url("postgresql://db.internal/app").is_ok());
    }

    #[test]
    fn test_database_url_rejects_missing_scheme() {
        assert!(validate_database_url("localhost:5432/app").is_err());
        assert!(validate_database_url("").is_err());
    }

    #[test]
    fn test_database_url_rejects_missing_host() {
        assert!(validate_database_url("postgres://").is_err());
        assert!(validate_database_url("postgres:///app").is_err());
    }
}
