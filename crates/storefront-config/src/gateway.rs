// ============================================================================
// Gateway Configuration
// ============================================================================

use anyhow::{Context, Result};

use crate::constants::{
    ANONYMOUS_MAX_REQUESTS, AUTHENTICATED_MAX_REQUESTS, AUTH_SERVICE_DEV_PORT,
    RATE_LIMIT_WINDOW_SECS,
};
use crate::{required_var, validate_database_url, Environment};

/// Rate limiter budgets and window
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    /// Budget for callers with an authenticated-user context
    pub authenticated_max: u64,
    /// Budget for anonymous callers
    pub anonymous_max: u64,
}

impl RateLimitConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            window_secs: env_u64("RATE_LIMIT_WINDOW_SECS", RATE_LIMIT_WINDOW_SECS),
            authenticated_max: env_u64(
                "RATE_LIMIT_AUTHENTICATED_MAX",
                AUTHENTICATED_MAX_REQUESTS,
            ),
            anonymous_max: env_u64("RATE_LIMIT_ANONYMOUS_MAX", ANONYMOUS_MAX_REQUESTS),
        }
    }
}

/// One backend service behind the gateway.
///
/// The prefix list is ordered most-specific-first when the routing table is
/// built; `url_override` wins over the environment-based resolution rule.
#[derive(Clone, Debug)]
pub struct ServiceRoute {
    /// Service name, also the production hostname label
    pub name: String,
    /// Path prefix routed to this service
    pub prefix: String,
    /// Port the service listens on in development (localhost)
    pub dev_port: u16,
    /// Explicit base URL, e.g. AUTH_SERVICE_URL in production
    pub url_override: Option<String>,
}

/// Gateway process configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub port: u16,
    /// Validated at startup and handed to the auth provider; never opened here
    pub database_url: String,
    /// Domain suffix for the production hostname rule ({service}.{domain})
    pub service_domain: String,
    /// Session cookie name that marks an authenticated-user context
    pub session_cookie: String,
    /// Include error traces in failure envelopes (non-production diagnostics)
    pub include_error_trace: bool,
    pub rust_log: String,
    pub rate_limit: RateLimitConfig,
    pub services: Vec<ServiceRoute>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let environment = Environment::from_env();

        let port: u16 = required_var("API_GATEWAY_PORT")?
            .parse()
            .context("API_GATEWAY_PORT must be a valid port number")?;

        let database_url = required_var("DATABASE_URL")?;
        validate_database_url(&database_url)?;

        let include_error_trace = std::env::var("INCLUDE_ERROR_TRACE")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(!environment.is_production());

        Ok(Self {
            environment,
            port,
            database_url,
            service_domain: std::env::var("SERVICE_DOMAIN")
                .unwrap_or_else(|_| "internal".to_string()),
            session_cookie: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "session_token".to_string()),
            include_error_trace,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            rate_limit: RateLimitConfig::from_env(),
            services: default_services(),
        })
    }
}

/// Static service table.
///
/// The auth service owns the root prefix, exactly like the original edge:
/// its catch-all protocol handler receives everything the gateway does not
/// answer itself. Additional domain services are additive entries with
/// longer prefixes.
fn default_services() -> Vec<ServiceRoute> {
    vec![ServiceRoute {
        name: "auth".to_string(),
        prefix: "/".to_string(),
        dev_port: AUTH_SERVICE_DEV_PORT,
        url_override: std::env::var("AUTH_SERVICE_URL").ok(),
    }]
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
