// ============================================================================
// Gateway Router
// ============================================================================
//
// Resolves a request path to a backend service and forwards it. The routing
// table is built once at startup from config and never changes afterwards;
// a missing or malformed backend entry fails process start, not a request.
//
// Default routing:
// - /* -> auth service (its catch-all protocol handler owns the root)
// Additional domain services register longer prefixes ahead of it.
//
// ============================================================================

use anyhow::{bail, Result};
use axum::{
    extract::{Request, State},
    response::Response,
};
use std::sync::Arc;

use storefront_api::ApiError;
use storefront_config::{Environment, GatewayConfig, ServiceRoute};

use crate::gateway::service_client::ServiceClient;
use crate::rate_limit::RateLimiter;

/// Resolved backend address for one service, immutable after startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTarget {
    pub service: String,
    pub base_url: String,
}

/// Ordered (path prefix -> backend) table, most-specific prefix first
#[derive(Clone, Debug, Default)]
pub struct RoutingTable {
    routes: Vec<(String, RouteTarget)>,
}

impl RoutingTable {
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::from_services(&config.services, config.environment, &config.service_domain)
    }

    pub fn from_services(
        services: &[ServiceRoute],
        environment: Environment,
        domain: &str,
    ) -> Result<Self> {
        let mut routes = Vec::with_capacity(services.len());
        for service in services {
            if !service.prefix.starts_with('/') {
                bail!(
                    "service {} has an invalid path prefix: {:?}",
                    service.name,
                    service.prefix
                );
            }
            let base_url = resolve_backend(service, environment, domain)?;
            routes.push((
                service.prefix.clone(),
                RouteTarget {
                    service: service.name.clone(),
                    base_url,
                },
            ));
        }
        // Longest prefix wins
        routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Ok(Self { routes })
    }

    pub fn resolve(&self, path: &str) -> Option<&RouteTarget> {
        self.routes
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, path))
            .map(|(_, target)| target)
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Resolve one service's base URL: production uses the explicit override or
/// the {service}.{domain} hostname rule, development uses localhost and the
/// service's fixed port.
pub fn resolve_backend(
    service: &ServiceRoute,
    environment: Environment,
    domain: &str,
) -> Result<String> {
    match environment {
        Environment::Production => {
            if let Some(url) = &service.url_override {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    bail!("service {} URL override is malformed: {:?}", service.name, url);
                }
                Ok(url.trim_end_matches('/').to_string())
            } else {
                Ok(format!("http://{}.{}", service.name, domain))
            }
        }
        Environment::Development => Ok(format!("http://localhost:{}", service.dev_port)),
    }
}

/// Gateway state shared across middleware and dispatch
pub struct GatewayState {
    pub routes: RoutingTable,
    pub client: ServiceClient,
    pub limiter: RateLimiter,
    /// Session cookie name marking an authenticated-user context
    pub session_cookie: String,
}

/// Proxy dispatch: match the path, forward to the backend.
///
/// Unmatched paths produce the not-found error; forwarding itself always
/// answers, so this is the only failure the generic handler sees here.
pub async fn route_request(
    State(state): State<Arc<GatewayState>>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();

    let Some(target) = state.routes.resolve(&path) else {
        return Err(ApiError::route_not_found(request.method().as_str(), &path));
    };

    tracing::debug!(service = %target.service, path = %path, "route matched");
    Ok(state.client.forward(target, request).await)
}
