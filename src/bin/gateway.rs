// ============================================================================
// API Gateway Process
// ============================================================================
//
// Single entry point for all client requests. Applies CORS, the request
// body ceiling and per-caller rate limits, then routes by path prefix to
// the backend services.
//
// ============================================================================

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_api::ErrorHandlerConfig;
use storefront_config::{GatewayConfig, UPSTREAM_TIMEOUT_SECS};
use storefront_server::gateway::{build_router, GatewayState, RoutingTable, ServiceClient};
use storefront_server::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> Result<()> {
    // Fatal on missing port or database configuration: the process must not
    // come up half-wired.
    let config = GatewayConfig::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== API Gateway Starting ===");
    info!("Port: {}", config.port);
    info!("Environment: {:?}", config.environment);

    let routes = RoutingTable::from_config(&config)?;

    let state = Arc::new(GatewayState {
        routes,
        client: ServiceClient::new(UPSTREAM_TIMEOUT_SECS),
        limiter: RateLimiter::in_memory(config.rate_limit.clone()),
        session_cookie: config.session_cookie.clone(),
    });
    let error_config = Arc::new(ErrorHandlerConfig::new(
        config.environment.is_production(),
        config.include_error_trace,
    ));

    let app = build_router(state, error_config);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .context("Failed to parse bind address")?;

    info!("API Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Failed to start server")?;

    Ok(())
}
