// ============================================================================
// Auth Service Process
// ============================================================================
//
// Backend service fronting the authentication provider: session lookup on
// /me, a health endpoint, and delegation of the remaining auth protocol
// surface to the provider.
//
// ============================================================================

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_api::ErrorHandlerConfig;
use storefront_config::AuthServiceConfig;
use storefront_server::auth_service::{self, AuthServiceContext, HttpAuthProvider};
use storefront_server::health::Uptime;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AuthServiceConfig::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Auth Service Starting ===");
    info!("Port: {}", config.port);
    info!("Provider: {}", config.provider_url);

    let ctx = Arc::new(AuthServiceContext {
        provider: Arc::new(HttpAuthProvider::new(&config.provider_url)),
        uptime: Uptime::start(),
    });
    let error_config = Arc::new(ErrorHandlerConfig::new(
        config.environment.is_production(),
        !config.environment.is_production(),
    ));

    let app = auth_service::router(ctx, error_config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Failed to parse bind address")?;

    info!("Auth service listening on {}", addr);

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
