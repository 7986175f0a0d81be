// ============================================================================
// Auth Service
// ============================================================================
//
// Backend service fronting the authentication provider:
// - GET /health - health envelope with process uptime
// - GET /me - session lookup; null payload when no session exists
// - everything else - delegated to the provider's protocol handler
//
// ============================================================================

pub mod provider;

pub use provider::{AuthProvider, HttpAuthProvider};

use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderMap,
    middleware as axum_middleware,
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use storefront_api::{error_handler, ApiError, ErrorHandlerConfig, HealthStatus, Responder};

use crate::gateway::cors_layer;
use crate::health::Uptime;

pub struct AuthServiceContext {
    pub provider: Arc<dyn AuthProvider>,
    pub uptime: Uptime,
}

pub fn router(
    ctx: Arc<AuthServiceContext>,
    error_config: Arc<ErrorHandlerConfig>,
) -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/health", get(health))
        .fallback(delegate)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer())
                .layer(axum_middleware::from_fn_with_state(
                    error_config,
                    error_handler,
                ))
                .into_inner(),
        )
        .with_state(ctx)
}

/// GET /me
///
/// Success envelope either way: a missing session is a null payload, not an
/// error.
async fn me(
    State(ctx): State<Arc<AuthServiceContext>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = ctx.provider.session(&headers).await?;
    Ok(Responder::from_headers(&headers)
        .success(session, Some("Session retrieved successfully")))
}

/// GET /health
async fn health(State(ctx): State<Arc<AuthServiceContext>>, headers: HeaderMap) -> Response {
    Responder::from_headers(&headers).health(
        HealthStatus::Healthy,
        ctx.uptime.elapsed_secs(),
        Some(env!("CARGO_PKG_VERSION")),
        None,
    )
}

/// Catch-all: the provider owns the auth protocol surface
async fn delegate(
    State(ctx): State<Arc<AuthServiceContext>>,
    request: Request<Body>,
) -> Result<Response, ApiError> {
    ctx.provider.delegate(request).await
}
