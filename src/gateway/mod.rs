// ============================================================================
// API Gateway
// ============================================================================
//
// Single entry point for all client traffic:
// - CORS and body-size ceiling at the edge
// - rate limiting per caller identity before any dispatch
// - path-prefix routing to backend services with trust-chain headers
// - uniform failure envelopes for unmatched routes and unreachable backends
//
// The middleware chain, outermost first: trace -> CORS -> body limit ->
// error handler -> rate limiter -> proxy dispatch.
//
// ============================================================================

pub mod middleware;
pub mod router;
pub mod service_client;

pub use router::{GatewayState, RouteTarget, RoutingTable};
pub use service_client::ServiceClient;

use axum::{
    body::Body,
    http::{header, HeaderName, Method},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    map_request_body::MapRequestBodyLayer,
    map_response_body::MapResponseBodyLayer,
    trace::TraceLayer,
};

use storefront_api::{error_handler, ErrorHandlerConfig};
use storefront_config::MAX_REQUEST_BODY_SIZE;

/// Liveness probe. Plain acknowledgement, no envelope: this must answer even
/// if everything behind the proxy is down.
pub async fn gateway_health() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to api-gateway!" }))
}

/// CORS policy shared by the gateway and the backend services
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-store-domain"),
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-api-key"),
        ])
}

/// Assemble the gateway router around the shared state
pub fn build_router(
    state: Arc<GatewayState>,
    error_config: Arc<ErrorHandlerConfig>,
) -> Router {
    Router::new()
        .route("/gateway-health", get(gateway_health))
        // Everything else goes through prefix routing to a backend
        .fallback(router::route_request)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer())
                // CorsLayer requires its inner response body to be `Default`,
                // which RequestBodyLimit's `ResponseBody<_>` wrapper is not.
                // Re-wrap it as an axum `Body` (which is `Default`) — a no-op
                // pass-through that leaves the limit layer in its outer position.
                .layer(MapResponseBodyLayer::new(Body::new))
                .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_SIZE))
                // RequestBodyLimitLayer rewrites the body to `Limited<Body>`;
                // axum's `from_fn` middleware below only services `Request<Body>`.
                // Re-wrap the limited body as an axum `Body` (the limit counter
                // rides along inside) so the stack type-checks without moving the
                // limit off its outer position.
                .layer(MapRequestBodyLayer::new(Body::new))
                .layer(axum_middleware::from_fn_with_state(
                    error_config,
                    error_handler,
                ))
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::rate_limiting,
                ))
                .into_inner(),
        )
        .with_state(state)
}
