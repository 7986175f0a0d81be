// ============================================================================
// Gateway Middleware
// ============================================================================
//
// Rate limiting runs before proxy dispatch: derive the caller identity,
// count the request, short-circuit over-budget callers with a 429 envelope.
// Every response reports the budget through the standard RateLimit-* headers
// and the legacy X-RateLimit-* trio.
//
// ============================================================================

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use storefront_api::ApiError;

use crate::gateway::router::GatewayState;
use crate::rate_limit::{has_authenticated_context, RateLimitDecision, RateLimitIdentity};

pub async fn rate_limiting(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let identity =
        RateLimitIdentity::from_request(request.uri().query(), request.headers(), peer);
    let authenticated = has_authenticated_context(request.headers(), &state.session_cookie);

    let decision = state.limiter.check(&identity, authenticated).await;

    if !decision.allowed {
        tracing::warn!(
            identity = %identity.key(),
            limit = decision.limit,
            authenticated = authenticated,
            path = %request.uri().path(),
            "rate limit exceeded"
        );
        let mut response = ApiError::too_many_requests().into_response();
        apply_rate_limit_headers(&mut response, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(&mut response, &decision);
    response
}

fn apply_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    let pairs = [
        ("ratelimit-limit", decision.limit),
        ("ratelimit-remaining", decision.remaining),
        ("ratelimit-reset", decision.reset_secs),
        ("x-ratelimit-limit", decision.limit),
        ("x-ratelimit-remaining", decision.remaining),
        ("x-ratelimit-reset", decision.reset_secs),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            response.headers_mut().insert(name, value);
        }
    }
}
