// ============================================================================
// Terminal Error Handler
// ============================================================================
//
// The single place that decides the wire format of failures. Handlers return
// ApiError; its IntoResponse stashes the error in the response extensions,
// and this outermost middleware logs it and re-renders the envelope with the
// request path, the caller-supplied request id, and environment-aware
// redaction. No other layer formats error bodies.
//
// ============================================================================

use crate::error::ApiError;
use crate::response::REQUEST_ID_HEADER;
use axum::{
    extract::{Request, State},
    http::{Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ErrorHandlerConfig {
    /// Replace non-operational messages with a generic string
    pub redact_internal: bool,
    /// Attach the original error chain to the body (diagnostics only)
    pub include_trace: bool,
}

impl ErrorHandlerConfig {
    pub fn new(production: bool, include_trace: bool) -> Self {
        Self {
            redact_internal: production,
            include_trace,
        }
    }
}

/// Terminal middleware, applied outermost (after tracing) with
/// `middleware::from_fn_with_state(Arc<ErrorHandlerConfig>, error_handler)`.
pub async fn error_handler(
    State(config): State<Arc<ErrorHandlerConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(request).await;

    let Some(error) = response.extensions_mut().remove::<ApiError>() else {
        return response;
    };

    error.log(method.as_str(), &path);

    let envelope = error.to_envelope(
        Some(&path),
        request_id.as_deref(),
        config.redact_internal,
        config.include_trace,
    );
    let mut rebuilt = (error.status(), Json(envelope)).into_response();

    // Carry over headers set by inner layers (rate-limit counters and the
    // like); the body-derived ones are owned by the rebuilt response.
    for (name, value) in response.headers() {
        if name != "content-type" && name != "content-length" {
            rebuilt.headers_mut().insert(name.clone(), value.clone());
        }
    }

    rebuilt
}

/// Router fallback: synthesize the missing-route error and feed it through
/// the same terminal step as every other failure.
pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::route_not_found(method.as_str(), uri.path())
}
