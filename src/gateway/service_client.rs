// ============================================================================
// Service Client
// ============================================================================
//
// Forwards requests to backend services and relays their responses
// byte-for-byte. The trust-chain headers (X-Forwarded-For, X-Original-Host)
// are always overwritten: the gateway is the sole entry point, so backends
// may rely on them precisely because callers cannot forge them here.
//
// A backend that times out or refuses the connection gets a local
// service-unavailable answer built right here. The front door responds even
// when nothing downstream of it works, so this path never touches the
// generic error handler.
//
// ============================================================================

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;

use storefront_api::ApiError;

use crate::gateway::router::RouteTarget;
use crate::utils::extract_client_ip;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_ORIGINAL_HOST: HeaderName = HeaderName::from_static("x-original-host");

/// HTTP client for forwarding requests to backend services
pub struct ServiceClient {
    client: reqwest::Client,
}

impl ServiceClient {
    /// `timeout_secs` bounds the whole upstream exchange; it is the only
    /// timeout the gateway applies.
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Forward a request to `target` and relay the response.
    ///
    /// Infallible by design: upstream failures become the local 503 envelope
    /// naming the backend.
    pub async fn forward(&self, target: &RouteTarget, request: Request<Body>) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let query = request.uri().query().map(str::to_string);
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        let client_ip = extract_client_ip(request.headers(), peer);
        let original_host = request.headers().get(header::HOST).cloned();

        let target_url = match query {
            Some(query) => format!("{}{}?{}", target.base_url, path, query),
            None => format!("{}{}", target.base_url, path),
        };

        let mut headers = request.headers().clone();
        headers.remove(header::HOST);
        headers.remove(&X_FORWARDED_FOR);
        headers.remove(&X_ORIGINAL_HOST);
        if let Ok(value) = HeaderValue::from_str(&client_ip) {
            headers.insert(X_FORWARDED_FOR, value);
        }
        if let Some(host) = original_host {
            headers.insert(X_ORIGINAL_HOST, host);
        }

        let (_parts, body) = request.into_parts();
        let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(_) => {
                return ApiError::bad_request("Failed to read request body").into_response();
            }
        };

        let mut upstream = self.client.request(method, &target_url).headers(headers);
        if !body_bytes.is_empty() {
            upstream = upstream.body(body_bytes.to_vec());
        }

        match upstream.send().await {
            Ok(response) => self.relay(target, response).await,
            Err(err) => {
                tracing::error!(
                    service = %target.service,
                    target = %target.base_url,
                    error = %err,
                    timed_out = err.is_timeout(),
                    "failed to forward request to backend"
                );
                self.unavailable(target)
            }
        }
    }

    async fn relay(&self, target: &RouteTarget, response: reqwest::Response) -> Response {
        let status = response.status();
        let mut builder = axum::http::Response::builder().status(status);
        for (name, value) in response.headers() {
            if name != "connection" && name != "transfer-encoding" {
                builder = builder.header(name, value);
            }
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(
                    service = %target.service,
                    error = %err,
                    "failed to read backend response body"
                );
                return self.unavailable(target);
            }
        };

        tracing::debug!(
            service = %target.service,
            status = status.as_u16(),
            "relayed backend response"
        );

        builder
            .body(Body::from(bytes))
            .unwrap_or_else(|_| self.unavailable(target))
    }

    /// Local service-unavailable answer, same envelope shape as everywhere
    /// else, naming the backend that did not respond.
    fn unavailable(&self, target: &RouteTarget) -> Response {
        let body = json!({
            "success": false,
            "error": {
                "code": "SERVICE_UNAVAILABLE",
                "message": "Service temporarily unavailable",
                "service": target.service,
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }
        });
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}
