// ============================================================================
// Auth Provider Client
// ============================================================================
//
// The authentication provider is an opaque upstream: it issues and validates
// sessions, and owns the whole auth protocol surface. This service only
// looks sessions up and delegates everything else to it verbatim.
//
// ============================================================================

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderName},
    response::Response,
};
use serde_json::Value;
use std::time::Duration;

use storefront_api::ApiError;
use storefront_config::UPSTREAM_TIMEOUT_SECS;

const X_STORE_DOMAIN: HeaderName = HeaderName::from_static("x-store-domain");

/// Seam to the authentication provider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Look up the caller's session. JSON null when there is none; session
    /// absence is not an error.
    async fn session(&self, headers: &axum::http::HeaderMap) -> Result<Value, ApiError>;

    /// Delegate an auth protocol request to the provider and relay its reply
    async fn delegate(&self, request: Request<Body>) -> Result<Response, ApiError>;
}

/// Provider reachable over HTTP at a configured base URL
pub struct HttpAuthProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAuthProvider {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn session(&self, headers: &axum::http::HeaderMap) -> Result<Value, ApiError> {
        let mut request = self.client.get(format!("{}/session", self.base_url));
        for name in [header::COOKIE, header::AUTHORIZATION, X_STORE_DOMAIN] {
            if let Some(value) = headers.get(&name) {
                request = request.header(name, value);
            }
        }

        let response = request.send().await.map_err(|err| {
            tracing::error!(error = %err, "auth provider session lookup failed");
            ApiError::external_service("auth provider")
        })?;

        if !response.status().is_success() {
            tracing::error!(
                status = response.status().as_u16(),
                "auth provider rejected session lookup"
            );
            return Err(ApiError::external_service("auth provider"));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|_| ApiError::external_service("auth provider"))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn delegate(&self, request: Request<Body>) -> Result<Response, ApiError> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let query = request.uri().query().map(str::to_string);

        let target_url = match query {
            Some(query) => format!("{}{}?{}", self.base_url, path, query),
            None => format!("{}{}", self.base_url, path),
        };

        let mut headers = request.headers().clone();
        headers.remove(header::HOST);

        let (_parts, body) = request.into_parts();
        let body_bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|_| ApiError::bad_request("Failed to read request body"))?;

        let mut upstream = self.client.request(method, &target_url).headers(headers);
        if !body_bytes.is_empty() {
            upstream = upstream.body(body_bytes.to_vec());
        }

        let response = upstream.send().await.map_err(|err| {
            tracing::error!(error = %err, path = %path, "auth provider request failed");
            ApiError::external_service("auth provider")
        })?;

        let status = response.status();
        let mut builder = axum::http::Response::builder().status(status);
        for (name, value) in response.headers() {
            if name != "connection" && name != "transfer-encoding" {
                builder = builder.header(name, value);
            }
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|_| ApiError::external_service("auth provider"))?;

        builder
            .body(Body::from(bytes))
            .map_err(|err| ApiError::unexpected(err.into()))
    }
}
