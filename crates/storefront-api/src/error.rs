// ============================================================================
// Error Taxonomy
// ============================================================================
//
// One error representation for every failure in the system:
// - ErrorKind: closed set of kinds, each mapped to exactly one status code
// - ApiError: tagged error value (kind + message + field issues)
// - From impls translating known third-party error shapes
//
// Handlers never format their own error bodies; they return ApiError and the
// terminal error_handler middleware (handler.rs) decides the wire format.
//
// ============================================================================

use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Closed set of error kinds.
///
/// The wire code is the SCREAMING_SNAKE_CASE variant name; the status mapping
/// in [`ErrorKind::status`] is total and fixed at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Client errors (4xx)
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Conflict,
    UnprocessableEntity,
    TooManyRequests,

    // Server errors (5xx)
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,

    // Domain errors
    ValidationError,
    AuthenticationError,
    AuthorizationError,
    ResourceNotFound,
    DuplicateResource,
    ExternalServiceError,
}

impl ErrorKind {
    /// Every kind, for exhaustive checks
    pub const ALL: [ErrorKind; 19] = [
        ErrorKind::BadRequest,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::MethodNotAllowed,
        ErrorKind::Conflict,
        ErrorKind::UnprocessableEntity,
        ErrorKind::TooManyRequests,
        ErrorKind::InternalServerError,
        ErrorKind::NotImplemented,
        ErrorKind::BadGateway,
        ErrorKind::ServiceUnavailable,
        ErrorKind::GatewayTimeout,
        ErrorKind::ValidationError,
        ErrorKind::AuthenticationError,
        ErrorKind::AuthorizationError,
        ErrorKind::ResourceNotFound,
        ErrorKind::DuplicateResource,
        ErrorKind::ExternalServiceError,
    ];

    /// HTTP status code for this kind
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::BadRequest | ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized | ErrorKind::AuthenticationError => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden | ErrorKind::AuthorizationError => StatusCode::FORBIDDEN,
            ErrorKind::NotFound | ErrorKind::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Conflict | ErrorKind::DuplicateResource => StatusCode::CONFLICT,
            ErrorKind::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::BadGateway | ErrorKind::ExternalServiceError => StatusCode::BAD_GATEWAY,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Wire code for logging and programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::UnprocessableEntity => "UNPROCESSABLE_ENTITY",
            ErrorKind::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorKind::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorKind::NotImplemented => "NOT_IMPLEMENTED",
            ErrorKind::BadGateway => "BAD_GATEWAY",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::GatewayTimeout => "GATEWAY_TIMEOUT",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::AuthenticationError => "AUTHENTICATION_ERROR",
            ErrorKind::AuthorizationError => "AUTHORIZATION_ERROR",
            ErrorKind::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorKind::DuplicateResource => "DUPLICATE_RESOURCE",
            ErrorKind::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
        }
    }
}

/// One field-level problem reported by the validation pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Dotted path prefixed with its source section, e.g. "body.email"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Offending input value, when it is safe to echo back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
            code: None,
            value: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Application error value.
///
/// Created where a failure is detected, consumed exactly once by the terminal
/// error handler. `operational = false` marks unexpected failures whose
/// message is redacted from callers in production.
#[derive(Clone, Debug, Error)]
#[error("{}: {}", .kind.code(), .message)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Vec<FieldIssue>,
    pub timestamp: DateTime<Utc>,
    pub operational: bool,
    /// Original error chain, only ever sent when traces are explicitly enabled
    pub trace: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Vec::new(),
            timestamp: Utc::now(),
            operational: true,
            trace: None,
        }
    }

    pub fn with_details(
        kind: ErrorKind,
        message: impl Into<String>,
        details: Vec<FieldIssue>,
    ) -> Self {
        Self {
            details,
            ..Self::new(kind, message)
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Validation failure carrying every accumulated field issue
    pub fn validation(details: Vec<FieldIssue>) -> Self {
        Self::with_details(
            ErrorKind::ValidationError,
            "Request validation failed",
            details,
        )
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthenticationError, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorizationError, message)
    }

    pub fn resource_not_found(resource: &str) -> Self {
        Self::new(ErrorKind::ResourceNotFound, format!("{} not found", resource))
    }

    /// Missing-route condition, fed through the same terminal handler
    pub fn route_not_found(method: &str, path: &str) -> Self {
        Self::new(
            ErrorKind::NotFound,
            format!("Route {} {} not found", method, path),
        )
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateResource, message)
    }

    pub fn external_service(service: &str) -> Self {
        Self::new(
            ErrorKind::ExternalServiceError,
            format!("External service {} is unavailable", service),
        )
    }

    pub fn too_many_requests() -> Self {
        Self::new(
            ErrorKind::TooManyRequests,
            "Too many requests, please try again later.",
        )
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    /// Unknown failure: non-operational, chain kept aside for diagnostics
    pub fn unexpected(err: anyhow::Error) -> Self {
        Self {
            operational: false,
            trace: Some(format!("{:#}", err)),
            ..Self::new(ErrorKind::InternalServerError, err.to_string())
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Log this error with level by class: 5xx at error, auth and rate-limit
    /// rejections at warn, remaining client errors at debug.
    pub fn log(&self, method: &str, path: &str) {
        let status = self.status();
        let code = self.kind.code();

        if status.is_server_error() {
            tracing::error!(
                method = %method,
                path = %path,
                error = %self,
                error_code = code,
                status = status.as_u16(),
                "request failed"
            );
        } else if matches!(
            self.kind,
            ErrorKind::Unauthorized
                | ErrorKind::AuthenticationError
                | ErrorKind::TooManyRequests
        ) {
            tracing::warn!(
                method = %method,
                path = %path,
                error = %self,
                error_code = code,
                "request rejected"
            );
        } else {
            tracing::debug!(
                method = %method,
                path = %path,
                error = %self,
                error_code = code,
                "client error"
            );
        }
    }

    /// Render the failure envelope.
    ///
    /// `redact_internal` replaces non-operational messages with a generic
    /// string; `include_trace` attaches the original chain (non-production
    /// diagnostics only).
    pub fn to_envelope(
        &self,
        path: Option<&str>,
        request_id: Option<&str>,
        redact_internal: bool,
        include_trace: bool,
    ) -> ErrorEnvelope {
        let message = if !self.operational && redact_internal {
            "Internal server error".to_string()
        } else {
            self.message.clone()
        };

        ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.kind,
                message,
                details: if self.details.is_empty() {
                    None
                } else {
                    Some(self.details.clone())
                },
                timestamp: self
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                path: path.map(str::to_string),
                request_id: request_id.map(str::to_string),
                trace: if include_trace && !self.operational {
                    self.trace.clone()
                } else {
                    None
                },
            },
        }
    }
}

/// Failure variant of the response envelope
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldIssue>>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        // Safe defaults; the terminal error_handler middleware re-renders the
        // body with path, request id and environment-aware redaction.
        let status = self.status();
        let envelope = self.to_envelope(None, None, true, false);
        let mut response = (status, Json(envelope)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

// ============================================================================
// Conversion from common error types
// ============================================================================

impl From<serde_json::Error> for ApiError {
    fn from(_: serde_json::Error) -> Self {
        ApiError::bad_request("Invalid data format")
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::new(ErrorKind::GatewayTimeout, "Upstream request timed out")
        } else {
            ApiError::new(ErrorKind::ExternalServiceError, "External service error")
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::unexpected(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_is_total_and_exact() {
        let expected = [
            (ErrorKind::BadRequest, 400),
            (ErrorKind::Unauthorized, 401),
            (ErrorKind::Forbidden, 403),
            (ErrorKind::NotFound, 404),
            (ErrorKind::MethodNotAllowed, 405),
            (ErrorKind::Conflict, 409),
            (ErrorKind::UnprocessableEntity, 422),
            (ErrorKind::TooManyRequests, 429),
            (ErrorKind::InternalServerError, 500),
            (ErrorKind::NotImplemented, 501),
            (ErrorKind::BadGateway, 502),
            (ErrorKind::ServiceUnavailable, 503),
            (ErrorKind::GatewayTimeout, 504),
            (ErrorKind::ValidationError, 400),
            (ErrorKind::AuthenticationError, 401),
            (ErrorKind::AuthorizationError, 403),
            (ErrorKind::ResourceNotFound, 404),
            (ErrorKind::DuplicateResource, 409),
            (ErrorKind::ExternalServiceError, 502),
        ];

        assert_eq!(expected.len(), ErrorKind::ALL.len());
        for (kind, status) in expected {
            assert_eq!(kind.status().as_u16(), status, "{:?}", kind);
            // Stable across calls
            assert_eq!(kind.status(), kind.status());
        }
    }

    #[test]
    fn test_wire_codes_match_serialization() {
        for kind in ErrorKind::ALL {
            let serialized = serde_json::to_value(kind).unwrap();
            assert_eq!(serialized, serde_json::Value::String(kind.code().into()));
        }
    }

    #[test]
    fn test_route_not_found_names_method_and_path() {
        let err = ApiError::route_not_found("POST", "/api/unknown");
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "Route POST /api/unknown not found");
        assert!(err.operational);
    }

    #[test]
    fn test_unexpected_is_redacted_in_production() {
        let err = ApiError::unexpected(anyhow::anyhow!("connection pool poisoned"));
        assert!(!err.operational);

        let redacted = err.to_envelope(Some("/x"), None, true, false);
        assert_eq!(redacted.error.message, "Internal server error");
        assert!(redacted.error.trace.is_none());

        let verbose = err.to_envelope(Some("/x"), None, false, true);
        assert_eq!(verbose.error.message, "connection pool poisoned");
        assert!(verbose.error.trace.is_some());
    }

    #[test]
    fn test_operational_error_is_never_redacted() {
        let err = ApiError::authentication("Invalid token");
        let envelope = err.to_envelope(None, None, true, true);
        assert_eq!(envelope.error.message, "Invalid token");
        assert!(envelope.error.trace.is_none());
    }

    #[test]
    fn test_envelope_carries_path_and_request_id() {
        let err = ApiError::validation(vec![FieldIssue::new("body.email", "Invalid email format")]);
        let envelope = err.to_envelope(Some("/signup"), Some("req-42"), true, false);
        assert!(!envelope.success);
        assert_eq!(envelope.error.path.as_deref(), Some("/signup"));
        assert_eq!(envelope.error.request_id.as_deref(), Some("req-42"));
        assert_eq!(envelope.error.details.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_json_error_translates_to_bad_request() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: ApiError = parse_err.into();
        assert_eq!(err.kind, ErrorKind::BadRequest);
        assert_eq!(err.message, "Invalid data format");
    }
}
