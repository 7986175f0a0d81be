// ============================================================================
// Response Envelope
// ============================================================================
//
// Uniform success/failure body shape for every HTTP response. Failure bodies
// are built in error.rs; this module covers the success variants:
// success, paginated, created/updated/deleted, no-content and health.
//
// Request correlation ids are propagated from the caller's x-request-id
// header, never generated here.
//
// ============================================================================

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-supplied correlation id header
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Success variant of the response envelope
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub meta: ResponseMeta,
}

/// Success variant for list responses
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginatedEnvelope<T> {
    pub success: bool,
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub pagination: PaginationMeta,
    pub meta: ResponseMeta,
}

/// Derived pagination block; never stored apart from its three inputs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    /// Derive pagination metadata. `limit` is expected in 1..=100 (enforced
    /// upstream by the pagination query schema).
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        debug_assert!(limit >= 1);
        let total_pages = total.div_ceil(limit);
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check body (kept in its original wire shape, outside the envelope)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: HealthStatus,
    pub timestamp: String,
    pub uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<BTreeMap<String, HealthStatus>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatedPayload<T> {
    pub id: String,
    pub data: T,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdatedPayload<T> {
    pub data: T,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeletedPayload {
    pub id: String,
    pub message: String,
}

/// Builds success responses, stamping `meta.timestamp` at call time and
/// forwarding the caller's request id unchanged.
#[derive(Clone, Debug, Default)]
pub struct Responder {
    request_id: Option<String>,
}

impl Responder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
        }
    }

    /// Pick up the caller-supplied x-request-id, if any
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }

    fn meta(&self) -> ResponseMeta {
        ResponseMeta {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            request_id: self.request_id.clone(),
        }
    }

    pub fn success<T: Serialize>(&self, data: T, message: Option<&str>) -> Response {
        self.success_with_status(data, message, StatusCode::OK)
    }

    pub fn success_with_status<T: Serialize>(
        &self,
        data: T,
        message: Option<&str>,
        status: StatusCode,
    ) -> Response {
        let body = SuccessEnvelope {
            success: true,
            data,
            message: message.map(str::to_string),
            meta: self.meta(),
        };
        (status, Json(body)).into_response()
    }

    pub fn paginated<T: Serialize>(
        &self,
        items: Vec<T>,
        pagination: PaginationMeta,
        message: Option<&str>,
    ) -> Response {
        let body = PaginatedEnvelope {
            success: true,
            data: items,
            message: message.map(str::to_string),
            pagination,
            meta: self.meta(),
        };
        (StatusCode::OK, Json(body)).into_response()
    }

    pub fn created<T: Serialize>(
        &self,
        id: impl Into<String>,
        data: T,
        message: Option<&str>,
    ) -> Response {
        let payload = CreatedPayload {
            id: id.into(),
            data,
            message: message
                .unwrap_or("Resource created successfully")
                .to_string(),
        };
        self.success_with_status(payload, None, StatusCode::CREATED)
    }

    pub fn updated<T: Serialize>(&self, data: T, message: Option<&str>) -> Response {
        let payload = UpdatedPayload {
            data,
            message: message
                .unwrap_or("Resource updated successfully")
                .to_string(),
        };
        self.success_with_status(payload, None, StatusCode::OK)
    }

    pub fn deleted(&self, id: impl Into<String>, message: Option<&str>) -> Response {
        let payload = DeletedPayload {
            id: id.into(),
            message: message
                .unwrap_or("Resource deleted successfully")
                .to_string(),
        };
        self.success_with_status(payload, None, StatusCode::OK)
    }

    pub fn no_content(&self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }

    pub fn health(
        &self,
        status: HealthStatus,
        uptime_secs: u64,
        version: Option<&str>,
        services: Option<BTreeMap<String, HealthStatus>>,
    ) -> Response {
        let body = HealthBody {
            status,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            uptime: uptime_secs,
            version: version.map(str::to_string),
            services,
        };
        let code = match status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };
        (code, Json(body)).into_response()
    }
}
