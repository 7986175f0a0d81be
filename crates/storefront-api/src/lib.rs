// ============================================================================
// Shared API Contract
// ============================================================================
//
// The error/response/validation contract consumed by the gateway and every
// backend service:
// - error: closed error taxonomy and the ApiError value
// - response: success/paginated/health envelope builders
// - validation: declarative schemas and the request-validation middleware
// - handler: terminal error-handler middleware and the not-found fallback
//
// ============================================================================

pub mod error;
pub mod handler;
pub mod response;
pub mod validation;

pub use error::{ApiError, ApiResult, ErrorEnvelope, ErrorKind, FieldIssue};
pub use handler::{error_handler, not_found, ErrorHandlerConfig};
pub use response::{
    HealthStatus, PaginationMeta, Responder, SuccessEnvelope, REQUEST_ID_HEADER,
};
pub use validation::{
    safe_validate, validate, validate_value, Field, RequestSchemas, Schema, Validated,
    ValidatedInput,
};
