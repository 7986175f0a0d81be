// ============================================================================
// Validation Pipeline
// ============================================================================
//
// Declarative object schemas over JSON values, plus the request-validation
// middleware. A schema run strips undeclared fields, applies defaults and
// coercions, and reports issues in field declaration order.
//
// The `validate` middleware checks every present section (body, query,
// params, headers) before deciding: all issues come back in one round trip,
// each prefixed with its source. Coerced values replace the raw input via
// the `Validated` extractor, so handlers see typed, defaulted data.
//
// ============================================================================

use crate::error::{ApiError, FieldIssue};
use axum::{
    body::Body,
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Number, Value};
use std::sync::Arc;

/// Base type a field must conform to
#[derive(Clone, Debug)]
enum BaseType {
    String,
    Number,
    Boolean,
}

/// One constraint on a field value, with its caller-facing message
#[derive(Clone, Debug)]
enum Check {
    MinLen { min: usize, message: String },
    MaxLen { max: usize, message: String },
    Email { message: String },
    Uuid { message: String },
    StartsWith { prefix: String, message: String },
    ContainsUppercase { message: String },
    ContainsLowercase { message: String },
    ContainsDigit { message: String },
    OneOf { allowed: Vec<String>, message: String },
    Gt { bound: f64, message: String },
    Min { bound: f64, message: String },
    Max { bound: f64, message: String },
    Between { min: f64, max: f64, message: String },
}

impl Check {
    fn code(&self) -> &'static str {
        match self {
            Check::MinLen { .. } | Check::Min { .. } => "too_small",
            Check::MaxLen { .. } | Check::Max { .. } => "too_big",
            Check::Email { .. }
            | Check::Uuid { .. }
            | Check::StartsWith { .. }
            | Check::ContainsUppercase { .. }
            | Check::ContainsLowercase { .. }
            | Check::ContainsDigit { .. } => "invalid_string",
            Check::OneOf { .. } => "invalid_enum_value",
            Check::Gt { .. } | Check::Between { .. } => "custom",
        }
    }

    fn message(&self) -> &str {
        match self {
            Check::MinLen { message, .. }
            | Check::MaxLen { message, .. }
            | Check::Email { message }
            | Check::Uuid { message }
            | Check::StartsWith { message, .. }
            | Check::ContainsUppercase { message }
            | Check::ContainsLowercase { message }
            | Check::ContainsDigit { message }
            | Check::OneOf { message, .. }
            | Check::Gt { message, .. }
            | Check::Min { message, .. }
            | Check::Max { message, .. }
            | Check::Between { message, .. } => message,
        }
    }
}

/// One declared field of an object schema
#[derive(Clone, Debug)]
pub struct Field {
    name: String,
    base: BaseType,
    required: bool,
    default: Option<Value>,
    coerce: bool,
    integer: bool,
    checks: Vec<Check>,
}

impl Field {
    fn new(name: &str, base: BaseType) -> Self {
        Self {
            name: name.to_string(),
            base,
            required: false,
            default: None,
            coerce: false,
            integer: false,
            checks: Vec::new(),
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, BaseType::String)
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, BaseType::Number)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, BaseType::Boolean)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value substituted when the input omits the field
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Accept string representations of the base type ("1" for numbers)
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    pub fn integer(mut self) -> Self {
        self.integer = true;
        self
    }

    pub fn min_len(mut self, min: usize, message: &str) -> Self {
        self.checks.push(Check::MinLen {
            min,
            message: message.to_string(),
        });
        self
    }

    pub fn max_len(mut self, max: usize, message: &str) -> Self {
        self.checks.push(Check::MaxLen {
            max,
            message: message.to_string(),
        });
        self
    }

    pub fn email(mut self, message: &str) -> Self {
        self.checks.push(Check::Email {
            message: message.to_string(),
        });
        self
    }

    pub fn uuid(mut self, message: &str) -> Self {
        self.checks.push(Check::Uuid {
            message: message.to_string(),
        });
        self
    }

    pub fn starts_with(mut self, prefix: &str, message: &str) -> Self {
        self.checks.push(Check::StartsWith {
            prefix: prefix.to_string(),
            message: message.to_string(),
        });
        self
    }

    pub fn contains_uppercase(mut self, message: &str) -> Self {
        self.checks.push(Check::ContainsUppercase {
            message: message.to_string(),
        });
        self
    }

    pub fn contains_lowercase(mut self, message: &str) -> Self {
        self.checks.push(Check::ContainsLowercase {
            message: message.to_string(),
        });
        self
    }

    pub fn contains_digit(mut self, message: &str) -> Self {
        self.checks.push(Check::ContainsDigit {
            message: message.to_string(),
        });
        self
    }

    pub fn one_of(mut self, allowed: &[&str], message: &str) -> Self {
        self.checks.push(Check::OneOf {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            message: message.to_string(),
        });
        self
    }

    pub fn gt(mut self, bound: f64, message: &str) -> Self {
        self.checks.push(Check::Gt {
            bound,
            message: message.to_string(),
        });
        self
    }

    pub fn min(mut self, bound: f64, message: &str) -> Self {
        self.checks.push(Check::Min {
            bound,
            message: message.to_string(),
        });
        self
    }

    pub fn max(mut self, bound: f64, message: &str) -> Self {
        self.checks.push(Check::Max {
            bound,
            message: message.to_string(),
        });
        self
    }

    pub fn between(mut self, min: f64, max: f64, message: &str) -> Self {
        self.checks.push(Check::Between {
            min,
            max,
            message: message.to_string(),
        });
        self
    }

    /// Check one present value; returns the coerced value or the issues
    fn parse_value(&self, raw: &Value) -> Result<Value, Vec<FieldIssue>> {
        match self.base {
            BaseType::String => self.parse_string(raw),
            BaseType::Number => self.parse_number(raw),
            BaseType::Boolean => self.parse_boolean(raw),
        }
    }

    fn parse_string(&self, raw: &Value) -> Result<Value, Vec<FieldIssue>> {
        let Value::String(s) = raw else {
            return Err(vec![self.type_issue("Expected string", raw)]);
        };

        let mut issues = Vec::new();
        for check in &self.checks {
            let ok = match check {
                Check::MinLen { min, .. } => s.chars().count() >= *min,
                Check::MaxLen { max, .. } => s.chars().count() <= *max,
                Check::Email { .. } => is_valid_email(s),
                Check::Uuid { .. } => uuid::Uuid::parse_str(s).is_ok(),
                Check::StartsWith { prefix, .. } => s.starts_with(prefix.as_str()),
                Check::ContainsUppercase { .. } => s.chars().any(|c| c.is_ascii_uppercase()),
                Check::ContainsLowercase { .. } => s.chars().any(|c| c.is_ascii_lowercase()),
                Check::ContainsDigit { .. } => s.chars().any(|c| c.is_ascii_digit()),
                Check::OneOf { allowed, .. } => allowed.iter().any(|a| a == s),
                _ => true,
            };
            if !ok {
                issues.push(self.check_issue(check));
            }
        }

        if issues.is_empty() {
            Ok(Value::String(s.clone()))
        } else {
            Err(issues)
        }
    }

    fn parse_number(&self, raw: &Value) -> Result<Value, Vec<FieldIssue>> {
        let parsed: Option<f64> = match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if self.coerce => s.trim().parse().ok(),
            _ => None,
        };
        let Some(n) = parsed else {
            return Err(vec![self.type_issue("Expected number", raw)]);
        };
        if self.integer && n.fract() != 0.0 {
            return Err(vec![self.type_issue("Expected integer", raw)]);
        }

        let mut issues = Vec::new();
        for check in &self.checks {
            let ok = match check {
                Check::Gt { bound, .. } => n > *bound,
                Check::Min { bound, .. } => n >= *bound,
                Check::Max { bound, .. } => n <= *bound,
                Check::Between { min, max, .. } => n >= *min && n <= *max,
                _ => true,
            };
            if !ok {
                issues.push(self.check_issue(check));
            }
        }
        if !issues.is_empty() {
            return Err(issues);
        }

        let value = if self.integer {
            Value::Number(Number::from(n as i64))
        } else {
            Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
        };
        Ok(value)
    }

    fn parse_boolean(&self, raw: &Value) -> Result<Value, Vec<FieldIssue>> {
        match raw {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) if self.coerce && s == "true" => Ok(Value::Bool(true)),
            Value::String(s) if self.coerce && s == "false" => Ok(Value::Bool(false)),
            _ => Err(vec![self.type_issue("Expected boolean", raw)]),
        }
    }

    fn type_issue(&self, message: &str, raw: &Value) -> FieldIssue {
        FieldIssue::new(&self.name, message)
            .with_code("invalid_type")
            .with_value(raw.clone())
    }

    fn check_issue(&self, check: &Check) -> FieldIssue {
        FieldIssue::new(&self.name, check.message()).with_code(check.code())
    }
}

/// Declarative object schema
#[derive(Clone, Debug, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn object() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Parse an input value against this schema.
    ///
    /// Undeclared fields are stripped; missing fields take their default or,
    /// when required, produce an issue. Issues come back in declaration
    /// order; parsing never stops at the first failure.
    pub fn parse(&self, input: &Value) -> Result<Value, Vec<FieldIssue>> {
        let object = match input {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(vec![FieldIssue {
                    field: None,
                    message: "Expected an object".to_string(),
                    code: Some("invalid_type".to_string()),
                    value: Some(other.clone()),
                }])
            }
        };

        let mut output = Map::new();
        let mut issues = Vec::new();

        for field in &self.fields {
            let raw = object.and_then(|map| map.get(&field.name));
            match raw {
                None | Some(Value::Null) => {
                    if let Some(default) = &field.default {
                        output.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        issues.push(
                            FieldIssue::new(&field.name, "Required").with_code("invalid_type"),
                        );
                    }
                }
                Some(value) => match field.parse_value(value) {
                    Ok(coerced) => {
                        output.insert(field.name.clone(), coerced);
                    }
                    Err(mut field_issues) => issues.append(&mut field_issues),
                },
            }
        }

        if issues.is_empty() {
            Ok(Value::Object(output))
        } else {
            Err(issues)
        }
    }
}

/// Structural email check; intentionally permissive, the provider is the
/// authority on deliverability
fn is_valid_email(s: &str) -> bool {
    if s.contains(char::is_whitespace) || s.matches('@').count() != 1 {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

// ============================================================================
// Request validation middleware
// ============================================================================

/// Schemas applied to each request section
#[derive(Clone, Debug, Default)]
pub struct RequestSchemas {
    pub body: Option<Schema>,
    pub query: Option<Schema>,
    pub params: Option<Schema>,
    pub headers: Option<Schema>,
}

/// Parsed, coerced request sections; Null for sections without a schema
#[derive(Clone, Debug, Default)]
pub struct ValidatedInput {
    pub body: Value,
    pub query: Value,
    pub params: Value,
    pub headers: Value,
}

/// Extractor for the coerced values stored by [`validate`]
pub struct Validated(pub ValidatedInput);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Validated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ValidatedInput>()
            .cloned()
            .map(Validated)
            .ok_or_else(|| ApiError::internal("validation middleware not applied to this route"))
    }
}

/// Request validation middleware, used per-route with
/// `middleware::from_fn_with_state(Arc<RequestSchemas>, validate)`.
///
/// Every present schema runs before a verdict: failures accumulate across
/// sections so the caller gets all field problems in one round trip.
pub async fn validate(
    State(schemas): State<Arc<RequestSchemas>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    let mut issues: Vec<FieldIssue> = Vec::new();
    let mut validated = ValidatedInput::default();

    // Body is buffered so it can be replayed for the handler; the gateway's
    // global size ceiling has already bounded it.
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| ApiError::bad_request("Failed to read request body"))?;

    if let Some(schema) = &schemas.body {
        let parsed: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)?
        };
        match schema.parse(&parsed) {
            Ok(value) => validated.body = value,
            Err(list) => prefix_issues(&mut issues, list, "body"),
        }
    }

    if let Some(schema) = &schemas.query {
        let raw = parts.uri.query().unwrap_or("");
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw).unwrap_or_default();
        let map: Map<String, Value> = pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        match schema.parse(&Value::Object(map)) {
            Ok(value) => validated.query = value,
            Err(list) => prefix_issues(&mut issues, list, "query"),
        }
    }

    if let Some(schema) = &schemas.params {
        let map: Map<String, Value> = RawPathParams::from_request_parts(&mut parts, &())
            .await
            .map(|params| {
                params
                    .iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        match schema.parse(&Value::Object(map)) {
            Ok(value) => validated.params = value,
            Err(list) => prefix_issues(&mut issues, list, "params"),
        }
    }

    if let Some(schema) = &schemas.headers {
        let map: Map<String, Value> = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|s| (name.as_str().to_string(), Value::String(s.to_string())))
            })
            .collect();
        match schema.parse(&Value::Object(map)) {
            Ok(value) => validated.headers = value,
            Err(list) => prefix_issues(&mut issues, list, "headers"),
        }
    }

    if !issues.is_empty() {
        return Err(ApiError::validation(issues));
    }

    parts.extensions.insert(validated);
    Ok(next.run(Request::from_parts(parts, Body::from(body_bytes))).await)
}

fn prefix_issues(into: &mut Vec<FieldIssue>, issues: Vec<FieldIssue>, source: &str) {
    into.extend(issues.into_iter().map(|mut issue| {
        issue.field = Some(match issue.field {
            Some(field) => format!("{}.{}", source, field),
            None => source.to_string(),
        });
        issue
    }));
}

/// Parse a single value, raising on failure
pub fn validate_value(schema: &Schema, value: &Value) -> Result<Value, ApiError> {
    schema.parse(value).map_err(ApiError::validation)
}

/// Parse a single value, returning the issues instead of raising
pub fn safe_validate(schema: &Schema, value: &Value) -> Result<Value, Vec<FieldIssue>> {
    schema.parse(value)
}

// ============================================================================
// Common schemas
// ============================================================================

pub mod schemas {
    use super::{Field, Schema};
    use serde_json::json;

    /// page/limit/sort/order with coercion, defaults and bounds
    pub fn pagination_query() -> Schema {
        Schema::object()
            .field(
                Field::number("page")
                    .coerce()
                    .integer()
                    .default_value(json!(1))
                    .gt(0.0, "Page must be greater than 0"),
            )
            .field(
                Field::number("limit")
                    .coerce()
                    .integer()
                    .default_value(json!(10))
                    .between(1.0, 100.0, "Limit must be between 1 and 100"),
            )
            .field(Field::string("sort"))
            .field(
                Field::string("order")
                    .default_value(json!("asc"))
                    .one_of(&["asc", "desc"], "Order must be asc or desc"),
            )
    }

    pub fn login() -> Schema {
        Schema::object()
            .field(Field::string("email").required().email("Invalid email format"))
            .field(Field::string("password").required().min_len(1, "Password is required"))
    }

    pub fn create_user() -> Schema {
        Schema::object()
            .field(Field::string("email").required().email("Invalid email format"))
            .field(
                Field::string("password")
                    .required()
                    .min_len(8, "Password must be at least 8 characters")
                    .contains_uppercase("Password must contain at least one uppercase letter")
                    .contains_lowercase("Password must contain at least one lowercase letter")
                    .contains_digit("Password must contain at least one number"),
            )
            .field(Field::string("firstName").required().min_len(1, "First name is required"))
            .field(Field::string("lastName").required().min_len(1, "Last name is required"))
    }

    pub fn id_param() -> Schema {
        Schema::object().field(Field::string("id").required().uuid("Invalid UUID format"))
    }

    pub fn auth_header() -> Schema {
        Schema::object().field(
            Field::string("authorization")
                .required()
                .starts_with("Bearer ", "Authorization header must be in Bearer format"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::{middleware, routing::post, Json, Router};
    use serde_json::json;
    use tower::ServiceExt;

    #[test]
    fn test_issues_preserve_declaration_order() {
        let schema = Schema::object()
            .field(Field::string("alpha").required())
            .field(Field::string("beta").required())
            .field(Field::number("gamma").required());

        let issues = schema.parse(&json!({})).unwrap_err();
        let fields: Vec<_> = issues.iter().map(|i| i.field.clone().unwrap()).collect();
        assert_eq!(fields, vec!["alpha", "beta", "gamma"]);
        assert!(issues.iter().all(|i| i.message == "Required"));
    }

    #[test]
    fn test_pagination_defaults_and_coercion() {
        let parsed = schemas::pagination_query().parse(&json!({})).unwrap();
        assert_eq!(parsed["page"], json!(1));
        assert_eq!(parsed["limit"], json!(10));
        assert_eq!(parsed["order"], json!("asc"));

        // Query strings arrive as strings and come out as numbers
        let parsed = schemas::pagination_query()
            .parse(&json!({"page": "3", "limit": "25"}))
            .unwrap();
        assert_eq!(parsed["page"], json!(3));
        assert_eq!(parsed["limit"], json!(25));
    }

    #[test]
    fn test_pagination_bounds() {
        let issues = schemas::pagination_query()
            .parse(&json!({"page": "0", "limit": "101"}))
            .unwrap_err();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].message, "Page must be greater than 0");
        assert_eq!(issues[1].message, "Limit must be between 1 and 100");
    }

    #[test]
    fn test_email_check() {
        let schema = schemas::login();
        let ok = schema
            .parse(&json!({"email": "a@example.com", "password": "pw"}))
            .unwrap();
        assert_eq!(ok["email"], json!("a@example.com"));

        let issues = schema
            .parse(&json!({"email": "not-an-email", "password": "pw"}))
            .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].field.as_deref().unwrap().ends_with("email"));
        assert_eq!(issues[0].message, "Invalid email format");
        assert_eq!(issues[0].code.as_deref(), Some("invalid_string"));
    }

    #[test]
    fn test_password_strength_accumulates() {
        let issues = schemas::create_user()
            .parse(&json!({
                "email": "a@example.com",
                "password": "short",
                "firstName": "Ada",
                "lastName": "Lovelace"
            }))
            .unwrap_err();
        // Length, uppercase and digit all fail at once
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn test_undeclared_fields_are_stripped() {
        let schema = Schema::object().field(Field::string("keep"));
        let parsed = schema
            .parse(&json!({"keep": "yes", "drop": "no"}))
            .unwrap();
        assert_eq!(parsed, json!({"keep": "yes"}));
    }

    #[test]
    fn test_uuid_param() {
        let schema = schemas::id_param();
        assert!(schema
            .parse(&json!({"id": "550e8400-e29b-41d4-a716-446655440000"}))
            .is_ok());
        let issues = schema.parse(&json!({"id": "42"})).unwrap_err();
        assert_eq!(issues[0].message, "Invalid UUID format");
    }

    #[test]
    fn test_safe_validate_never_raises() {
        let schema = Schema::object().field(Field::string("name").required());
        assert!(safe_validate(&schema, &json!({"name": "x"})).is_ok());
        assert!(safe_validate(&schema, &json!({})).is_err());

        let err = validate_value(&schema, &json!({})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_middleware_accumulates_across_sections() {
        let schemas = Arc::new(RequestSchemas {
            body: Some(schemas::login()),
            query: Some(schemas::pagination_query()),
            ..Default::default()
        });

        let app = Router::new()
            .route(
                "/login",
                post(|Validated(input): Validated| async move { Json(input.body) }),
            )
            .layer(middleware::from_fn_with_state(schemas, validate));

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/login?page=0")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"email":"nope","password":"pw"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));

        let details = body["error"]["details"].as_array().unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0]["field"], json!("body.email"));
        assert_eq!(details[1]["field"], json!("query.page"));
    }

    #[tokio::test]
    async fn test_middleware_passes_coerced_values_downstream() {
        let schemas = Arc::new(RequestSchemas {
            query: Some(schemas::pagination_query()),
            ..Default::default()
        });

        let app = Router::new()
            .route(
                "/items",
                post(|Validated(input): Validated| async move { Json(input.query) }),
            )
            .layer(middleware::from_fn_with_state(schemas, validate));

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/items?page=2&limit=50")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let query: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(query, json!({"page": 2, "limit": 50, "order": "asc"}));
    }
}
