// ============================================================================
// Auth Service Tests
// ============================================================================
//
// The auth backend behind the gateway: session lookup on /me (null payload
// when no session exists), health, protocol delegation to the provider, and
// the validated-endpoint contract shared by every backend service.
//
// ============================================================================

use axum::{middleware, routing::post, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

use storefront_api::{
    error_handler, validation::schemas, validate, ErrorHandlerConfig, RequestSchemas,
    Responder, Validated,
};
use storefront_server::auth_service::{self, AuthServiceContext, HttpAuthProvider};
use storefront_server::health::Uptime;

use test_utils::{default_rate_limit, service, spawn_gateway, spawn_provider_stub, spawn_router};

/// Spawn the real auth service wired to a provider stub
async fn spawn_auth_service() -> SocketAddr {
    let provider = spawn_provider_stub().await;
    let ctx = Arc::new(AuthServiceContext {
        provider: Arc::new(HttpAuthProvider::new(&format!("http://{}", provider))),
        uptime: Uptime::start(),
    });
    let error_config = Arc::new(ErrorHandlerConfig::new(false, false));
    spawn_router(auth_service::router(ctx, error_config)).await
}

#[tokio::test]
async fn test_me_with_session_cookie_returns_the_session() {
    let auth = spawn_auth_service().await;
    let gateway = spawn_gateway(
        vec![service("auth", "/", auth.port())],
        default_rate_limit(),
    )
    .await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/me", gateway))
        .header("cookie", "session_token=valid-session")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["message"], "Session retrieved successfully");
    assert_eq!(body["data"]["user"]["email"], "ada@example.com");
}

#[tokio::test]
async fn test_me_without_cookie_is_a_null_session_not_an_error() {
    let auth = spawn_auth_service().await;
    let gateway = spawn_gateway(
        vec![service("auth", "/", auth.port())],
        default_rate_limit(),
    )
    .await;

    let response = reqwest::get(format!("http://{}/me", gateway)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], Value::Bool(true));
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_health_reports_uptime_and_version() {
    let auth = spawn_auth_service().await;

    let response = reqwest::get(format!("http://{}/health", auth)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime"].is_u64());
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_protocol_paths_are_delegated_to_the_provider() {
    let auth = spawn_auth_service().await;
    let gateway = spawn_gateway(
        vec![service("auth", "/", auth.port())],
        default_rate_limit(),
    )
    .await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/api/auth/sign-in/email", gateway))
        .json(&serde_json::json!({"email": "ada@example.com", "password": "pw"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["handled"], "/api/auth/sign-in/email");
}

/// A backend endpoint using the shared validation pipeline, the way every
/// domain service consumes the contract
fn users_service() -> Router {
    let schemas = Arc::new(RequestSchemas {
        body: Some(schemas::login()),
        ..Default::default()
    });

    Router::new()
        .route(
            "/api/users/login",
            post(|Validated(input): Validated| async move {
                Responder::new().success(input.body, Some("Logged in"))
            }),
        )
        .layer(middleware::from_fn_with_state(schemas, validate))
        .layer(middleware::from_fn_with_state(
            Arc::new(ErrorHandlerConfig::new(false, false)),
            error_handler,
        ))
}

#[tokio::test]
async fn test_invalid_email_yields_one_field_issue_through_the_gateway() {
    let auth = spawn_auth_service().await;
    let users = spawn_router(users_service()).await;
    let gateway = spawn_gateway(
        vec![
            service("auth", "/", auth.port()),
            service("users", "/api/users", users.port()),
        ],
        default_rate_limit(),
    )
    .await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/api/users/login", gateway))
        .json(&serde_json::json!({"email": "not-an-email", "password": "pw"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], Value::Bool(false));
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let details = body["error"]["details"].as_array().unwrap();
    assert_eq!(details.len(), 1);
    assert!(details[0]["field"].as_str().unwrap().ends_with("email"));
}

#[tokio::test]
async fn test_valid_login_passes_validation_and_echoes_coerced_body() {
    let users = spawn_router(users_service()).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/api/users/login", users))
        .json(&serde_json::json!({
            "email": "ada@example.com",
            "password": "pw",
            "extra": "stripped"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert!(body["data"].get("extra").is_none());
}
