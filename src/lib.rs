// ============================================================================
// Storefront Server
// ============================================================================
//
// Edge layer for the storefront platform: an API gateway that fronts the
// independently deployed backend services, plus the auth backend service
// itself. The shared error/response/validation contract lives in the
// storefront-api crate; configuration in storefront-config.
//
// ============================================================================

pub mod auth_service;
pub mod gateway;
pub mod health;
pub mod rate_limit;
pub mod utils;
