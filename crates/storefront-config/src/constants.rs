// ============================================================================
// Configuration Constants
// ============================================================================

/// Maximum accepted request body size, JSON and URL-encoded alike (100MB)
pub const MAX_REQUEST_BODY_SIZE: usize = 100 * 1024 * 1024;

/// Fixed timeout for forwarding a request to a backend service
pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Rate limit counting window (15 minutes)
pub const RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;

/// Requests per window for callers with an authenticated-user context
pub const AUTHENTICATED_MAX_REQUESTS: u64 = 1000;

/// Requests per window for anonymous callers
pub const ANONYMOUS_MAX_REQUESTS: u64 = 100;

/// Development port the auth service listens on
pub const AUTH_SERVICE_DEV_PORT: u16 = 6001;
