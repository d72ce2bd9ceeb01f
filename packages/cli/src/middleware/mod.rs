//! Middleware for authentication, rate limiting, response headers, and panics

pub mod auth;
pub mod rate_limit;
pub mod security_headers;

pub use auth::{agent_auth_middleware, AuthState};
pub use rate_limit::{auth_failure_guard, rate_limit_middleware, RateLimitConfig, RateLimitLayer};
pub use security_headers::with_security_headers;

use axum::{http::StatusCode, response::Response};
use benos_api::error_response;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

/// Create a panic handler that returns the standard error envelope
pub fn create_panic_handler(
) -> CatchPanicLayer<fn(Box<dyn std::any::Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(handle_panic)
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let panic_message = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic occurred"
    };

    error!(
        request_id = %benos_api::current_request_id(),
        panic_message = %panic_message,
        audit = true,
        "Server panic occurred"
    );

    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Internal server error",
    )
}
