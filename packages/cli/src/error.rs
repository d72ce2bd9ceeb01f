// ABOUTME: Error type for server middleware that rejects requests before they reach a handler
// ABOUTME: Renders the shared JSON error envelope plus rate limit headers

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use benos_api::error_response;
use benos_storage::StorageError;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: u64, limit: u32 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn to_status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED")
            }
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn to_user_message(&self) -> String {
        match self {
            AppError::Unauthorized { message } | AppError::Forbidden { message } => {
                message.clone()
            }
            AppError::RateLimitExceeded { .. } => {
                "Too many requests. Please try again later".to_string()
            }
            AppError::Storage(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_status_and_code();

        match &self {
            AppError::Storage(err) => {
                error!(
                    request_id = %benos_api::current_request_id(),
                    storage_error = %err,
                    "Storage failure in middleware"
                );
            }
            _ => {
                info!(error_code = %code, error = %self, "Request rejected");
            }
        }

        let mut response = error_response(status, code, self.to_user_message());

        if let AppError::RateLimitExceeded { retry_after, limit } = &self {
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static("retry-after"),
                HeaderValue::from(*retry_after),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(*limit),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from_static("0"),
            );
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::unauthorized("no key").to_status_and_code(),
            (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
        );
        assert_eq!(
            AppError::forbidden("nope").to_status_and_code(),
            (StatusCode::FORBIDDEN, "FORBIDDEN")
        );
        let limited = AppError::RateLimitExceeded {
            retry_after: 3,
            limit: 60,
        };
        assert_eq!(
            limited.to_status_and_code(),
            (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED")
        );
    }

    #[test]
    fn test_rate_limit_headers() {
        let response = AppError::RateLimitExceeded {
            retry_after: 3,
            limit: 60,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "3");
        assert_eq!(response.headers()["x-ratelimit-limit"], "60");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    }

    #[test]
    fn test_storage_detail_is_hidden() {
        let err = AppError::Storage(StorageError::Database("disk I/O error at /secret".into()));
        assert_eq!(err.to_user_message(), "Internal server error");
    }
}
