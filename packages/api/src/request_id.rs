// ABOUTME: Request id propagation for the HTTP API
// ABOUTME: Reuses or mints an x-request-id and makes it visible to error responses

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied id accepted as-is
const MAX_REQUEST_ID_LENGTH: usize = 128;

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Request id attached to the request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Id of the request being served, or a fresh one outside a request scope
pub fn current_request_id() -> String {
    REQUEST_ID
        .try_with(Clone::clone)
        .unwrap_or_else(|_| Uuid::new_v4().to_string())
}

fn incoming_id(request: &Request) -> Option<String> {
    let value = request.headers().get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let acceptable = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LENGTH
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    acceptable.then(|| value.to_string())
}

/// Scope every request under an id and echo it back in the response headers
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = incoming_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = REQUEST_ID.scope(id.clone(), next.run(request)).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn with_header(value: &str) -> Request {
        Request::builder()
            .header(REQUEST_ID_HEADER, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_incoming_id_accepts_simple_tokens() {
        assert_eq!(incoming_id(&with_header("abc-123_x")).as_deref(), Some("abc-123_x"));
    }

    #[test]
    fn test_incoming_id_rejects_junk() {
        assert_eq!(incoming_id(&with_header("has space")), None);
        assert_eq!(incoming_id(&with_header(&"a".repeat(200))), None);
        assert_eq!(incoming_id(&Request::new(Body::empty())), None);
    }

    #[tokio::test]
    async fn test_current_request_id_inside_scope() {
        let seen = REQUEST_ID
            .scope("req-1".to_string(), async { current_request_id() })
            .await;
        assert_eq!(seen, "req-1");
        assert_ne!(current_request_id(), "req-1");
    }
}
