// ABOUTME: Bearer API key authentication for the versioned API
// ABOUTME: Resolves the calling agent, checks its capabilities, and attaches it as the request actor

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use benos_core::Actor;
use benos_projects::DbState;
use benos_security::Capability;
use tracing::{debug, warn};

use crate::error::AppError;

/// Paths that don't require authentication
const WHITELISTED_PATHS: &[&str] = &["/api/health", "/api/status"];

#[derive(Clone)]
pub struct AuthState {
    pub db: DbState,
    pub dev_mode: bool,
}

impl AuthState {
    pub fn new(db: DbState, dev_mode: bool) -> Self {
        Self { db, dev_mode }
    }
}

fn requires_authentication(path: &str) -> bool {
    !WHITELISTED_PATHS
        .iter()
        .any(|&whitelisted| path.starts_with(whitelisted))
}

/// Key from `Authorization: Bearer <key>`
fn bearer_key(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let key = key.trim();
    (!key.is_empty()).then_some(key)
}

pub async fn agent_auth_middleware(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();

    if !requires_authentication(&path) {
        debug!(path = %path, "Path whitelisted, skipping key validation");
        return Ok(next.run(request).await);
    }

    if auth.dev_mode {
        debug!(path = %path, "Development mode active, acting as local user");
        request.extensions_mut().insert(Actor::local_user());
        return Ok(next.run(request).await);
    }

    let Some(key) = bearer_key(&request) else {
        warn!(path = %path, "Missing API key");
        return Err(AppError::unauthorized(
            "API key required. Include an Authorization: Bearer header.",
        ));
    };

    let Some(agent) = auth.db.agent_storage.verify_key(key).await? else {
        warn!(path = %path, "Invalid or inactive API key");
        return Err(AppError::unauthorized("Invalid or inactive API key"));
    };

    let required = Capability::required_for(request.method().as_str(), &path);
    if let Some(requirement) = required.into_iter().find(|r| !agent.allows(*r)) {
        warn!(
            agent_id = %agent.id,
            path = %path,
            required = %requirement,
            audit = true,
            "Agent lacks capability"
        );
        return Err(AppError::forbidden(format!(
            "Agent lacks the '{}' capability",
            requirement
        )));
    }

    debug!(agent_id = %agent.id, path = %path, "Agent authenticated");
    request.extensions_mut().insert(agent.actor());
    request.extensions_mut().insert(agent);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(header: Option<&str>) -> Request {
        let builder = Request::builder().uri("/api/v1/areas");
        let builder = match header {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        };
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_key_parsing() {
        assert_eq!(bearer_key(&request_with(Some("Bearer benos_abc"))), Some("benos_abc"));
        assert_eq!(bearer_key(&request_with(Some("bearer  benos_abc "))), Some("benos_abc"));
        assert_eq!(bearer_key(&request_with(Some("Basic dXNlcjpwYXNz"))), None);
        assert_eq!(bearer_key(&request_with(Some("Bearer "))), None);
        assert_eq!(bearer_key(&request_with(None)), None);
    }

    #[test]
    fn test_whitelist() {
        assert!(!requires_authentication("/api/health"));
        assert!(!requires_authentication("/api/status"));
        assert!(requires_authentication("/api/v1/tasks"));
        assert!(requires_authentication("/api/v1/agents/me"));
    }
}
