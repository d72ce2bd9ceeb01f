// ABOUTME: Request extractors for API handlers
// ABOUTME: Caller identity plus JSON, query, and path extraction that reject with the error envelope

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use benos_core::{parse_uuid, Actor};
use benos_security::{Agent, Requirement};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use tracing::warn;

use crate::response::ApiError;

/// Who the request is acting as.
///
/// The auth layer stores an [`Actor`] in the request extensions. Requests
/// that never passed through it act as the local user.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .extensions
            .get::<Actor>()
            .cloned()
            .unwrap_or_else(Actor::local_user);
        Ok(Self(actor))
    }
}

/// The agent whose key authenticated the request
#[derive(Debug, Clone)]
pub struct CurrentAgent(pub Agent);

impl<S> FromRequestParts<S> for CurrentAgent
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Agent>()
            .cloned()
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("request was not made with an agent key".to_string()))
    }
}

/// The authenticating agent, or `None` for local-user requests
#[derive(Debug, Clone)]
pub struct MaybeAgent(pub Option<Agent>);

impl MaybeAgent {
    /// Checks a requirement only known after the body is parsed.
    /// Local-user requests carry no capability limits.
    pub fn require(&self, requirement: Requirement) -> Result<(), ApiError> {
        match &self.0 {
            Some(agent) if !agent.allows(requirement) => {
                warn!(
                    agent_id = %agent.id,
                    required = %requirement,
                    audit = true,
                    "Agent lacks capability"
                );
                Err(ApiError::Forbidden(format!(
                    "Agent lacks the '{}' capability",
                    requirement
                )))
            }
            _ => Ok(()),
        }
    }
}

impl<S> FromRequestParts<S> for MaybeAgent
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Agent>().cloned()))
    }
}

/// `Json` that rejects with a 400 envelope
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query` that rejects with a 400 envelope
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Single `{id}` path segment, validated as a UUID
#[derive(Debug, Clone)]
pub struct EntityId(pub String);

impl<S> FromRequestParts<S> for EntityId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state).await?;
        Ok(Self(parse_uuid("id", &raw)?))
    }
}

/// `{id}/.../{version}` path pair for PRD version routes
#[derive(Debug, Clone)]
pub struct VersionPath {
    pub id: String,
    pub version: i64,
}

impl<S> FromRequestParts<S> for VersionPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((raw, version)) = Path::<(String, i64)>::from_request_parts(parts, state).await?;
        if version < 1 {
            return Err(ApiError::Validation("version must be at least 1".to_string()));
        }
        Ok(Self {
            id: parse_uuid("id", &raw)?,
            version,
        })
    }
}
