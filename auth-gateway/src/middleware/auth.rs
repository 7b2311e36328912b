use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    models::ResolvedIdentity,
    services::{Access, RequestCredentials, ServiceError},
    AppState,
};

pub const API_TOKEN_HEADER: &str = "x-api-token";

#[derive(Debug, Deserialize)]
struct OrganisationQuery {
    organisation_id: Option<Uuid>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the caller's identity and enforce the route's [`Access`] level.
///
/// Attach with `from_fn_with_state((state, access), auth_middleware)`.
pub async fn auth_middleware(
    State((state, access)): State<(AppState, Access)>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_token = req
        .headers()
        .get(API_TOKEN_HEADER)
        .map(|value| value.as_bytes());

    // `organisation_id` only scopes the API-token identity.
    let organisation_id = match api_token {
        Some(_) => Query::<OrganisationQuery>::try_from_uri(req.uri())
            .map_err(|e| ServiceError::Validation(format!("Invalid organisation_id: {}", e)))?
            .0
            .organisation_id,
        None => None,
    };

    let credentials = RequestCredentials {
        api_token,
        bearer: bearer_token(req.headers()),
        organisation_id,
    };

    let identity = state.resolver.resolve_for(&credentials, access)?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Extractor for the identity resolved by [`auth_middleware`].
pub struct AuthIdentity(pub ResolvedIdentity);

impl AuthIdentity {
    /// Organisation the identity acts in. Routes behind an organisation
    /// access level always have one.
    pub fn organisation_id(&self) -> Result<Uuid, ServiceError> {
        self.0.organisation_id().ok_or(ServiceError::OrganisationRequired)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<ResolvedIdentity>()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Resolved identity missing from request extensions"
                ))
            })?;

        Ok(AuthIdentity(identity.clone()))
    }
}
