//! Login, identity, password reset and invite redemption.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{ErrorResponse, MessageResponse},
    middleware::AuthIdentity,
    models::{IdentityResponse, LoginOptions, LoginRequest, PasswordResetRequest},
    services::Locale,
    utils::ValidatedJson,
    AppState,
};

/// Login with email and password.
///
/// Returns one scoped token per organisation the user belongs to.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login options", body = LoginOptions),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginOptions>, AppError> {
    let options = state.auth.login(&req.email, req.password).await?;
    Ok(Json(options))
}

/// The identity resolved for the current credentials.
#[utoipa::path(
    get,
    path = "/auth/identity",
    responses(
        (status = 200, description = "Resolved identity", body = IdentityResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    tag = "Authentication",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn identity(AuthIdentity(identity): AuthIdentity) -> Json<IdentityResponse> {
    Json(identity.to_response())
}

/// Email a password reset link.
///
/// The response is the same whether or not the address is known.
#[utoipa::path(
    post,
    path = "/auth/request-password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset requested", body = MessageResponse),
    ),
    tag = "Authentication"
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if let Some((user, token)) = state.auth.password_reset_token(&req.email).await? {
        let locale = req.locale.as_deref().map(Locale::from_tag).unwrap_or_default();
        state.auth.send_password_reset_in_background(user.email, token, locale);
    }

    Ok(Json(MessageResponse::new(
        "If the address is registered, a password reset email has been sent",
    )))
}

/// Redeem an invite presented as a bearer token.
#[utoipa::path(
    post,
    path = "/auth/organisation/invite/accept",
    responses(
        (status = 200, description = "Invite accepted", body = LoginOptions),
        (status = 403, description = "Invite invalid, expired or already used", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []))
)]
pub async fn accept_invite(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
) -> Result<Json<LoginOptions>, AppError> {
    let options = state.auth.accept_invite(&identity).await?;
    Ok(Json(options))
}
