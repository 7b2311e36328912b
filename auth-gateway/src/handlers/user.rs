use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::ErrorResponse,
    middleware::AuthIdentity,
    models::{PasswordChangeRequest, SuperAdminStatusRequest, UpdateUserRequest, UserResponse},
    utils::ValidatedJson,
    AppState,
};

/// Get details of the logged in user
#[utoipa::path(
    get,
    path = "/auth/user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.auth.current_user(&identity).await?))
}

/// Update details for the logged in user
#[utoipa::path(
    patch,
    path = "/auth/user",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.auth.update_user(&identity, req).await?))
}

/// Set a new password, either from a session or with a reset token
#[utoipa::path(
    patch,
    path = "/auth/user/password",
    request_body = PasswordChangeRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Token invalid or already used", body = ErrorResponse),
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn update_password(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    ValidatedJson(req): ValidatedJson<PasswordChangeRequest>,
) -> Result<StatusCode, AppError> {
    state.auth.update_password(&identity, req.new_password).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set the user's super admin status
#[utoipa::path(
    patch,
    path = "/auth/users/{user_id}/super-admin",
    params(("user_id" = Uuid, Path, description = "User to update")),
    request_body = SuperAdminStatusRequest,
    responses(
        (status = 204, description = "Status updated"),
        (status = 403, description = "Super admin required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    tag = "User",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn set_super_admin(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SuperAdminStatusRequest>,
) -> Result<StatusCode, AppError> {
    state.auth.set_super_admin(user_id, req.is_super_admin).await?;
    Ok(StatusCode::NO_CONTENT)
}
