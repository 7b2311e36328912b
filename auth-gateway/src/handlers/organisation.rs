//! Organisation, membership and invite endpoints.
//!
//! Routes under `/auth/organisation` act on the organisation the caller's
//! token is scoped to.

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
    models::{
        AdminStatusRequest, CreateOrganisationRequest, InviteRequest, InviteResponse, Organisation,
        OrganisationUser, ResendInviteRequest, UpdateOrganisationRequest,
    },
    utils::ValidatedJson,
    AppState,
};

/// Create a new organisation
#[utoipa::path(
    post,
    path = "/auth/organisation",
    request_body = CreateOrganisationRequest,
    responses(
        (status = 201, description = "Organisation created", body = Organisation),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Super admin required", body = ErrorResponse),
        (status = 409, description = "Short name already in use", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn create_organisation(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateOrganisationRequest>,
) -> Result<(StatusCode, Json<Organisation>), AppError> {
    let organisation = state.auth.create_organisation(req).await?;
    Ok((StatusCode::CREATED, Json(organisation)))
}

/// Get the organisation of the current session
#[utoipa::path(
    get,
    path = "/auth/organisation",
    responses(
        (status = 200, description = "Current organisation", body = Organisation),
        (status = 400, description = "No organisation selected", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn get_organisation(
    State(state): State<AppState>,
    identity: AuthIdentity,
) -> Result<Json<Organisation>, AppError> {
    let organisation = state.auth.get_organisation(identity.organisation_id()?).await?;
    Ok(Json(organisation))
}

/// Update the current organisation
#[utoipa::path(
    patch,
    path = "/auth/organisation",
    request_body = UpdateOrganisationRequest,
    responses(
        (status = 200, description = "Updated organisation", body = Organisation),
        (status = 403, description = "Organisation admin required", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn update_organisation(
    State(state): State<AppState>,
    identity: AuthIdentity,
    ValidatedJson(req): ValidatedJson<UpdateOrganisationRequest>,
) -> Result<Json<Organisation>, AppError> {
    let organisation = state
        .auth
        .update_organisation(identity.organisation_id()?, req)
        .await?;
    Ok(Json(organisation))
}

/// List all active organisations
#[utoipa::path(
    get,
    path = "/auth/organisations",
    responses(
        (status = 200, description = "Active organisations", body = [Organisation]),
        (status = 403, description = "Super admin required", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn list_organisations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Organisation>>, AppError> {
    Ok(Json(state.auth.list_organisations().await?))
}

/// Deactivate an organisation
#[utoipa::path(
    delete,
    path = "/auth/organisations/{organisation_id}",
    params(("organisation_id" = Uuid, Path, description = "Organisation to deactivate")),
    responses(
        (status = 204, description = "Organisation deactivated"),
        (status = 404, description = "Organisation not found or already deactivated", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn deactivate_organisation(
    State(state): State<AppState>,
    Path(organisation_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.auth.deactivate_organisation(organisation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List the users of the current organisation
#[utoipa::path(
    get,
    path = "/auth/organisation/users",
    responses(
        (status = 200, description = "Members and pending invites", body = [OrganisationUser]),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn organisation_users(
    State(state): State<AppState>,
    identity: AuthIdentity,
) -> Result<Json<Vec<OrganisationUser>>, AppError> {
    let users = state.auth.organisation_users(identity.organisation_id()?).await?;
    Ok(Json(users))
}

/// Add a member without an invite
#[utoipa::path(
    post,
    path = "/auth/organisation/users",
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Member added", body = OrganisationUser),
        (status = 403, description = "API token required", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("api_token" = []))
)]
pub async fn provision_member(
    State(state): State<AppState>,
    identity: AuthIdentity,
    ValidatedJson(req): ValidatedJson<InviteRequest>,
) -> Result<(StatusCode, Json<OrganisationUser>), AppError> {
    let member = state
        .auth
        .provision_member(identity.organisation_id()?, &req.user_email, req.as_admin)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Remove a user from the current organisation
#[utoipa::path(
    delete,
    path = "/auth/organisation/users/{user_id}",
    params(("user_id" = Uuid, Path, description = "User to remove")),
    responses(
        (status = 204, description = "User removed"),
        (status = 404, description = "Membership not found", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn remove_user(
    State(state): State<AppState>,
    identity: AuthIdentity,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.auth.remove_user(identity.organisation_id()?, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set a member's admin status
#[utoipa::path(
    patch,
    path = "/auth/organisation/users/{user_id}/admin",
    params(("user_id" = Uuid, Path, description = "Member to update")),
    request_body = AdminStatusRequest,
    responses(
        (status = 204, description = "Status updated"),
        (status = 403, description = "Organisation admin required", body = ErrorResponse),
        (status = 404, description = "Membership not found", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn set_admin(
    State(state): State<AppState>,
    identity: AuthIdentity,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AdminStatusRequest>,
) -> Result<StatusCode, AppError> {
    state
        .auth
        .set_admin(identity.organisation_id()?, user_id, req.is_admin)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Invite someone to join the current organisation
#[utoipa::path(
    post,
    path = "/auth/organisation/invite",
    request_body = InviteRequest,
    responses(
        (status = 202, description = "Invite issued and queued for delivery", body = InviteResponse),
        (status = 409, description = "Already a member, invite pending, or organisation deactivated", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn invite_user(
    State(state): State<AppState>,
    identity: AuthIdentity,
    ValidatedJson(req): ValidatedJson<InviteRequest>,
) -> Result<(StatusCode, Json<InviteResponse>), AppError> {
    let invite = state
        .auth
        .invite(identity.organisation_id()?, &req.user_email, req.as_admin)
        .await?;
    state.auth.send_invite_in_background(&invite);

    Ok((
        StatusCode::ACCEPTED,
        Json(InviteResponse {
            user_id: invite.user.id,
            organisation_id: invite.organisation.id,
        }),
    ))
}

/// Resend a pending invite
#[utoipa::path(
    post,
    path = "/auth/organisation/invite/resend",
    request_body = ResendInviteRequest,
    responses(
        (status = 202, description = "Invite re-issued", body = InviteResponse),
        (status = 404, description = "No pending invite", body = ErrorResponse),
    ),
    tag = "Organisations",
    security(("bearer_auth" = []), ("api_token" = []))
)]
pub async fn resend_invite(
    State(state): State<AppState>,
    identity: AuthIdentity,
    ValidatedJson(req): ValidatedJson<ResendInviteRequest>,
) -> Result<(StatusCode, Json<InviteResponse>), AppError> {
    let invite = state
        .auth
        .resend_invite(identity.organisation_id()?, &req.user_email)
        .await?;
    state.auth.send_invite_in_background(&invite);

    Ok((
        StatusCode::ACCEPTED,
        Json(InviteResponse {
            user_id: invite.user.id,
            organisation_id: invite.organisation.id,
        }),
    ))
}
