//! Login and invite-redemption response shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{Organisation, UserResponse};

/// Request to login with email/password.
#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Request to start a password reset.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
    /// Language of the reset email, e.g. `es`. English when absent or unsupported.
    #[serde(default)]
    #[schema(example = "en")]
    pub locale: Option<String>,
}

/// One organisation a user may act in, with the token scoped to it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrganisationToken {
    pub organisation: Organisation,
    pub token: String,
    pub is_organisation_admin: bool,
}

/// Shared response of login and invite redemption.
///
/// The client auto-selects when there is exactly one entry and asks the user
/// otherwise.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginOptions {
    pub user: UserResponse,
    pub organisations: BTreeMap<Uuid, OrganisationToken>,
    pub first_time_setup: bool,
}
