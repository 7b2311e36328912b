use service_core::error::AppError;
use thiserror::Error;

use super::token::TokenError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invite is invalid or has already been used")]
    InviteInvalid,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("An organisation must be selected for this operation")]
    OrganisationRequired,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Label used for resolution metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Token(e) => e.kind(),
            ServiceError::InvalidCredentials => "invalid_credentials",
            ServiceError::InviteInvalid => "invite_invalid",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::OrganisationRequired => "organisation_required",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Validation(_) => "validation",
            ServiceError::Database(_) => "database",
            ServiceError::Email(_) => "email",
            ServiceError::Internal(_) => "internal",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthorized(msg) => AppError::Unauthorized(anyhow::anyhow!(msg)),
            // Token failure kinds are distinguished in logs only.
            ServiceError::Token(e) => {
                tracing::debug!(kind = e.kind(), "Token rejected");
                AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token, please re-authenticate"))
            }
            ServiceError::InvalidCredentials => AppError::AuthError(anyhow::anyhow!("Invalid credentials")),
            ServiceError::InviteInvalid => {
                AppError::Forbidden(anyhow::anyhow!("Invite is invalid or has already been used"))
            }
            ServiceError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::OrganisationRequired => AppError::BadRequest(anyhow::anyhow!(
                "An organisation must be selected for this operation"
            )),
            ServiceError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::Email(e) => AppError::EmailError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
