//! The identity resolved for a request.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Claims, TokenPurpose};

/// Which credential scheme produced the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    ApiToken,
    BearerToken,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::ApiToken => "api_token",
            CredentialSource::BearerToken => "bearer_token",
        }
    }
}

/// Resolved identity attached to request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub source: CredentialSource,
    pub claims: Claims,
}

impl ResolvedIdentity {
    pub fn api_token(claims: Claims) -> Self {
        Self {
            source: CredentialSource::ApiToken,
            claims,
        }
    }

    pub fn bearer(claims: Claims) -> Self {
        Self {
            source: CredentialSource::BearerToken,
            claims,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.claims.sub
    }

    pub fn organisation_id(&self) -> Option<Uuid> {
        self.claims.organisation_id
    }

    pub fn purpose(&self) -> TokenPurpose {
        self.claims.purpose()
    }

    pub fn is_api_user(&self) -> bool {
        self.source == CredentialSource::ApiToken && self.claims.is_api_user
    }

    pub fn is_super_admin(&self) -> bool {
        self.claims.is_super_admin
    }

    /// Super admins administer every organisation.
    pub fn is_organisation_admin(&self) -> bool {
        self.claims.is_organisation_admin || self.claims.is_super_admin
    }

    pub fn to_response(&self) -> IdentityResponse {
        IdentityResponse {
            user_id: self.user_id(),
            organisation_id: self.organisation_id(),
            is_organisation_admin: self.is_organisation_admin(),
            is_super_admin: self.is_super_admin(),
            is_api_user: self.is_api_user(),
            source: self.source,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityResponse {
    pub user_id: Uuid,
    pub organisation_id: Option<Uuid>,
    pub is_organisation_admin: bool,
    pub is_super_admin: bool,
    pub is_api_user: bool,
    pub source: CredentialSource,
}
