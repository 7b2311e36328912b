//! Credential resolution and purpose gating.
//!
//! Every protected route names an [`Access`] requirement. The resolver turns
//! the request's credentials into a [`ResolvedIdentity`] and then decides, in
//! one place, whether that identity's token purpose and flags satisfy the
//! requirement.

use chrono::Duration;
use subtle::{Choice, ConstantTimeEq};
use uuid::Uuid;

use crate::models::{Claims, CredentialSource, ResolvedIdentity, TokenPurpose};
use crate::services::metrics::record_resolution;
use crate::services::token::TokenCodec;
use crate::services::ServiceError;

/// Lifetime stamped on the synthetic API-token claims. They are never minted.
const API_IDENTITY_TTL_MINUTES: i64 = 5;

/// What a route requires of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Setting a new password; the only route a reset token may reach.
    CredentialUpdate,
    /// Redeeming an invite; only an invite token is accepted.
    InviteRedemption,
    /// Any session or API identity.
    Authenticated,
    /// A session scoped to an organisation.
    Organisation,
    /// An organisation-scoped session with admin rights there.
    OrganisationAdmin,
    SuperAdmin,
    /// The platform operator's API token.
    ApiOnly,
}

/// Raw credentials pulled off a request.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestCredentials<'a> {
    /// Raw `X-API-TOKEN` header value. Not required to be valid text.
    pub api_token: Option<&'a [u8]>,
    /// Token from `Authorization: Bearer`.
    pub bearer: Option<&'a str>,
    /// `organisation_id` query parameter.
    pub organisation_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct CredentialResolver {
    codec: TokenCodec,
    api_keys: Vec<String>,
    service_account_id: Uuid,
}

impl CredentialResolver {
    pub fn new(codec: TokenCodec, api_keys: Vec<String>, service_account_id: Uuid) -> Self {
        Self {
            codec,
            api_keys,
            service_account_id,
        }
    }

    /// Resolve credentials and check them against `access`.
    pub fn resolve_for(
        &self,
        credentials: &RequestCredentials<'_>,
        access: Access,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let source = if credentials.api_token.is_some() {
            "api_token"
        } else if credentials.bearer.is_some() {
            "bearer_token"
        } else {
            "none"
        };

        let result = self
            .resolve(credentials)
            .map_err(|e| match (access, e) {
                // Any unusable invite token reads the same to the caller.
                (Access::InviteRedemption, ServiceError::Token(_)) => ServiceError::InviteInvalid,
                (_, e) => e,
            })
            .and_then(|identity| authorize(&identity, access).map(|_| identity));

        match &result {
            Ok(identity) => {
                record_resolution(source, "accepted");
                tracing::debug!(
                    source,
                    user_id = %identity.user_id(),
                    organisation_id = ?identity.organisation_id(),
                    purpose = identity.purpose().as_str(),
                    "Credentials resolved"
                );
            }
            Err(e) => {
                record_resolution(source, e.kind());
                tracing::debug!(source, reason = e.kind(), ?access, "Credentials rejected");
            }
        }

        result
    }

    /// Determine the acting identity without any route requirement.
    ///
    /// An API token wins over a bearer token when both are present.
    pub fn resolve(&self, credentials: &RequestCredentials<'_>) -> Result<ResolvedIdentity, ServiceError> {
        if let Some(api_token) = credentials.api_token {
            if !self.is_valid_api_key(api_token) {
                return Err(ServiceError::Unauthorized("could not validate API key".to_string()));
            }

            // Operator tokens may act in any organisation; membership is not checked.
            let claims = Claims::api_user(
                self.service_account_id,
                credentials.organisation_id,
                Duration::minutes(API_IDENTITY_TTL_MINUTES),
            );
            return Ok(ResolvedIdentity::api_token(claims));
        }

        if let Some(bearer) = credentials.bearer {
            let claims = self.codec.validate(bearer)?;
            return Ok(ResolvedIdentity::bearer(claims));
        }

        Err(ServiceError::Unauthorized("no credentials supplied".to_string()))
    }

    fn is_valid_api_key(&self, candidate: &[u8]) -> bool {
        let matched = self
            .api_keys
            .iter()
            .fold(Choice::from(0), |acc, key| acc | key.as_bytes().ct_eq(candidate));
        bool::from(matched)
    }
}

/// Purpose and flag gating for a resolved identity.
pub fn authorize(identity: &ResolvedIdentity, access: Access) -> Result<(), ServiceError> {
    let purpose = identity.purpose();
    let wrong_purpose = || ServiceError::Unauthorized(format!("{} token not accepted here", purpose.as_str()));

    match access {
        Access::CredentialUpdate => match purpose {
            TokenPurpose::Invite => Err(wrong_purpose()),
            _ => Ok(()),
        },
        Access::InviteRedemption => match (identity.source, purpose) {
            (CredentialSource::BearerToken, TokenPurpose::Invite) => Ok(()),
            _ => Err(ServiceError::InviteInvalid),
        },
        _ if matches!(purpose, TokenPurpose::PasswordReset | TokenPurpose::Invite) => Err(wrong_purpose()),
        Access::Authenticated => Ok(()),
        Access::Organisation => require_organisation(identity),
        Access::OrganisationAdmin => {
            require_organisation(identity)?;
            if identity.is_organisation_admin() {
                Ok(())
            } else {
                Err(ServiceError::Forbidden("organisation admin required".to_string()))
            }
        }
        Access::SuperAdmin => {
            if identity.is_super_admin() {
                Ok(())
            } else {
                Err(ServiceError::Forbidden("super admin required".to_string()))
            }
        }
        Access::ApiOnly => {
            if identity.is_api_user() {
                Ok(())
            } else {
                Err(ServiceError::Forbidden("API token required".to_string()))
            }
        }
    }
}

fn require_organisation(identity: &ResolvedIdentity) -> Result<(), ServiceError> {
    match identity.organisation_id() {
        Some(_) => Ok(()),
        None => Err(ServiceError::OrganisationRequired),
    }
}
