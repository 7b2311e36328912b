//! Invite lifecycle: issue, resend, redeem, and direct provisioning.

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use super::auth::AuthService;
use crate::models::{
    Claims, LoginOptions, Membership, MembershipState, Organisation, OrganisationUser,
    ResolvedIdentity, User,
};
use crate::services::messages::Locale;
use crate::services::metrics::record_invite;
use crate::services::ServiceError;

/// An invite ready for delivery.
#[derive(Debug, Clone)]
pub struct IssuedInvite {
    pub user: User,
    pub organisation: Organisation,
    pub token: String,
}

impl AuthService {
    /// Create (or reopen) an invited membership and mint its invite token.
    pub async fn invite(
        &self,
        organisation_id: Uuid,
        email: &str,
        as_admin: bool,
    ) -> Result<IssuedInvite, ServiceError> {
        let organisation = self.open_organisation(organisation_id).await?;
        let user = self.find_or_create_user(email).await?;

        let membership = Membership::invited(user.id, organisation.id, as_admin);
        self.store.create_membership(&membership).await?;

        let token = self.mint_invite(&membership)?;
        record_invite("issued");
        tracing::info!(
            user_id = %user.id,
            organisation_id = %organisation.id,
            as_admin,
            "Invite issued"
        );

        Ok(IssuedInvite {
            user,
            organisation,
            token,
        })
    }

    /// Re-mint the token for a membership still awaiting redemption.
    pub async fn resend_invite(&self, organisation_id: Uuid, email: &str) -> Result<IssuedInvite, ServiceError> {
        let organisation = self.open_organisation(organisation_id).await?;
        let not_found = || ServiceError::NotFound("Invite".to_string());

        let user = self.store.find_user_by_email(email).await?.ok_or_else(not_found)?;
        let membership = self
            .store
            .find_membership(user.id, organisation.id)
            .await?
            .ok_or_else(not_found)?;
        if membership.state() != MembershipState::Invited {
            return Err(not_found());
        }

        let token = self.mint_invite(&membership)?;
        record_invite("resent");
        tracing::info!(user_id = %user.id, organisation_id = %organisation.id, "Invite resent");

        Ok(IssuedInvite {
            user,
            organisation,
            token,
        })
    }

    /// Deliver an invite link without holding up the response.
    pub fn send_invite_in_background(&self, invite: &IssuedInvite) {
        let email = Arc::clone(&self.email);
        let base_url = self.base_url.clone();
        let to_email = invite.user.email.clone();
        let organisation = invite.organisation.clone();
        let token = invite.token.clone();
        let locale = Locale::from_tag(&organisation.language);
        tokio::spawn(async move {
            if let Err(e) = email
                .send_invite_email(&to_email, &organisation, &token, &base_url, locale)
                .await
            {
                tracing::error!(error = %e, organisation_id = %organisation.id, "Failed to deliver invite email");
            }
        });
    }

    /// Redeem the invite carried by `identity` and return a session for it.
    ///
    /// The membership moves out of the invited state atomically, and only for
    /// the invitation the token was minted for. A second redemption, or one
    /// after the membership was removed and reopened, fails with `InviteInvalid`.
    pub async fn accept_invite(&self, identity: &ResolvedIdentity) -> Result<LoginOptions, ServiceError> {
        let organisation_id = identity.organisation_id().ok_or(ServiceError::InviteInvalid)?;
        let invited = identity.claims.invited_at().ok_or(ServiceError::InviteInvalid)?;

        let user = self
            .store
            .find_user_by_id(identity.user_id())
            .await?
            .ok_or(ServiceError::InviteInvalid)?;
        let organisation = self
            .store
            .find_organisation(organisation_id)
            .await?
            .filter(|o| o.is_active())
            .ok_or(ServiceError::InviteInvalid)?;

        if !self.store.accept_membership(user.id, organisation.id, invited).await? {
            record_invite("rejected");
            tracing::info!(user_id = %user.id, %organisation_id, "Invite redemption rejected");
            return Err(ServiceError::InviteInvalid);
        }

        let is_admin = self
            .store
            .find_membership(user.id, organisation.id)
            .await?
            .map(|m| m.is_admin)
            .unwrap_or(false);

        record_invite("accepted");
        tracing::info!(user_id = %user.id, %organisation_id, "Invite accepted");

        let mut organisations = BTreeMap::new();
        organisations.insert(
            organisation.id,
            self.organisation_token(&user, organisation, is_admin)?,
        );

        Ok(LoginOptions {
            user: user.sanitized(),
            organisations,
            first_time_setup: user.needs_first_time_setup(),
        })
    }

    /// Add a member directly, skipping the invite step.
    pub async fn provision_member(
        &self,
        organisation_id: Uuid,
        email: &str,
        as_admin: bool,
    ) -> Result<OrganisationUser, ServiceError> {
        let organisation = self.open_organisation(organisation_id).await?;
        let user = self.find_or_create_user(email).await?;
        let membership = Membership::accepted(user.id, organisation.id, as_admin);

        self.store.create_membership(&membership).await?;
        record_invite("provisioned");
        tracing::info!(user_id = %user.id, %organisation_id, as_admin, "Member provisioned");

        Ok(OrganisationUser {
            user: user.sanitized(),
            state: membership.state(),
            invited: membership.invited,
            accepted: membership.accepted,
            is_admin: membership.is_admin,
        })
    }

    fn mint_invite(&self, membership: &Membership) -> Result<String, ServiceError> {
        let claims = Claims::invite(
            membership.user_id,
            membership.organisation_id,
            membership.invited,
            self.tokens.invite_ttl(),
        );
        Ok(self.codec.mint(&claims)?)
    }

    /// The organisation, provided it exists and accepts new members.
    async fn open_organisation(&self, organisation_id: Uuid) -> Result<Organisation, ServiceError> {
        let organisation = self
            .store
            .find_organisation(organisation_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Organisation".to_string()))?;
        if !organisation.is_active() {
            return Err(ServiceError::Conflict(
                "cannot invite user to deactivated organisation".to_string(),
            ));
        }
        Ok(organisation)
    }

    async fn find_or_create_user(&self, email: &str) -> Result<User, ServiceError> {
        if let Some(user) = self.store.find_user_by_email(email).await? {
            return Ok(user);
        }

        let user = User::new(email);
        match self.store.create_user(&user).await {
            Ok(()) => Ok(user),
            // Lost a race with a concurrent invite for the same address.
            Err(ServiceError::Conflict(_)) => self
                .store
                .find_user_by_email(email)
                .await?
                .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("user vanished after conflict"))),
            Err(e) => Err(e),
        }
    }
}
