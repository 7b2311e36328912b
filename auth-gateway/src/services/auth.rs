//! Login, password reset and the current user's profile.
//!
//! Invite handling lives in `invitation.rs` and organisation management in
//! `organisation.rs`; both extend [`AuthService`].

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::TokenConfig;
use crate::models::{
    Claims, LoginOptions, Organisation, OrganisationToken, ResolvedIdentity, TokenPurpose,
    UpdateUserRequest, User, UserResponse,
};
use crate::services::email::EmailProvider;
use crate::services::messages::Locale;
use crate::services::metrics::{record_login, record_password_reset};
use crate::services::store::IdentityStore;
use crate::services::token::TokenCodec;
use crate::services::ServiceError;
use crate::utils::{hash_password, verify_against_dummy, verify_password, Password, PasswordHashString};

#[derive(Clone)]
pub struct AuthService {
    pub(crate) store: Arc<dyn IdentityStore>,
    pub(crate) codec: TokenCodec,
    pub(crate) tokens: TokenConfig,
    pub(crate) email: Arc<dyn EmailProvider>,
    pub(crate) base_url: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        codec: TokenCodec,
        tokens: TokenConfig,
        email: Arc<dyn EmailProvider>,
        base_url: String,
    ) -> Self {
        Self {
            store,
            codec,
            tokens,
            email,
            base_url,
        }
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    /// Verify email/password and mint one session token per organisation.
    ///
    /// Unknown email and wrong password produce the same error after the same
    /// amount of hashing work.
    pub async fn login(&self, email: &str, password: String) -> Result<LoginOptions, ServiceError> {
        let user = self.store.find_user_by_email(email).await?;
        let stored_hash = user.as_ref().and_then(|u| u.password_hash.clone());

        let verified = tokio::task::spawn_blocking(move || {
            let password = Password::new(password);
            match stored_hash {
                Some(hash) => verify_password(&password, &PasswordHashString::new(hash)).is_ok(),
                None => verify_against_dummy(&password).is_ok(),
            }
        })
        .await
        .map_err(|e| ServiceError::Internal(e.into()))?;

        let user = match user {
            Some(user) if verified => user,
            _ => {
                record_login("invalid_credentials");
                tracing::info!("Login rejected: invalid credentials");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        let options = self.login_options(&user).await?;
        if options.organisations.is_empty() {
            record_login("no_organisations");
            tracing::info!(user_id = %user.id, "Login rejected: no active organisations");
            return Err(ServiceError::Unauthorized(
                "user does not belong to any organisations".to_string(),
            ));
        }

        record_login("success");
        tracing::info!(
            user_id = %user.id,
            organisations = options.organisations.len(),
            "User logged in"
        );
        Ok(options)
    }

    /// Every organisation the user may act in, each with its own token.
    ///
    /// Super admins see all active organisations with admin rights.
    pub(crate) async fn login_options(&self, user: &User) -> Result<LoginOptions, ServiceError> {
        let mut entries: BTreeMap<Uuid, (Organisation, bool)> = BTreeMap::new();

        for membership in self.store.list_active_memberships(user.id).await? {
            entries.insert(
                membership.organisation.id,
                (membership.organisation, membership.is_admin),
            );
        }

        if user.is_super_admin {
            for organisation in self.store.list_active_organisations().await? {
                entries.insert(organisation.id, (organisation, true));
            }
        }

        let mut organisations = BTreeMap::new();
        for (id, (organisation, is_admin)) in entries {
            organisations.insert(id, self.organisation_token(user, organisation, is_admin)?);
        }

        Ok(LoginOptions {
            user: user.sanitized(),
            organisations,
            first_time_setup: user.needs_first_time_setup(),
        })
    }

    pub(crate) fn organisation_token(
        &self,
        user: &User,
        organisation: Organisation,
        is_admin: bool,
    ) -> Result<OrganisationToken, ServiceError> {
        let claims = Claims::session(
            user.id,
            organisation.id,
            is_admin,
            user.is_super_admin,
            self.tokens.auth_token_ttl(),
        );
        Ok(OrganisationToken {
            token: self.codec.mint(&claims)?,
            organisation,
            is_organisation_admin: is_admin,
        })
    }

    /// Mint a reset token for `email`, or `None` when no such user exists.
    ///
    /// Callers must respond identically in both cases.
    pub async fn password_reset_token(&self, email: &str) -> Result<Option<(User, String)>, ServiceError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            record_password_reset("unknown_email");
            tracing::warn!("Password reset requested for unknown email");
            return Ok(None);
        };

        let claims = Claims::password_reset(user.id, self.tokens.password_reset_ttl());
        let token = self.codec.mint(&claims)?;
        record_password_reset("issued");
        tracing::info!(user_id = %user.id, "Password reset token issued");
        Ok(Some((user, token)))
    }

    /// Deliver a reset link in `locale` without holding up the response.
    pub fn send_password_reset_in_background(&self, to_email: String, token: String, locale: Locale) {
        let email = Arc::clone(&self.email);
        let base_url = self.base_url.clone();
        tokio::spawn(async move {
            if let Err(e) = email
                .send_password_reset_email(&to_email, &token, &base_url, locale)
                .await
            {
                tracing::error!(error = %e, "Failed to deliver password reset email");
            }
        });
    }

    /// Set a new password for the acting user.
    ///
    /// A reset token is single-use: the update only applies while the stored
    /// credential predates the token.
    pub async fn update_password(
        &self,
        identity: &ResolvedIdentity,
        new_password: String,
    ) -> Result<(), ServiceError> {
        let is_reset = identity.purpose() == TokenPurpose::PasswordReset;
        let issued_before = if is_reset { identity.claims.issued_at() } else { None };

        let hash = tokio::task::spawn_blocking(move || hash_password(&Password::new(new_password)))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))??;

        let updated = self
            .store
            .update_credential(identity.user_id(), hash.as_str(), issued_before)
            .await?;

        if !updated {
            if is_reset {
                record_password_reset("rejected");
                return Err(ServiceError::Unauthorized(
                    "password reset token has already been used".to_string(),
                ));
            }
            return Err(ServiceError::NotFound("User".to_string()));
        }

        if is_reset {
            record_password_reset("completed");
        }
        tracing::info!(user_id = %identity.user_id(), via_reset = is_reset, "Password updated");
        Ok(())
    }

    pub async fn current_user(&self, identity: &ResolvedIdentity) -> Result<UserResponse, ServiceError> {
        self.store
            .find_user_by_id(identity.user_id())
            .await?
            .map(|u| u.sanitized())
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))
    }

    pub async fn update_user(
        &self,
        identity: &ResolvedIdentity,
        req: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        let user = self
            .store
            .update_display_name(identity.user_id(), req.display_name.trim())
            .await?;
        Ok(user.sanitized())
    }

    pub async fn set_super_admin(&self, user_id: Uuid, is_super_admin: bool) -> Result<(), ServiceError> {
        if !self.store.set_super_admin(user_id, is_super_admin).await? {
            return Err(ServiceError::NotFound("User".to_string()));
        }
        tracing::info!(%user_id, is_super_admin, "Super admin status changed");
        Ok(())
    }
}
