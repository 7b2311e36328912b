//! Organisation and membership management.

use uuid::Uuid;

use super::auth::AuthService;
use crate::models::{CreateOrganisationRequest, Organisation, OrganisationUser, UpdateOrganisationRequest};
use crate::services::ServiceError;

impl AuthService {
    pub async fn create_organisation(&self, req: CreateOrganisationRequest) -> Result<Organisation, ServiceError> {
        let organisation = Organisation::new(req);
        self.store.create_organisation(&organisation).await?;
        tracing::info!(
            organisation_id = %organisation.id,
            short_name = %organisation.short_name,
            "Organisation created"
        );
        Ok(organisation)
    }

    pub async fn get_organisation(&self, organisation_id: Uuid) -> Result<Organisation, ServiceError> {
        self.store
            .find_organisation(organisation_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Organisation".to_string()))
    }

    pub async fn update_organisation(
        &self,
        organisation_id: Uuid,
        req: UpdateOrganisationRequest,
    ) -> Result<Organisation, ServiceError> {
        let mut organisation = self.get_organisation(organisation_id).await?;
        organisation.apply(req);
        self.store.update_organisation(&organisation).await?;
        tracing::info!(%organisation_id, "Organisation updated");
        Ok(organisation)
    }

    /// Outstanding session tokens for the organisation stay valid until they
    /// expire; login stops offering it immediately.
    pub async fn deactivate_organisation(&self, organisation_id: Uuid) -> Result<(), ServiceError> {
        if !self.store.deactivate_organisation(organisation_id).await? {
            return Err(ServiceError::NotFound("Organisation".to_string()));
        }
        tracing::info!(%organisation_id, "Organisation deactivated");
        Ok(())
    }

    pub async fn list_organisations(&self) -> Result<Vec<Organisation>, ServiceError> {
        self.store.list_active_organisations().await
    }

    pub async fn organisation_users(&self, organisation_id: Uuid) -> Result<Vec<OrganisationUser>, ServiceError> {
        self.store.organisation_users(organisation_id).await
    }

    pub async fn remove_user(&self, organisation_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        if !self.store.deactivate_membership(user_id, organisation_id).await? {
            return Err(ServiceError::NotFound("Membership".to_string()));
        }
        tracing::info!(%organisation_id, %user_id, "User removed from organisation");
        Ok(())
    }

    pub async fn set_admin(&self, organisation_id: Uuid, user_id: Uuid, is_admin: bool) -> Result<(), ServiceError> {
        if !self.store.set_admin_flag(user_id, organisation_id, is_admin).await? {
            return Err(ServiceError::NotFound("Membership".to_string()));
        }
        tracing::info!(%organisation_id, %user_id, is_admin, "Organisation admin status changed");
        Ok(())
    }
}
