//! Persistence of users, organisations and memberships.
//!
//! Every conditional transition (accepting an invite, a single-use credential
//! update, reopening a removed membership) is a single atomic statement so two
//! concurrent callers can never both succeed.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Membership, Organisation, OrganisationMembership, OrganisationUser, User};
use crate::services::ServiceError;

pub use memory::InMemoryStore;
pub use postgres::PgIdentityStore;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    // Users

    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;

    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), ServiceError>;

    async fn update_display_name(&self, user_id: Uuid, display_name: &str) -> Result<User, ServiceError>;

    /// Store a new credential hash.
    ///
    /// With `issued_before` set, the update only applies while the stored
    /// `password_last_updated` is absent or earlier than it. Returns whether
    /// a row was updated.
    async fn update_credential(
        &self,
        user_id: Uuid,
        password_hash: &str,
        issued_before: Option<DateTime<Utc>>,
    ) -> Result<bool, ServiceError>;

    async fn set_super_admin(&self, user_id: Uuid, is_super_admin: bool) -> Result<bool, ServiceError>;

    // Memberships

    /// Accepted, non-deactivated memberships in non-deactivated organisations.
    async fn list_active_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrganisationMembership>, ServiceError>;

    async fn find_membership(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
    ) -> Result<Option<Membership>, ServiceError>;

    /// Insert a membership, or reopen a deactivated one for the same pair.
    ///
    /// Fails with `Conflict` when a pending or active membership exists.
    async fn create_membership(&self, membership: &Membership) -> Result<(), ServiceError>;

    /// Move the invitation issued at `invited` to accepted. Returns false when
    /// the row is missing, already accepted, deactivated, or was reopened by a
    /// later invitation.
    async fn accept_membership(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
        invited: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;

    async fn deactivate_membership(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
    ) -> Result<bool, ServiceError>;

    async fn set_admin_flag(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
        is_admin: bool,
    ) -> Result<bool, ServiceError>;

    /// Every non-deactivated member of an organisation, invited or accepted.
    async fn organisation_users(&self, organisation_id: Uuid) -> Result<Vec<OrganisationUser>, ServiceError>;

    // Organisations

    /// Fails with `Conflict` when the short name is taken.
    async fn create_organisation(&self, organisation: &Organisation) -> Result<(), ServiceError>;

    async fn find_organisation(&self, organisation_id: Uuid) -> Result<Option<Organisation>, ServiceError>;

    async fn update_organisation(&self, organisation: &Organisation) -> Result<(), ServiceError>;

    /// Returns false when the organisation is missing or already deactivated.
    async fn deactivate_organisation(&self, organisation_id: Uuid) -> Result<bool, ServiceError>;

    async fn list_active_organisations(&self) -> Result<Vec<Organisation>, ServiceError>;
}
