//! In-memory identity store for tests and local development.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::IdentityStore;
use crate::models::{
    Membership, Organisation, OrganisationMembership, OrganisationUser, User, UserResponse,
};
use crate::services::ServiceError;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    organisations: HashMap<Uuid, Organisation>,
    memberships: HashMap<(Uuid, Uuid), Membership>,
}

/// Every operation holds one lock for its whole read-modify-write.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ServiceError> {
        self.state
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Identity store mutex poisoned: {}", e)))
    }
}

/// Unicode case folding, matching `LOWER(email)` in the Postgres store.
fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let email = email.trim();
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| same_email(&u.email, email))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn create_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| same_email(&u.email, &user.email)) {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_display_name(&self, user_id: Uuid, display_name: &str) -> Result<User, ServiceError> {
        let mut state = self.lock()?;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;
        user.display_name = display_name.to_string();
        Ok(user.clone())
    }

    async fn update_credential(
        &self,
        user_id: Uuid,
        password_hash: &str,
        issued_before: Option<DateTime<Utc>>,
    ) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        let Some(user) = state.users.get_mut(&user_id) else {
            return Ok(false);
        };

        if let (Some(before), Some(last)) = (issued_before, user.password_last_updated) {
            if last >= before {
                return Ok(false);
            }
        }

        user.password_hash = Some(password_hash.to_string());
        user.password_last_updated = Some(Utc::now());
        Ok(true)
    }

    async fn set_super_admin(&self, user_id: Uuid, is_super_admin: bool) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        Ok(match state.users.get_mut(&user_id) {
            Some(user) => {
                user.is_super_admin = is_super_admin;
                true
            }
            None => false,
        })
    }

    async fn list_active_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrganisationMembership>, ServiceError> {
        let state = self.lock()?;
        let mut memberships: Vec<OrganisationMembership> = state
            .memberships
            .values()
            .filter(|m| m.user_id == user_id && m.is_active())
            .filter_map(|m| {
                state
                    .organisations
                    .get(&m.organisation_id)
                    .filter(|o| o.is_active())
                    .map(|o| OrganisationMembership {
                        organisation: o.clone(),
                        is_admin: m.is_admin,
                    })
            })
            .collect();
        memberships.sort_by(|a, b| a.organisation.display_name.cmp(&b.organisation.display_name));
        Ok(memberships)
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
    ) -> Result<Option<Membership>, ServiceError> {
        Ok(self.lock()?.memberships.get(&(user_id, organisation_id)).cloned())
    }

    async fn create_membership(&self, membership: &Membership) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let key = (membership.user_id, membership.organisation_id);
        if let Some(existing) = state.memberships.get(&key) {
            if existing.deactivated.is_none() {
                return Err(ServiceError::Conflict(
                    "User is already a member or has a pending invite".to_string(),
                ));
            }
        }
        state.memberships.insert(key, membership.clone());
        Ok(())
    }

    async fn accept_membership(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
        invited: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        Ok(match state.memberships.get_mut(&(user_id, organisation_id)) {
            Some(m) if m.invited == invited && m.accepted.is_none() && m.deactivated.is_none() => {
                m.accepted = Some(Utc::now());
                true
            }
            _ => false,
        })
    }

    async fn deactivate_membership(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        Ok(match state.memberships.get_mut(&(user_id, organisation_id)) {
            Some(m) if m.deactivated.is_none() => {
                m.deactivated = Some(Utc::now());
                true
            }
            _ => false,
        })
    }

    async fn set_admin_flag(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
        is_admin: bool,
    ) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        Ok(match state.memberships.get_mut(&(user_id, organisation_id)) {
            Some(m) if m.deactivated.is_none() => {
                m.is_admin = is_admin;
                true
            }
            _ => false,
        })
    }

    async fn organisation_users(&self, organisation_id: Uuid) -> Result<Vec<OrganisationUser>, ServiceError> {
        let state = self.lock()?;
        let mut users: Vec<OrganisationUser> = state
            .memberships
            .values()
            .filter(|m| m.organisation_id == organisation_id && m.deactivated.is_none())
            .filter_map(|m| {
                state.users.get(&m.user_id).map(|u| OrganisationUser {
                    user: UserResponse::from(u.clone()),
                    state: m.state(),
                    invited: m.invited,
                    accepted: m.accepted,
                    is_admin: m.is_admin,
                })
            })
            .collect();
        users.sort_by(|a, b| a.user.display_name.cmp(&b.user.display_name));
        Ok(users)
    }

    async fn create_organisation(&self, organisation: &Organisation) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if state
            .organisations
            .values()
            .any(|o| o.short_name == organisation.short_name)
        {
            return Err(ServiceError::Conflict(
                "Organisation short name already in use".to_string(),
            ));
        }
        state.organisations.insert(organisation.id, organisation.clone());
        Ok(())
    }

    async fn find_organisation(&self, organisation_id: Uuid) -> Result<Option<Organisation>, ServiceError> {
        Ok(self.lock()?.organisations.get(&organisation_id).cloned())
    }

    async fn update_organisation(&self, organisation: &Organisation) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let stored = state
            .organisations
            .get_mut(&organisation.id)
            .ok_or_else(|| ServiceError::NotFound("Organisation".to_string()))?;
        stored.display_name = organisation.display_name.clone();
        stored.country_codes = organisation.country_codes.clone();
        stored.language = organisation.language.clone();
        Ok(())
    }

    async fn deactivate_organisation(&self, organisation_id: Uuid) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        Ok(match state.organisations.get_mut(&organisation_id) {
            Some(o) if o.deactivated.is_none() => {
                o.deactivated = Some(Utc::now());
                true
            }
            _ => false,
        })
    }

    async fn list_active_organisations(&self) -> Result<Vec<Organisation>, ServiceError> {
        let state = self.lock()?;
        let mut organisations: Vec<Organisation> = state
            .organisations
            .values()
            .filter(|o| o.is_active())
            .cloned()
            .collect();
        organisations.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(organisations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateOrganisationRequest, MembershipState};

    fn organisation(short_name: &str) -> Organisation {
        Organisation::new(CreateOrganisationRequest {
            display_name: short_name.to_uppercase(),
            short_name: short_name.to_string(),
            country_codes: vec!["GBR".to_string()],
            language: "en".to_string(),
        })
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let store = InMemoryStore::new();
        let user = User::new("Someone@Example.org");
        store.create_user(&user).await.unwrap();

        let found = store.find_user_by_email("someone@example.org").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        let duplicate = store.create_user(&User::new("SOMEONE@example.org")).await;
        assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_email_lookup_folds_non_ascii_case() {
        let store = InMemoryStore::new();
        let user = User::new("ÉLODIE@Example.org");
        store.create_user(&user).await.unwrap();

        let found = store.find_user_by_email("élodie@example.org").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        let duplicate = store.create_user(&User::new("Élodie@example.org")).await;
        assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_accept_membership_is_single_shot() {
        let store = InMemoryStore::new();
        let user = User::new("a@example.org");
        let org = organisation("acme");
        store.create_user(&user).await.unwrap();
        store.create_organisation(&org).await.unwrap();
        let membership = Membership::invited(user.id, org.id, false);
        store.create_membership(&membership).await.unwrap();

        assert!(store.accept_membership(user.id, org.id, membership.invited).await.unwrap());
        assert!(!store.accept_membership(user.id, org.id, membership.invited).await.unwrap());
    }

    #[tokio::test]
    async fn test_reopened_membership_rejects_earlier_invitation() {
        let store = InMemoryStore::new();
        let user = User::new("a@example.org");
        let org = organisation("acme");
        store.create_user(&user).await.unwrap();
        store.create_organisation(&org).await.unwrap();

        let first = Membership::invited(user.id, org.id, false);
        store.create_membership(&first).await.unwrap();
        assert!(store.accept_membership(user.id, org.id, first.invited).await.unwrap());
        assert!(store.deactivate_membership(user.id, org.id).await.unwrap());

        let second = Membership {
            invited: first.invited + chrono::Duration::microseconds(1),
            ..Membership::invited(user.id, org.id, false)
        };
        store.create_membership(&second).await.unwrap();

        assert!(!store.accept_membership(user.id, org.id, first.invited).await.unwrap());
        assert!(store.accept_membership(user.id, org.id, second.invited).await.unwrap());
    }

    #[tokio::test]
    async fn test_membership_reopens_only_after_deactivation() {
        let store = InMemoryStore::new();
        let user = User::new("a@example.org");
        let org = organisation("acme");
        store.create_user(&user).await.unwrap();
        store.create_organisation(&org).await.unwrap();

        let membership = Membership::accepted(user.id, org.id, false);
        store.create_membership(&membership).await.unwrap();
        assert!(matches!(
            store.create_membership(&Membership::invited(user.id, org.id, false)).await,
            Err(ServiceError::Conflict(_))
        ));

        assert!(store.deactivate_membership(user.id, org.id).await.unwrap());
        store
            .create_membership(&Membership::invited(user.id, org.id, true))
            .await
            .unwrap();
        let reopened = store.find_membership(user.id, org.id).await.unwrap().unwrap();
        assert_eq!(reopened.state(), MembershipState::Invited);
        assert!(reopened.is_admin);
    }

    #[tokio::test]
    async fn test_active_memberships_skip_deactivated_organisations() {
        let store = InMemoryStore::new();
        let user = User::new("a@example.org");
        let live = organisation("live");
        let closed = organisation("closed");
        store.create_user(&user).await.unwrap();
        for org in [&live, &closed] {
            store.create_organisation(org).await.unwrap();
            store
                .create_membership(&Membership::accepted(user.id, org.id, false))
                .await
                .unwrap();
        }
        assert!(store.deactivate_organisation(closed.id).await.unwrap());
        assert!(!store.deactivate_organisation(closed.id).await.unwrap());

        let active = store.list_active_memberships(user.id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].organisation.id, live.id);
    }

    #[tokio::test]
    async fn test_conditional_credential_update() {
        let store = InMemoryStore::new();
        let user = User::new("a@example.org");
        store.create_user(&user).await.unwrap();

        let issued = Utc::now();
        assert!(store.update_credential(user.id, "h1", Some(issued)).await.unwrap());
        assert!(!store.update_credential(user.id, "h2", Some(issued)).await.unwrap());
        assert!(store.update_credential(user.id, "h3", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_short_name_conflicts() {
        let store = InMemoryStore::new();
        store.create_organisation(&organisation("acme")).await.unwrap();
        assert!(matches!(
            store.create_organisation(&organisation("acme")).await,
            Err(ServiceError::Conflict(_))
        ));
    }
}
