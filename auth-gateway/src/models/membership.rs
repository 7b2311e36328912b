//! Membership model - the user x organisation join entity.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{Organisation, UserResponse};

/// Lifecycle of a membership: invited -> accepted -> deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    Invited,
    Accepted,
    Deactivated,
}

/// Membership entity.
#[derive(Debug, Clone, FromRow)]
pub struct Membership {
    pub user_id: Uuid,
    pub organisation_id: Uuid,
    pub is_admin: bool,
    pub invited: DateTime<Utc>,
    pub accepted: Option<DateTime<Utc>>,
    pub deactivated: Option<DateTime<Utc>>,
}

impl Membership {
    /// New membership in the invited state.
    ///
    /// `invited` is kept at microsecond precision so it survives a round trip
    /// through Postgres unchanged; invite tokens match on it exactly.
    pub fn invited(user_id: Uuid, organisation_id: Uuid, is_admin: bool) -> Self {
        Self {
            user_id,
            organisation_id,
            is_admin,
            invited: Utc::now().trunc_subsecs(6),
            accepted: None,
            deactivated: None,
        }
    }

    /// New membership that skips the invite step.
    pub fn accepted(user_id: Uuid, organisation_id: Uuid, is_admin: bool) -> Self {
        let now = Utc::now().trunc_subsecs(6);
        Self {
            accepted: Some(now),
            invited: now,
            ..Self::invited(user_id, organisation_id, is_admin)
        }
    }

    pub fn state(&self) -> MembershipState {
        match (self.accepted, self.deactivated) {
            (_, Some(_)) => MembershipState::Deactivated,
            (Some(_), None) => MembershipState::Accepted,
            (None, None) => MembershipState::Invited,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == MembershipState::Accepted
    }
}

/// An active membership joined with its organisation.
#[derive(Debug, Clone)]
pub struct OrganisationMembership {
    pub organisation: Organisation,
    pub is_admin: bool,
}

/// A user together with their membership state in one organisation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrganisationUser {
    #[serde(flatten)]
    pub user: UserResponse,
    pub state: MembershipState,
    pub invited: DateTime<Utc>,
    pub accepted: Option<DateTime<Utc>>,
    pub is_admin: bool,
}

/// Request to invite someone into the current organisation.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteRequest {
    #[validate(email(message = "invalid email address"))]
    pub user_email: String,
    #[serde(default)]
    pub as_admin: bool,
}

/// Request to resend a pending invite.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResendInviteRequest {
    #[validate(email(message = "invalid email address"))]
    pub user_email: String,
}

/// Request to toggle a member's organisation admin flag.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminStatusRequest {
    pub is_admin: bool,
}

/// Response for invite issue and resend.
#[derive(Debug, Serialize, ToSchema)]
pub struct InviteResponse {
    pub user_id: Uuid,
    pub organisation_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut membership = Membership::invited(Uuid::new_v4(), Uuid::new_v4(), false);
        assert_eq!(membership.state(), MembershipState::Invited);
        assert!(!membership.is_active());

        membership.accepted = Some(Utc::now());
        assert_eq!(membership.state(), MembershipState::Accepted);
        assert!(membership.is_active());

        membership.deactivated = Some(Utc::now());
        assert_eq!(membership.state(), MembershipState::Deactivated);
        assert!(!membership.is_active());
    }

    #[test]
    fn test_deactivated_invite_is_deactivated() {
        let mut membership = Membership::invited(Uuid::new_v4(), Uuid::new_v4(), true);
        membership.deactivated = Some(Utc::now());
        assert_eq!(membership.state(), MembershipState::Deactivated);
    }

    #[test]
    fn test_accepted_constructor() {
        let membership = Membership::accepted(Uuid::new_v4(), Uuid::new_v4(), true);
        assert!(membership.is_active());
        assert!(membership.is_admin);
    }
}
