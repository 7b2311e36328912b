//! The claim set carried inside every signed token.
//!
//! One token format serves three purposes. The purpose is discriminated by the
//! boolean flags plus the presence of an organisation id, see [`Claims::purpose`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// What a decoded token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    /// Authorizes the credential update only.
    PasswordReset,
    /// Authorizes redemption of one organisation invite.
    Invite,
    /// A session scoped to one organisation.
    Session,
    /// A session (or API identity) without an organisation.
    Unscoped,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::PasswordReset => "password_reset",
            TokenPurpose::Invite => "invite",
            TokenPurpose::Session => "session",
            TokenPurpose::Unscoped => "unscoped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation_id: Option<Uuid>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    #[serde(default)]
    pub is_api_user: bool,
    #[serde(default)]
    pub is_password_reset: bool,
    #[serde(default)]
    pub is_invite: bool,
    #[serde(default)]
    pub is_organisation_admin: bool,
    #[serde(default)]
    pub is_super_admin: bool,
    /// Invite tokens only: the invitation they redeem, in microseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited: Option<i64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

impl Claims {
    /// Unscoped claims for `sub`, valid from `issued_at` for `ttl`.
    pub fn new(sub: Uuid, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub,
            organisation_id: None,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
            is_api_user: false,
            is_password_reset: false,
            is_invite: false,
            is_organisation_admin: false,
            is_super_admin: false,
            invited: None,
            extras: Map::new(),
        }
    }

    /// Organisation-scoped session claims.
    pub fn session(
        sub: Uuid,
        organisation_id: Uuid,
        is_organisation_admin: bool,
        is_super_admin: bool,
        ttl: Duration,
    ) -> Self {
        Self {
            organisation_id: Some(organisation_id),
            is_organisation_admin,
            is_super_admin,
            ..Self::new(sub, Utc::now(), ttl)
        }
    }

    /// Claims that only allow redeeming the invitation into `organisation_id`
    /// issued at `invited`. Reopening the membership issues a new invitation.
    pub fn invite(sub: Uuid, organisation_id: Uuid, invited: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            organisation_id: Some(organisation_id),
            is_invite: true,
            invited: Some(invited.timestamp_micros()),
            ..Self::new(sub, Utc::now(), ttl)
        }
    }

    /// Claims that only allow a credential update. Never organisation-scoped.
    pub fn password_reset(sub: Uuid, ttl: Duration) -> Self {
        Self {
            is_password_reset: true,
            ..Self::new(sub, Utc::now(), ttl)
        }
    }

    /// Synthetic claims for the platform operator presenting an API token.
    pub fn api_user(service_account: Uuid, organisation_id: Option<Uuid>, ttl: Duration) -> Self {
        Self {
            organisation_id,
            is_api_user: true,
            is_super_admin: true,
            ..Self::new(service_account, Utc::now(), ttl)
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    pub fn purpose(&self) -> TokenPurpose {
        if self.is_password_reset {
            TokenPurpose::PasswordReset
        } else if self.is_invite {
            TokenPurpose::Invite
        } else if self.organisation_id.is_some() {
            TokenPurpose::Session
        } else {
            TokenPurpose::Unscoped
        }
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn invited_at(&self) -> Option<DateTime<Utc>> {
        self.invited.and_then(DateTime::from_timestamp_micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_discrimination() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let ttl = Duration::days(1);

        assert_eq!(Claims::session(user, org, false, false, ttl).purpose(), TokenPurpose::Session);
        assert_eq!(Claims::invite(user, org, Utc::now(), ttl).purpose(), TokenPurpose::Invite);
        assert_eq!(Claims::password_reset(user, ttl).purpose(), TokenPurpose::PasswordReset);
        assert_eq!(Claims::new(user, Utc::now(), ttl).purpose(), TokenPurpose::Unscoped);
        assert_eq!(Claims::api_user(user, None, ttl).purpose(), TokenPurpose::Unscoped);
        assert_eq!(Claims::api_user(user, Some(org), ttl).purpose(), TokenPurpose::Session);
    }

    #[test]
    fn test_reset_flag_wins_over_organisation() {
        let mut claims = Claims::password_reset(Uuid::new_v4(), Duration::minutes(30));
        claims.organisation_id = Some(Uuid::new_v4());
        assert_eq!(claims.purpose(), TokenPurpose::PasswordReset);
    }

    #[test]
    fn test_expiry_derived_from_ttl() {
        let now = Utc::now();
        let claims = Claims::new(Uuid::new_v4(), now, Duration::days(30));
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 60 * 60);
        assert_eq!(claims.issued_at().map(|t| t.timestamp()), Some(now.timestamp()));
    }

    #[test]
    fn test_invite_carries_its_invitation() {
        let invited = DateTime::from_timestamp_micros(1_700_000_000_123_456).unwrap();
        let claims = Claims::invite(Uuid::new_v4(), Uuid::new_v4(), invited, Duration::days(7));
        assert_eq!(claims.invited_at(), Some(invited));

        let session = Claims::session(Uuid::new_v4(), Uuid::new_v4(), false, false, Duration::days(1));
        assert_eq!(session.invited_at(), None);
        assert!(serde_json::to_value(&session).unwrap().get("invited").is_none());
    }

    #[test]
    fn test_minimal_payload_deserializes() {
        let sub = Uuid::new_v4();
        let json = serde_json::json!({ "sub": sub, "iat": 1, "exp": 2 });
        let claims: Claims = serde_json::from_value(json).unwrap();
        assert_eq!(claims.sub, sub);
        assert!(claims.organisation_id.is_none());
        assert!(claims.extras.is_empty());
        assert_eq!(claims.purpose(), TokenPurpose::Unscoped);
    }
}
