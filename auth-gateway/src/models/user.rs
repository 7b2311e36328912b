//! User model - platform-wide accounts, scoped to organisations through memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// User entity.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub password_last_updated: Option<DateTime<Utc>>,
    pub is_super_admin: bool,
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Create a new user with no credential set.
    ///
    /// The display name defaults to the local part of the email address.
    pub fn new(email: &str) -> Self {
        let email = email.trim().to_string();
        let display_name = email
            .split_once('@')
            .map(|(local, _)| local)
            .unwrap_or(email.as_str())
            .to_string();

        Self {
            id: Uuid::new_v4(),
            email,
            display_name,
            password_hash: None,
            password_last_updated: None,
            is_super_admin: false,
            created_utc: Utc::now(),
        }
    }

    /// True until the user has chosen a password.
    pub fn needs_first_time_setup(&self) -> bool {
        self.password_hash.is_none()
    }

    /// Convert to sanitized response (no credential fields).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// Public user profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_last_updated: Option<DateTime<Utc>>,
    pub is_super_admin: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            password_last_updated: user.password_last_updated,
            is_super_admin: user.is_super_admin,
        }
    }
}

/// Request to update the current user's profile.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, message = "display name must be at least 2 characters"))]
    pub display_name: String,
}

/// Request to set a new password.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordChangeRequest {
    #[validate(length(min = 12, message = "password must be at least 12 characters"))]
    pub new_password: String,
}

/// Request to toggle the platform-wide super-admin flag.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SuperAdminStatusRequest {
    pub is_super_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_derives_display_name() {
        let user = User::new("  jo.bloggs@example.org ");
        assert_eq!(user.email, "jo.bloggs@example.org");
        assert_eq!(user.display_name, "jo.bloggs");
        assert!(user.needs_first_time_setup());
        assert!(!user.is_super_admin);
    }

    #[test]
    fn test_sanitized_has_no_hash() {
        let mut user = User::new("a@b.c");
        user.password_hash = Some("$argon2id$secret".to_string());
        let json = serde_json::to_string(&user.sanitized()).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password_last_updated"));
    }
}
