//! PostgreSQL identity store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::IdentityStore;
use crate::models::{
    Membership, Organisation, OrganisationMembership, OrganisationUser, User, UserResponse,
};
use crate::services::ServiceError;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    /// Create a new store from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(FromRow)]
struct MembershipRow {
    #[sqlx(flatten)]
    organisation: Organisation,
    is_admin: bool,
}

#[derive(FromRow)]
struct OrganisationUserRow {
    #[sqlx(flatten)]
    user: User,
    #[sqlx(flatten)]
    membership: Membership,
}

fn unique_violation(err: sqlx::Error, message: &str) -> ServiceError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ServiceError::Conflict(message.to_string())
        }
        _ => ServiceError::Database(err),
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            ServiceError::Database(e)
        })?;
        Ok(())
    }

    // ==================== User Operations ====================

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, user: &User) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, password_hash, password_last_updated, is_super_admin, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.password_last_updated)
        .bind(user.is_super_admin)
        .bind(user.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Email already registered"))?;
        Ok(())
    }

    async fn update_display_name(&self, user_id: Uuid, display_name: &str) -> Result<User, ServiceError> {
        sqlx::query_as::<_, User>("UPDATE users SET display_name = $2 WHERE id = $1 RETURNING *")
            .bind(user_id)
            .bind(display_name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))
    }

    async fn update_credential(
        &self,
        user_id: Uuid,
        password_hash: &str,
        issued_before: Option<DateTime<Utc>>,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, password_last_updated = NOW()
            WHERE id = $1
              AND ($3::timestamptz IS NULL OR password_last_updated IS NULL OR password_last_updated < $3)
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(issued_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_super_admin(&self, user_id: Uuid, is_super_admin: bool) -> Result<bool, ServiceError> {
        let result = sqlx::query("UPDATE users SET is_super_admin = $2 WHERE id = $1")
            .bind(user_id)
            .bind(is_super_admin)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    // ==================== Membership Operations ====================

    async fn list_active_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrganisationMembership>, ServiceError> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT o.*, ou.is_admin
            FROM organisation_users ou
            JOIN organisations o ON o.id = ou.organisation_id
            WHERE ou.user_id = $1
              AND ou.accepted IS NOT NULL
              AND ou.deactivated IS NULL
              AND o.deactivated IS NULL
            ORDER BY o.display_name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| OrganisationMembership {
                organisation: row.organisation,
                is_admin: row.is_admin,
            })
            .collect())
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
    ) -> Result<Option<Membership>, ServiceError> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM organisation_users WHERE user_id = $1 AND organisation_id = $2",
        )
        .bind(user_id)
        .bind(organisation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    async fn create_membership(&self, membership: &Membership) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO organisation_users (user_id, organisation_id, is_admin, invited, accepted, deactivated)
            VALUES ($1, $2, $3, $4, $5, NULL)
            ON CONFLICT (user_id, organisation_id) DO UPDATE
            SET is_admin = EXCLUDED.is_admin,
                invited = EXCLUDED.invited,
                accepted = EXCLUDED.accepted,
                deactivated = NULL
            WHERE organisation_users.deactivated IS NOT NULL
            "#,
        )
        .bind(membership.user_id)
        .bind(membership.organisation_id)
        .bind(membership.is_admin)
        .bind(membership.invited)
        .bind(membership.accepted)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::Conflict(
                "User is already a member or has a pending invite".to_string(),
            ));
        }
        Ok(())
    }

    async fn accept_membership(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
        invited: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE organisation_users
            SET accepted = NOW()
            WHERE user_id = $1 AND organisation_id = $2 AND invited = $3
              AND accepted IS NULL AND deactivated IS NULL
            "#,
        )
        .bind(user_id)
        .bind(organisation_id)
        .bind(invited)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn deactivate_membership(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE organisation_users
            SET deactivated = NOW()
            WHERE user_id = $1 AND organisation_id = $2 AND deactivated IS NULL
            "#,
        )
        .bind(user_id)
        .bind(organisation_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_admin_flag(
        &self,
        user_id: Uuid,
        organisation_id: Uuid,
        is_admin: bool,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE organisation_users
            SET is_admin = $3
            WHERE user_id = $1 AND organisation_id = $2 AND deactivated IS NULL
            "#,
        )
        .bind(user_id)
        .bind(organisation_id)
        .bind(is_admin)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn organisation_users(&self, organisation_id: Uuid) -> Result<Vec<OrganisationUser>, ServiceError> {
        let rows = sqlx::query_as::<_, OrganisationUserRow>(
            r#"
            SELECT u.*, ou.organisation_id, ou.user_id, ou.is_admin, ou.invited, ou.accepted, ou.deactivated
            FROM organisation_users ou
            JOIN users u ON u.id = ou.user_id
            WHERE ou.organisation_id = $1 AND ou.deactivated IS NULL
            ORDER BY u.display_name
            "#,
        )
        .bind(organisation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| OrganisationUser {
                state: row.membership.state(),
                invited: row.membership.invited,
                accepted: row.membership.accepted,
                is_admin: row.membership.is_admin,
                user: UserResponse::from(row.user),
            })
            .collect())
    }

    // ==================== Organisation Operations ====================

    async fn create_organisation(&self, organisation: &Organisation) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO organisations (id, display_name, short_name, country_codes, language, deactivated)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(organisation.id)
        .bind(&organisation.display_name)
        .bind(&organisation.short_name)
        .bind(&organisation.country_codes)
        .bind(&organisation.language)
        .bind(organisation.deactivated)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Organisation short name already in use"))?;
        Ok(())
    }

    async fn find_organisation(&self, organisation_id: Uuid) -> Result<Option<Organisation>, ServiceError> {
        let organisation = sqlx::query_as::<_, Organisation>("SELECT * FROM organisations WHERE id = $1")
            .bind(organisation_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(organisation)
    }

    async fn update_organisation(&self, organisation: &Organisation) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE organisations
            SET display_name = $2, country_codes = $3, language = $4
            WHERE id = $1
            "#,
        )
        .bind(organisation.id)
        .bind(&organisation.display_name)
        .bind(&organisation.country_codes)
        .bind(&organisation.language)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Organisation".to_string()));
        }
        Ok(())
    }

    async fn deactivate_organisation(&self, organisation_id: Uuid) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            "UPDATE organisations SET deactivated = NOW() WHERE id = $1 AND deactivated IS NULL",
        )
        .bind(organisation_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_active_organisations(&self) -> Result<Vec<Organisation>, ServiceError> {
        let organisations = sqlx::query_as::<_, Organisation>(
            "SELECT * FROM organisations WHERE deactivated IS NULL ORDER BY display_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(organisations)
    }
}
