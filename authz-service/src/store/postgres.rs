//! PostgreSQL implementation of the store.
//!
//! Each [`PgTransaction`] wraps one `sqlx::Transaction`. sqlx rolls the
//! transaction back when it is dropped without a commit, so a cancelled or
//! failed command leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, Postgres};
use uuid::Uuid;

use super::{
    AccessRepository, EndpointRepository, GrantResolution, InvitationRepository,
    MembershipRepository, RoleRepository, TeamRepository, Transaction, UnitOfWork,
    UserRepository,
};
use crate::models::{
    Endpoint, Invitation, Membership, MembershipWithRole, Role, RoleName, Team, User,
};

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false)
}

fn db_error(err: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!(err))
}

fn write_error(what: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |err| {
        if is_unique_violation(&err) {
            AppError::Conflict(anyhow::anyhow!("{} already exists", what))
        } else {
            db_error(err)
        }
    }
}

fn expect_one(rows: u64, what: &str, id: Uuid) -> Result<(), AppError> {
    if rows == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "{} {} not found",
            what,
            id
        )));
    }
    Ok(())
}

const MEMBERSHIP_WITH_ROLE: &str = r#"
    SELECT m.membership_id, m.team_id, m.user_id, m.role_id, r.role_name
    FROM memberships m
    JOIN roles r ON r.role_id = m.role_id
"#;

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UnitOfWork for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, AppError> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

#[async_trait]
impl AccessRepository for PgStore {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, AppError> {
        sqlx::query_as::<_, Endpoint>(
            "SELECT endpoint_id, endpoint_name, path_pattern, http_method FROM endpoints ORDER BY endpoint_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn resolve_grant(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        endpoint_id: Uuid,
    ) -> Result<Option<GrantResolution>, AppError> {
        let row: Option<(String, bool)> = sqlx::query_as(
            r#"
            SELECT r.role_name,
                   EXISTS (
                       SELECT 1 FROM grants g
                       WHERE g.role_id = r.role_id AND g.endpoint_id = $3
                   )
            FROM memberships m
            JOIN roles r ON r.role_id = m.role_id
            WHERE m.team_id = $1 AND m.user_id = $2
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(endpoint_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|(role_name, granted)| GrantResolution { role_name, granted }))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        crate::db::health_check(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
        })
    }
}

/// Open PostgreSQL transaction.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await.map_err(db_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await.map_err(db_error)
    }
}

#[async_trait]
impl TeamRepository for PgTransaction {
    async fn find_team(&mut self, team_id: Uuid) -> Result<Option<Team>, AppError> {
        sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE team_id = $1")
            .bind(team_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)
    }

    async fn insert_team(&mut self, team: &Team) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO teams (team_id, team_name, description, is_personal, avatar_url, creator_id, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(team.team_id)
        .bind(&team.team_name)
        .bind(&team.description)
        .bind(team.is_personal)
        .bind(&team.avatar_url)
        .bind(team.creator_id)
        .bind(team.created_utc)
        .bind(team.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(write_error("team"))?;
        Ok(())
    }

    async fn update_team(&mut self, team: &Team) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE teams
            SET team_name = $2, description = $3, avatar_url = $4, updated_utc = $5
            WHERE team_id = $1
            "#,
        )
        .bind(team.team_id)
        .bind(&team.team_name)
        .bind(&team.description)
        .bind(&team.avatar_url)
        .bind(team.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        expect_one(result.rows_affected(), "team", team.team_id)
    }
}

#[async_trait]
impl MembershipRepository for PgTransaction {
    async fn find_membership(
        &mut self,
        membership_id: Uuid,
    ) -> Result<Option<MembershipWithRole>, AppError> {
        sqlx::query_as::<_, MembershipWithRole>(&format!(
            "{} WHERE m.membership_id = $1",
            MEMBERSHIP_WITH_ROLE
        ))
        .bind(membership_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)
    }

    async fn find_membership_by_user(
        &mut self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MembershipWithRole>, AppError> {
        sqlx::query_as::<_, MembershipWithRole>(&format!(
            "{} WHERE m.team_id = $1 AND m.user_id = $2",
            MEMBERSHIP_WITH_ROLE
        ))
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)
    }

    async fn insert_membership(&mut self, membership: &Membership) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO memberships (membership_id, team_id, user_id, role_id, last_active_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(membership.membership_id)
        .bind(membership.team_id)
        .bind(membership.user_id)
        .bind(membership.role_id)
        .bind(membership.last_active_utc)
        .bind(membership.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(write_error("membership"))?;
        Ok(())
    }

    async fn update_membership_role(
        &mut self,
        membership_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE memberships SET role_id = $2 WHERE membership_id = $1")
            .bind(membership_id)
            .bind(role_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        expect_one(result.rows_affected(), "membership", membership_id)
    }

    async fn touch_membership(
        &mut self,
        membership_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE memberships SET last_active_utc = $2 WHERE membership_id = $1")
                .bind(membership_id)
                .bind(at)
                .execute(&mut *self.tx)
                .await
                .map_err(db_error)?;
        expect_one(result.rows_affected(), "membership", membership_id)
    }

    async fn delete_membership(&mut self, membership_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM memberships WHERE membership_id = $1")
            .bind(membership_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        expect_one(result.rows_affected(), "membership", membership_id)
    }

    async fn list_member_emails(&mut self, team_id: Uuid) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT LOWER(u.email)
            FROM memberships m
            JOIN users u ON u.user_id = m.user_id
            WHERE m.team_id = $1
            "#,
        )
        .bind(team_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)
    }
}

#[async_trait]
impl InvitationRepository for PgTransaction {
    async fn find_invitation(
        &mut self,
        invitation_id: Uuid,
    ) -> Result<Option<Invitation>, AppError> {
        sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE invitation_id = $1")
            .bind(invitation_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)
    }

    async fn find_outstanding_invitation(
        &mut self,
        team_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, AppError> {
        sqlx::query_as::<_, Invitation>(
            r#"
            SELECT * FROM invitations
            WHERE team_id = $1
              AND LOWER(email) = LOWER($2)
              AND is_active
              AND status IN ('pending', 'sent')
            LIMIT 1
            "#,
        )
        .bind(team_id)
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)
    }

    async fn insert_invitation(&mut self, invitation: &Invitation) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO invitations (invitation_id, email, team_id, role_id, sender_id, status, is_active, expiry_utc, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(invitation.invitation_id)
        .bind(&invitation.email)
        .bind(invitation.team_id)
        .bind(invitation.role_id)
        .bind(invitation.sender_id)
        .bind(&invitation.status)
        .bind(invitation.is_active)
        .bind(invitation.expiry_utc)
        .bind(invitation.created_utc)
        .bind(invitation.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(write_error("invitation"))?;
        Ok(())
    }

    async fn update_invitation(&mut self, invitation: &Invitation) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE invitations
            SET status = $2, is_active = $3, expiry_utc = $4, updated_utc = $5
            WHERE invitation_id = $1
            "#,
        )
        .bind(invitation.invitation_id)
        .bind(&invitation.status)
        .bind(invitation.is_active)
        .bind(invitation.expiry_utc)
        .bind(invitation.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        expect_one(result.rows_affected(), "invitation", invitation.invitation_id)
    }

    async fn delete_invitation(&mut self, invitation_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM invitations WHERE invitation_id = $1")
            .bind(invitation_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        expect_one(result.rows_affected(), "invitation", invitation_id)
    }
}

#[async_trait]
impl UserRepository for PgTransaction {
    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, first_name, last_name, email, phone_number, avatar_url, is_active, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.avatar_url)
        .bind(user.is_active)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(write_error("user"))?;
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, phone_number = $4, avatar_url = $5,
                is_active = $6, updated_utc = $7
            WHERE user_id = $1
            "#,
        )
        .bind(user.user_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(&user.avatar_url)
        .bind(user.is_active)
        .bind(user.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        expect_one(result.rows_affected(), "user", user.user_id)
    }
}

#[async_trait]
impl RoleRepository for PgTransaction {
    async fn find_role_by_name(&mut self, name: RoleName) -> Result<Option<Role>, AppError> {
        sqlx::query_as::<_, Role>("SELECT role_id, role_name FROM roles WHERE role_name = $1")
            .bind(name.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)
    }
}

#[async_trait]
impl EndpointRepository for PgTransaction {
    async fn upsert_role(&mut self, name: RoleName) -> Result<Role, AppError> {
        sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (role_id, role_name) VALUES ($1, $2)
            ON CONFLICT (role_name) DO UPDATE SET role_name = EXCLUDED.role_name
            RETURNING role_id, role_name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)
    }

    async fn upsert_endpoint(&mut self, endpoint: &Endpoint) -> Result<Endpoint, AppError> {
        sqlx::query_as::<_, Endpoint>(
            r#"
            INSERT INTO endpoints (endpoint_id, endpoint_name, path_pattern, http_method)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (endpoint_name) DO UPDATE
                SET path_pattern = EXCLUDED.path_pattern, http_method = EXCLUDED.http_method
            RETURNING endpoint_id, endpoint_name, path_pattern, http_method
            "#,
        )
        .bind(endpoint.endpoint_id)
        .bind(&endpoint.endpoint_name)
        .bind(&endpoint.path_pattern)
        .bind(&endpoint.http_method)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(write_error("endpoint for this path and method"))
    }

    async fn grant(&mut self, role_id: Uuid, endpoint_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO grants (role_id, endpoint_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(endpoint_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}
