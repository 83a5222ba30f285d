//! PostgreSQL store implementations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{RefreshTokenStore, StoreError, StoreResult, UserRepository};
use crate::models::token::RefreshToken;
use crate::models::user::{LoginId, LoginStatistics, PasswordHash, Role, User};

const USER_COLUMNS: &str = "id, login_id, password_hash, role, last_login_date, \
     current_streak, max_streak, total_login_days, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    login_id: String,
    password_hash: String,
    role: String,
    last_login_date: Option<NaiveDate>,
    current_streak: i32,
    max_streak: i32,
    total_login_days: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> StoreResult<User> {
        let login_id = LoginId::parse(&self.login_id)
            .map_err(|e| StoreError::Corrupt(format!("login_id for user {}: {e}", self.id)))?;
        let role = Role::parse(&self.role)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown role '{}'", self.role)))?;
        Ok(User {
            id: self.id,
            login_id,
            password_hash: PasswordHash::new(self.password_hash),
            role,
            statistics: LoginStatistics {
                last_login_date: self.last_login_date,
                current_streak: non_negative(self.current_streak, "current_streak")?,
                max_streak: non_negative(self.max_streak, "max_streak")?,
                total_login_days: non_negative(self.total_login_days, "total_login_days")?,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn non_negative(value: i32, field: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} is negative: {value}")))
}

/// User persistence over sqlx.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_login_id(&self, login_id: &LoginId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE login_id = $1"
        ))
        .bind(login_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn login_id_exists(&self, login_id: &LoginId) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE login_id = $1)",
        )
        .bind(login_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn save(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, login_id, password_hash, role, last_login_date, \
             current_streak, max_streak, total_login_days, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET \
               password_hash = EXCLUDED.password_hash, \
               role = EXCLUDED.role, \
               last_login_date = EXCLUDED.last_login_date, \
               current_streak = EXCLUDED.current_streak, \
               max_streak = EXCLUDED.max_streak, \
               total_login_days = EXCLUDED.total_login_days, \
               updated_at = EXCLUDED.updated_at",
        )
        .bind(user.id)
        .bind(user.login_id.as_str())
        .bind(user.password_hash.as_str())
        .bind(user.role.as_str())
        .bind(user.statistics.last_login_date)
        .bind(user.statistics.current_streak as i32)
        .bind(user.statistics.max_streak as i32)
        .bind(user.statistics.total_login_days as i32)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    token: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
    created_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: row.id,
            user_id: row.user_id,
            token: row.token,
            expires_at: row.expires_at,
            revoked: row.revoked,
            created_at: row.created_at,
        }
    }
}

/// Refresh-token persistence over sqlx.
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn save(&self, token: &RefreshToken) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token, expires_at, revoked, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
               revoked = EXCLUDED.revoked, \
               expires_at = EXCLUDED.expires_at",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.revoked)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, user_id, token, expires_at, revoked, created_at \
             FROM refresh_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RefreshToken::from))
    }

    async fn find_valid_by_user(&self, user_id: Uuid) -> StoreResult<Vec<RefreshToken>> {
        let rows = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, user_id, token, expires_at, revoked, created_at \
             FROM refresh_tokens \
             WHERE user_id = $1 AND revoked = FALSE AND expires_at > now() \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RefreshToken::from).collect())
    }

    async fn revoke(&self, id: Uuid) -> StoreResult<bool> {
        // The revoked = FALSE guard serializes concurrent rotations of the
        // same token: only one UPDATE reports an affected row.
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE \
             WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
