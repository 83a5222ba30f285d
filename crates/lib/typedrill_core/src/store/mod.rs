//! Storage contracts for users and refresh tokens.
//!
//! Two implementations exist: `postgres` (production, sqlx) and `memory`
//! (tests). The workflow only ever sees these traits.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::token::RefreshToken;
use crate::models::user::{LoginId, User};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque persistence failure. Callers must not retry a failed `save`
/// blindly; a double insert would mint two live tokens for one login.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("data integrity error: {0}")]
    Corrupt(String),
}

/// Persistence for the user aggregate.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Exact, case-sensitive lookup.
    async fn find_by_login_id(&self, login_id: &LoginId) -> StoreResult<Option<User>>;

    async fn login_id_exists(&self, login_id: &LoginId) -> StoreResult<bool>;

    /// Upsert by id. Statistics updates are last-writer-wins; concurrent
    /// logins for one user may lose an update (accepted, see DESIGN.md).
    async fn save(&self, user: &User) -> StoreResult<()>;

    /// Connectivity probe for health checks.
    async fn ping(&self) -> StoreResult<()>;
}

/// Persistence for refresh-token records.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Upsert by id.
    async fn save(&self, token: &RefreshToken) -> StoreResult<()>;

    /// Exact string match on the token value (unique index).
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshToken>>;

    /// Rows that are neither revoked nor expired, filtered at query time.
    async fn find_valid_by_user(&self, user_id: Uuid) -> StoreResult<Vec<RefreshToken>>;

    /// Compare-and-set `revoked` from false to true. Returns whether THIS
    /// call flipped it; of two concurrent refreshes presenting the same
    /// token, exactly one observes `true`.
    async fn revoke(&self, id: Uuid) -> StoreResult<bool>;

    /// Bulk-revoke every token owned by the user. Idempotent. Returns the
    /// number of rows flipped by this call.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> StoreResult<u64>;

    /// Best-effort sweep of rows past their expiry. Safe to run concurrently
    /// with reads. Returns the number of rows removed.
    async fn delete_expired(&self) -> StoreResult<u64>;

    /// Single-row delete; no-op when absent.
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()>;
}
