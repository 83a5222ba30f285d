//! In-memory store implementations.
//!
//! Used by unit and integration tests; mirrors the Postgres semantics,
//! including the compare-and-set on `revoked`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::{RefreshTokenStore, StoreResult, UserRepository};
use crate::models::token::RefreshToken;
use crate::models::user::{LoginId, User};

/// In-memory user repository.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().unwrap().get(&id).cloned())
    }

    async fn find_by_login_id(&self, login_id: &LoginId) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| &u.login_id == login_id)
            .cloned())
    }

    async fn login_id_exists(&self, login_id: &LoginId) -> StoreResult<bool> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .any(|u| &u.login_id == login_id))
    }

    async fn save(&self, user: &User) -> StoreResult<()> {
        self.users.write().unwrap().insert(user.id, user.clone());
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// In-memory refresh-token store.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: RwLock<HashMap<Uuid, RefreshToken>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, revoked or not.
    pub fn len(&self) -> usize {
        self.tokens.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn save(&self, token: &RefreshToken) -> StoreResult<()> {
        self.tokens.write().unwrap().insert(token.id, token.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(self
            .tokens
            .read()
            .unwrap()
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn find_valid_by_user(&self, user_id: Uuid) -> StoreResult<Vec<RefreshToken>> {
        let mut valid: Vec<RefreshToken> = self
            .tokens
            .read()
            .unwrap()
            .values()
            .filter(|t| t.belongs_to(user_id) && t.is_valid())
            .cloned()
            .collect();
        valid.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(valid)
    }

    async fn revoke(&self, id: Uuid) -> StoreResult<bool> {
        let mut tokens = self.tokens.write().unwrap();
        match tokens.get_mut(&id) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut tokens = self.tokens.write().unwrap();
        let mut flipped = 0;
        for token in tokens.values_mut() {
            if token.belongs_to(user_id) && !token.revoked {
                token.revoked = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        let mut tokens = self.tokens.write().unwrap();
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired());
        Ok((before - tokens.len()) as u64)
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()> {
        self.tokens.write().unwrap().remove(&id);
        Ok(())
    }
}
