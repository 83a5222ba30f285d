//! The authentication workflow.
//!
//! Orchestrates login, registration, refresh rotation, and revocation over
//! the store contracts and the token codec. Every refresh retires the token
//! that was presented: a refresh token is single-use, so a leaked one is
//! good for at most one rotation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{AuthError, password};
use crate::auth::jwt::TokenCodec;
use crate::models::token::RefreshToken;
use crate::models::user::{LoginId, PasswordHash, Role, User};
use crate::store::{RefreshTokenStore, UserRepository};

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LENGTH: usize = 8;

/// A freshly minted token pair plus the identity it belongs to.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user_id: Uuid,
    pub login_id: String,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

/// A guest access token for an ephemeral identity. No refresh token is
/// issued and nothing is persisted.
#[derive(Debug, Clone)]
pub struct GuestSession {
    pub user_id: Uuid,
    pub login_id: String,
    pub access_token: String,
    pub expires_in: i64,
}

pub struct AuthenticationWorkflow {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn RefreshTokenStore>,
    codec: Arc<TokenCodec>,
}

impl AuthenticationWorkflow {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn RefreshTokenStore>,
        codec: Arc<TokenCodec>,
    ) -> Self {
        Self {
            users,
            tokens,
            codec,
        }
    }

    // -----------------------------------------------------------------------
    // Login & registration
    // -----------------------------------------------------------------------

    /// Authenticate with login id + password. On success the user's streak
    /// statistics are folded forward with today's date and saved.
    pub async fn login(
        &self,
        login_id: &str,
        password: &str,
    ) -> Result<AuthenticatedSession, AuthError> {
        // A malformed id cannot name an account; same failure as unknown id.
        let login_id = LoginId::parse(login_id).map_err(|_| AuthError::InvalidCredentials)?;

        let Some(mut user) = self.users.find_by_login_id(&login_id).await? else {
            warn!("login rejected: unknown login id");
            return Err(AuthError::InvalidCredentials);
        };

        if !password::verify_password(password, user.password_hash.as_str())? {
            warn!(login_id = %user.login_id, "login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        user.record_login(Utc::now().date_naive());
        self.users.save(&user).await?;
        debug!(
            login_id = %user.login_id,
            streak = user.statistics.current_streak,
            "login successful"
        );

        self.issue_session(&user).await
    }

    /// Register a new account with zeroed statistics and the USER role.
    pub async fn register(
        &self,
        login_id: &str,
        password: &str,
    ) -> Result<AuthenticatedSession, AuthError> {
        let login_id =
            LoginId::parse(login_id).map_err(|e| AuthError::Validation(e.to_string()))?;

        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        if self.users.login_id_exists(&login_id).await? {
            return Err(AuthError::Validation("Login ID already registered".into()));
        }

        let hash = password::hash_password(password)?;
        let user = User::new(login_id, PasswordHash::new(hash), Role::User);
        self.users.save(&user).await?;
        info!(login_id = %user.login_id, "registered new user");

        self.issue_session(&user).await
    }

    /// Create a guest access token for an ephemeral identity.
    pub async fn guest_session(&self) -> Result<GuestSession, AuthError> {
        let user_id = Uuid::new_v4();
        let login_id = LoginId::parse(&format!("guest_{}", Utc::now().timestamp_millis()))
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let access_token = self.codec.issue_guest_token(user_id, &login_id)?;
        debug!(login_id = %login_id, "created guest session");

        Ok(GuestSession {
            user_id,
            login_id: login_id.as_str().to_string(),
            access_token,
            expires_in: self.codec.access_ttl_secs(),
        })
    }

    // -----------------------------------------------------------------------
    // Refresh rotation
    // -----------------------------------------------------------------------

    /// Exchange a refresh token for a new pair, retiring the presented token.
    ///
    /// Of two concurrent calls presenting the same token, exactly one wins;
    /// the loser fails on the compare-and-set revoke. The old token is
    /// revoked before the new record is saved, so there is no window in
    /// which both are handed out as valid.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthenticatedSession, AuthError> {
        if !self.codec.is_refresh_token(refresh_token) {
            warn!("refresh rejected: not a valid refresh token");
            return Err(AuthError::InvalidRefreshToken);
        }

        let Some(record) = self.tokens.find_by_token(refresh_token).await? else {
            warn!("refresh rejected: token not found");
            return Err(AuthError::InvalidRefreshToken);
        };

        if !record.is_valid() {
            warn!(user_id = %record.user_id, "refresh rejected: token revoked or expired");
            self.tokens.delete_by_id(record.id).await?;
            return Err(AuthError::RefreshTokenExpired);
        }

        // The token row is deliberately left in place here: an orphaned
        // token is a data-integrity signal worth keeping visible.
        let Some(user) = self.users.find_by_id(record.user_id).await? else {
            error!(user_id = %record.user_id, "stored refresh token has no owning user");
            return Err(AuthError::UserNotFound);
        };

        let access_token = self.codec.issue_access_token(&user)?;
        let new_refresh = self.codec.issue_refresh_token(&user)?;

        if !self.tokens.revoke(record.id).await? {
            warn!(user_id = %record.user_id, "refresh lost the rotation race");
            return Err(AuthError::RefreshTokenExpired);
        }

        let new_record = RefreshToken::issue(
            user.id,
            new_refresh.clone(),
            Utc::now() + self.codec.refresh_ttl(),
        );
        self.tokens.save(&new_record).await?;
        debug!(login_id = %user.login_id, "token refresh successful");

        Ok(AuthenticatedSession {
            user_id: user.id,
            login_id: user.login_id.as_str().to_string(),
            role: user.role,
            access_token,
            refresh_token: new_refresh,
            expires_in: self.codec.access_ttl_secs(),
        })
    }

    // -----------------------------------------------------------------------
    // Revocation
    // -----------------------------------------------------------------------

    /// Revoke a single refresh token. Unknown values are a silent no-op:
    /// logging out an already-dead token is not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if let Some(record) = self.tokens.find_by_token(refresh_token).await? {
            self.tokens.revoke(record.id).await?;
            debug!(user_id = %record.user_id, "refresh token revoked on logout");
        }
        Ok(())
    }

    /// Revoke every refresh token the user owns (logout from all devices).
    pub async fn logout_all(&self, user_id: Uuid) -> Result<(), AuthError> {
        let revoked = self.tokens.revoke_all_for_user(user_id).await?;
        debug!(%user_id, revoked, "revoked all refresh tokens");
        Ok(())
    }

    /// Sweep expired refresh-token rows. Returns the number removed.
    pub async fn delete_expired_tokens(&self) -> Result<u64, AuthError> {
        Ok(self.tokens.delete_expired().await?)
    }

    /// Whether the backing store answers a connectivity probe.
    pub async fn store_healthy(&self) -> bool {
        self.users.ping().await.is_ok()
    }

    // -----------------------------------------------------------------------

    /// Mint an access/refresh pair for the user and persist the refresh
    /// record.
    async fn issue_session(&self, user: &User) -> Result<AuthenticatedSession, AuthError> {
        let access_token = self.codec.issue_access_token(user)?;
        let refresh_token = self.codec.issue_refresh_token(user)?;

        let record = RefreshToken::issue(
            user.id,
            refresh_token.clone(),
            Utc::now() + self.codec.refresh_ttl(),
        );
        self.tokens.save(&record).await?;

        Ok(AuthenticatedSession {
            user_id: user.id,
            login_id: user.login_id.as_str().to_string(),
            role: user.role,
            access_token,
            refresh_token,
            expires_in: self.codec.access_ttl_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::auth::jwt::TokenConfig;
    use crate::store::memory::{InMemoryRefreshTokenStore, InMemoryUserRepository};

    struct Fixture {
        workflow: AuthenticationWorkflow,
        users: Arc<InMemoryUserRepository>,
        tokens: Arc<InMemoryRefreshTokenStore>,
        codec: Arc<TokenCodec>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserRepository::new());
        let tokens = Arc::new(InMemoryRefreshTokenStore::new());
        let codec = Arc::new(TokenCodec::new(TokenConfig::new("workflow-test-secret")));
        let workflow = AuthenticationWorkflow::new(
            Arc::clone(&users) as Arc<dyn UserRepository>,
            Arc::clone(&tokens) as Arc<dyn RefreshTokenStore>,
            Arc::clone(&codec),
        );
        Fixture {
            workflow,
            users,
            tokens,
            codec,
        }
    }

    async fn register_alice(fx: &Fixture) -> AuthenticatedSession {
        fx.workflow
            .register("alice", "password123")
            .await
            .expect("register")
    }

    #[tokio::test]
    async fn register_issues_a_distinct_token_pair() {
        let fx = fixture();
        let session = register_alice(&fx).await;

        assert_eq!(session.login_id, "alice");
        assert_eq!(session.role, Role::User);
        assert!(!session.access_token.is_empty());
        assert!(!session.refresh_token.is_empty());
        assert_ne!(session.access_token, session.refresh_token);
        assert!(session.expires_in > 0);

        // Registration leaves statistics zeroed.
        let user = fx.users.find_by_id(session.user_id).await.unwrap().unwrap();
        assert_eq!(user.statistics.current_streak, 0);
        assert_eq!(user.statistics.total_login_days, 0);
    }

    #[tokio::test]
    async fn register_rejects_short_passwords_and_duplicates() {
        let fx = fixture();
        register_alice(&fx).await;

        assert!(matches!(
            fx.workflow.register("bob", "short").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            fx.workflow.register("alice", "password123").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            fx.workflow.register("a!", "password123").await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn login_updates_streak_statistics() {
        let fx = fixture();
        let registered = register_alice(&fx).await;

        let session = fx.workflow.login("alice", "password123").await.unwrap();
        assert_eq!(session.user_id, registered.user_id);

        let user = fx.users.find_by_id(session.user_id).await.unwrap().unwrap();
        assert_eq!(user.statistics.current_streak, 1);
        assert_eq!(user.statistics.max_streak, 1);
        assert_eq!(user.statistics.total_login_days, 1);

        // Second login the same day: tokens are minted but the streak does
        // not double-count.
        fx.workflow.login("alice", "password123").await.unwrap();
        let user = fx.users.find_by_id(session.user_id).await.unwrap().unwrap();
        assert_eq!(user.statistics.total_login_days, 1);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let fx = fixture();
        register_alice(&fx).await;

        let unknown = fx.workflow.login("mallory", "password123").await;
        let wrong = fx.workflow.login("alice", "wrong-password").await;
        let malformed = fx.workflow.login("not a login id!", "password123").await;

        for result in [unknown, wrong, malformed] {
            match result {
                Err(AuthError::InvalidCredentials) => {}
                other => panic!("expected InvalidCredentials, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn refresh_rotates_and_the_old_token_is_single_use() {
        let fx = fixture();
        let session = register_alice(&fx).await;

        let rotated = fx.workflow.refresh(&session.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, session.refresh_token);
        assert_ne!(rotated.access_token, session.access_token);

        // The presented token was retired; a replay fails.
        assert!(matches!(
            fx.workflow.refresh(&session.refresh_token).await,
            Err(AuthError::RefreshTokenExpired) | Err(AuthError::InvalidRefreshToken)
        ));

        // The rotated token still works exactly once.
        fx.workflow.refresh(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens_and_garbage() {
        let fx = fixture();
        let session = register_alice(&fx).await;

        assert!(matches!(
            fx.workflow.refresh(&session.access_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(matches!(
            fx.workflow.refresh("garbage").await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn refresh_rejects_unknown_but_well_signed_tokens() {
        let fx = fixture();
        let session = register_alice(&fx).await;
        let user = fx.users.find_by_id(session.user_id).await.unwrap().unwrap();

        // Correctly signed, right type, but never persisted.
        let stray = fx.codec.issue_refresh_token(&user).unwrap();
        assert!(matches!(
            fx.workflow.refresh(&stray).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn expired_refresh_token_is_deleted_on_use() {
        let fx = fixture();
        let session = register_alice(&fx).await;
        let user = fx.users.find_by_id(session.user_id).await.unwrap().unwrap();

        let value = fx.codec.issue_refresh_token(&user).unwrap();
        let record = RefreshToken::issue(user.id, value.clone(), Utc::now() - Duration::hours(1));
        fx.tokens.save(&record).await.unwrap();

        assert!(matches!(
            fx.workflow.refresh(&value).await,
            Err(AuthError::RefreshTokenExpired)
        ));
        // Cleanup happened: the row is gone.
        assert!(fx.tokens.find_by_token(&value).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn orphaned_token_yields_user_not_found_and_is_kept() {
        let fx = fixture();
        let session = register_alice(&fx).await;
        let user = fx.users.find_by_id(session.user_id).await.unwrap().unwrap();

        let mut orphan = user.clone();
        orphan.id = Uuid::new_v4();
        let value = fx.codec.issue_refresh_token(&orphan).unwrap();
        let record = RefreshToken::issue(orphan.id, value.clone(), Utc::now() + Duration::days(1));
        fx.tokens.save(&record).await.unwrap();

        assert!(matches!(
            fx.workflow.refresh(&value).await,
            Err(AuthError::UserNotFound)
        ));
        // The orphaned row is not deleted.
        assert!(fx.tokens.find_by_token(&value).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn concurrent_refreshes_of_one_token_yield_one_winner() {
        let fx = fixture();
        let session = register_alice(&fx).await;
        let token = session.refresh_token;

        let workflow = Arc::new(fx.workflow);
        let (a, b) = tokio::join!(workflow.refresh(&token), workflow.refresh(&token));

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one concurrent refresh may win");
        for result in [a, b] {
            if let Err(e) = result {
                assert!(matches!(
                    e,
                    AuthError::RefreshTokenExpired | AuthError::InvalidRefreshToken
                ));
            }
        }
    }

    #[tokio::test]
    async fn logout_revokes_and_unknown_tokens_are_a_no_op() {
        let fx = fixture();
        let session = register_alice(&fx).await;

        fx.workflow.logout(&session.refresh_token).await.unwrap();
        assert!(matches!(
            fx.workflow.refresh(&session.refresh_token).await,
            Err(AuthError::RefreshTokenExpired)
        ));

        // Logging out a token that no longer exists is fine.
        fx.workflow.logout(&session.refresh_token).await.unwrap();
        fx.workflow.logout("never-was-a-token").await.unwrap();
    }

    #[tokio::test]
    async fn logout_all_kills_every_session_including_older_ones() {
        let fx = fixture();
        let first = register_alice(&fx).await;
        let second = fx.workflow.login("alice", "password123").await.unwrap();

        fx.workflow.logout_all(first.user_id).await.unwrap();

        assert!(
            fx.tokens
                .find_valid_by_user(first.user_id)
                .await
                .unwrap()
                .is_empty()
        );
        for token in [first.refresh_token, second.refresh_token] {
            assert!(fx.workflow.refresh(&token).await.is_err());
        }
    }

    #[tokio::test]
    async fn guest_session_has_guest_role_and_no_refresh_token() {
        let fx = fixture();
        let guest = fx.workflow.guest_session().await.unwrap();

        assert!(guest.login_id.starts_with("guest_"));
        let claims = fx.codec.decode(&guest.access_token).unwrap();
        assert_eq!(claims.role, "GUEST");
        // Nothing was persisted for the guest.
        assert!(fx.tokens.is_empty());
    }
}
