//! JWT token generation and verification.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;
use uuid::Uuid;

use super::AuthError;
use crate::models::token::{TokenClaims, TokenType};
use crate::models::user::{LoginId, Role, User};
use crate::uuid::uuidv7;

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 30 days.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Default `iss` claim.
const DEFAULT_ISSUER: &str = "typedrill";

/// Immutable signing configuration, constructed once at startup and handed
/// to the codec. There is no process-global key.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: DEFAULT_ISSUER.to_string(),
            access_ttl: Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh_ttl: Duration::days(REFRESH_TOKEN_TTL_DAYS),
        }
    }
}

/// Encodes and decodes signed tokens (HS256).
///
/// Decoding fails closed: any malformed, tampered, mis-issued, or expired
/// input yields `None`, never a panic or error surface for untrusted data.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    config: TokenConfig,
}

impl TokenCodec {
    pub fn new(config: TokenConfig) -> Self {
        let encoding = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        Self {
            encoding,
            decoding,
            validation,
            config,
        }
    }

    /// Mint a short-lived ACCESS token for the user.
    pub fn issue_access_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue(
            user.id,
            user.login_id.as_str(),
            user.role,
            TokenType::Access,
            self.config.access_ttl,
        )
    }

    /// Mint a long-lived REFRESH token for the user.
    pub fn issue_refresh_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue(
            user.id,
            user.login_id.as_str(),
            user.role,
            TokenType::Refresh,
            self.config.refresh_ttl,
        )
    }

    /// Mint an ACCESS token for an ephemeral guest identity. Guests get no
    /// refresh token and nothing is persisted for them.
    pub fn issue_guest_token(
        &self,
        user_id: Uuid,
        login_id: &LoginId,
    ) -> Result<String, AuthError> {
        self.issue(
            user_id,
            login_id.as_str(),
            Role::Guest,
            TokenType::Access,
            self.config.access_ttl,
        )
    }

    fn issue(
        &self,
        user_id: Uuid,
        login_id: &str,
        role: Role,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            login_id: login_id.to_string(),
            role: role.as_str().to_string(),
            token_type,
            jti: uuidv7().to_string(),
            iss: self.config.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Token(format!("jwt encode: {e}")))
    }

    /// Verify a token, returning the claims on success.
    pub fn decode(&self, token: &str) -> Option<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Whether the token decodes and carries `tokenType = REFRESH`.
    pub fn is_refresh_token(&self, token: &str) -> bool {
        self.decode(token)
            .is_some_and(|c| c.token_type == TokenType::Refresh)
    }

    /// Whether the token decodes and carries `tokenType = ACCESS`.
    pub fn is_access_token(&self, token: &str) -> bool {
        self.decode(token)
            .is_some_and(|c| c.token_type == TokenType::Access)
    }

    /// Access token lifetime in seconds, for `expiresIn` responses.
    pub fn access_ttl_secs(&self) -> i64 {
        self.config.access_ttl.num_seconds()
    }

    /// Refresh token lifetime, for computing row expiry.
    pub fn refresh_ttl(&self) -> Duration {
        self.config.refresh_ttl
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET`, then `AUTH_SECRET`, then a
/// persisted file (generated on first use).
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    // Generate and persist
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("typedrill")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use crate::models::user::PasswordHash;

    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(TokenConfig::new("unit-test-secret"))
    }

    fn user() -> User {
        User::new(
            LoginId::parse("alice").unwrap(),
            PasswordHash::new("hash"),
            Role::User,
        )
    }

    #[test]
    fn access_token_round_trips() {
        let codec = codec();
        let user = user();
        let token = codec.issue_access_token(&user).unwrap();

        let claims = codec.decode(&token).expect("decode");
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.login_id, "alice");
        assert_eq!(claims.role, "USER");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.user_id(), Some(user.id));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_types_are_distinguished() {
        let codec = codec();
        let user = user();
        let access = codec.issue_access_token(&user).unwrap();
        let refresh = codec.issue_refresh_token(&user).unwrap();

        assert!(codec.is_access_token(&access));
        assert!(!codec.is_refresh_token(&access));
        assert!(codec.is_refresh_token(&refresh));
        assert!(!codec.is_access_token(&refresh));
    }

    #[test]
    fn tokens_minted_together_are_distinct() {
        let codec = codec();
        let user = user();
        let a = codec.issue_refresh_token(&user).unwrap();
        let b = codec.issue_refresh_token(&user).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn decode_fails_closed_on_garbage() {
        let codec = codec();
        assert!(codec.decode("not-a-jwt").is_none());
        assert!(codec.decode("").is_none());
        assert!(!codec.is_refresh_token("ey.bogus.token"));
    }

    #[test]
    fn decode_rejects_wrong_secret() {
        let user = user();
        let token = codec().issue_access_token(&user).unwrap();
        let other = TokenCodec::new(TokenConfig::new("another-secret"));
        assert!(other.decode(&token).is_none());
    }

    #[test]
    fn decode_rejects_expired_tokens() {
        let mut config = TokenConfig::new("unit-test-secret");
        config.access_ttl = Duration::seconds(-120);
        let codec = TokenCodec::new(config);
        let token = codec.issue_access_token(&user()).unwrap();
        assert!(codec.decode(&token).is_none());
    }

    #[test]
    fn guest_tokens_carry_the_guest_role() {
        let codec = codec();
        let login_id = LoginId::parse("guest_123").unwrap();
        let token = codec.issue_guest_token(Uuid::new_v4(), &login_id).unwrap();
        let claims = codec.decode(&token).unwrap();
        assert_eq!(claims.role, "GUEST");
        assert_eq!(claims.token_type, TokenType::Access);
    }
}
