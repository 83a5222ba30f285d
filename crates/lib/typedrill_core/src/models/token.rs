//! Token models: persisted refresh-token records and the signed claim set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::uuid::uuidv7;

/// Whether a signed token is a short-lived bearer credential or a long-lived
/// refresh credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims embedded in every signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user id (standard JWT `sub` claim).
    pub sub: String,
    #[serde(rename = "loginId")]
    pub login_id: String,
    /// Role code (`ADMIN`, `USER`, `GUEST`).
    pub role: String,
    #[serde(rename = "tokenType")]
    pub token_type: TokenType,
    /// Unique token id; keeps two tokens minted in the same second distinct.
    pub jti: String,
    pub iss: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

impl TokenClaims {
    /// The subject parsed back into a user id, if well-formed.
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// A refresh-token row.
///
/// `revoked` is monotonic: once true it never reverts, so a rotated or
/// logged-out token stays dead even before its natural expiry.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Build a fresh, unrevoked record for a newly minted token value.
    pub fn issue(user_id: Uuid, token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: uuidv7(),
            user_id,
            token,
            expires_at,
            revoked: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// A record is usable iff it was never revoked and has not expired.
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.is_expired()
    }

    pub fn belongs_to(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn fresh_token_is_valid() {
        let token = RefreshToken::issue(
            Uuid::new_v4(),
            "token-value".into(),
            Utc::now() + Duration::days(30),
        );
        assert!(token.is_valid());
        assert!(!token.is_expired());
    }

    #[test]
    fn expired_token_is_invalid() {
        let token = RefreshToken::issue(
            Uuid::new_v4(),
            "token-value".into(),
            Utc::now() - Duration::minutes(1),
        );
        assert!(token.is_expired());
        assert!(!token.is_valid());
    }

    #[test]
    fn revoked_token_is_invalid_even_before_expiry() {
        let mut token = RefreshToken::issue(
            Uuid::new_v4(),
            "token-value".into(),
            Utc::now() + Duration::days(30),
        );
        token.revoked = true;
        assert!(!token.is_valid());
    }

    #[test]
    fn token_type_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&TokenType::Refresh).unwrap(),
            "\"REFRESH\""
        );
    }
}
