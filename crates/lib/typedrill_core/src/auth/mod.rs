//! Authentication and authorization logic.
//!
//! Provides password hashing, the JWT token codec, and the workflow that
//! orchestrates login, registration, refresh rotation, and revocation over
//! the store contracts.

pub mod jwt;
pub mod password;
pub mod workflow;

use thiserror::Error;

use crate::store::StoreError;

/// Authentication failures.
///
/// `InvalidCredentials` carries the same message whether the login id was
/// unknown or the password wrong, so responses do not reveal which accounts
/// exist.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token has expired")]
    RefreshTokenExpired,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
