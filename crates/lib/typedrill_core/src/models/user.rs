//! The user aggregate.
//!
//! `User` owns all login-tracking state; the streak arithmetic lives in
//! `LoginStatistics`, a pure value type so it can be exercised without a
//! store. Mutation goes through `record_login` only.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Minimum login id length.
const LOGIN_ID_MIN: usize = 3;

/// Maximum login id length.
const LOGIN_ID_MAX: usize = 50;

/// A validated login identifier: 3 to 50 characters from `[a-zA-Z0-9_-]`,
/// trimmed on construction, compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoginId(String);

/// Reasons a login id fails validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginIdError {
    #[error("Login ID cannot be empty")]
    Empty,

    #[error("Login ID must be at least {LOGIN_ID_MIN} characters long")]
    TooShort,

    #[error("Login ID cannot exceed {LOGIN_ID_MAX} characters")]
    TooLong,

    #[error("Login ID can only contain letters, numbers, underscores, and hyphens")]
    InvalidCharacters,
}

impl LoginId {
    pub fn parse(value: &str) -> Result<Self, LoginIdError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LoginIdError::Empty);
        }
        if trimmed.len() < LOGIN_ID_MIN {
            return Err(LoginIdError::TooShort);
        }
        if trimmed.len() > LOGIN_ID_MAX {
            return Err(LoginIdError::TooLong);
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(LoginIdError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque password hash produced by the hasher in `auth::password`.
/// Debug output is redacted so the hash never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// User role. Closed set; permissions are an exhaustive match so a new role
/// cannot be added without deciding what it may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
            Role::Guest => "GUEST",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "USER" => Some(Role::User),
            "GUEST" => Some(Role::Guest),
            _ => None,
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        match self {
            // Admin holds every permission
            Role::Admin => true,
            Role::User => !permission.starts_with("ADMIN_"),
            Role::Guest => permission.starts_with("READ_"),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Role::Guest)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login-streak statistics.
///
/// Invariants held by every transition: `current_streak <= max_streak` and
/// `total_login_days >= current_streak`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginStatistics {
    pub last_login_date: Option<NaiveDate>,
    pub current_streak: u32,
    pub max_streak: u32,
    pub total_login_days: u32,
}

impl LoginStatistics {
    /// Zeroed statistics for a freshly registered user.
    pub fn initial() -> Self {
        Self {
            last_login_date: None,
            current_streak: 0,
            max_streak: 0,
            total_login_days: 0,
        }
    }

    /// Fold a login date into the statistics.
    ///
    /// Logging in twice on the same date is a no-op. A date exactly one day
    /// after the last login extends the streak; any other date (a gap of two
    /// or more days, or a date before the last login) resets the streak to 1.
    pub fn update_for_login(self, login_date: NaiveDate) -> Self {
        let Some(last) = self.last_login_date else {
            // First-ever login
            return Self {
                last_login_date: Some(login_date),
                current_streak: 1,
                max_streak: self.max_streak.max(1),
                total_login_days: self.total_login_days + 1,
            };
        };

        if login_date == last {
            return self;
        }

        let current_streak = if last.succ_opt() == Some(login_date) {
            self.current_streak + 1
        } else {
            1
        };

        Self {
            last_login_date: Some(login_date),
            current_streak,
            max_streak: self.max_streak.max(current_streak),
            total_login_days: self.total_login_days + 1,
        }
    }

    pub fn has_logged_in_on(&self, date: NaiveDate) -> bool {
        self.last_login_date == Some(date)
    }
}

/// The user aggregate root.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub login_id: LoginId,
    pub password_hash: PasswordHash,
    pub role: Role,
    pub statistics: LoginStatistics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with zeroed login statistics.
    pub fn new(login_id: LoginId, password_hash: PasswordHash, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            login_id,
            password_hash,
            role,
            statistics: LoginStatistics::initial(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a successful login, updating the streak statistics and bumping
    /// `updated_at`.
    pub fn record_login(&mut self, login_date: NaiveDate) {
        self.statistics = self.statistics.update_for_login(login_date);
        self.updated_at = Utc::now();
    }

    pub fn has_logged_in_today(&self) -> bool {
        self.statistics.has_logged_in_on(Utc::now().date_naive())
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.role.has_permission(permission)
    }
}
