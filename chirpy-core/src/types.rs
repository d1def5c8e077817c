//! Domain types — users, refresh-token records, chirps
//!
//! Serializable, cloneable, and cheap to pass around. Nothing that leaves the
//! process (profiles, chirps) carries a password hash.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, Result};

/// Stored user record
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_chirpy_red: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            is_chirpy_red: self.is_chirpy_red,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("is_chirpy_red", &self.is_chirpy_red)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub is_chirpy_red: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted refresh token
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    pub fn new(token: String, user_id: Uuid, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token,
            user_id,
            created_at: now,
            updated_at: now,
            expires_at,
            revoked_at: None,
        }
    }

    /// The one validity rule every store applies: a token is usable only
    /// while it is unrevoked and `now < expires_at`.
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<()> {
        if self.revoked_at.is_some() {
            return Err(AuthError::RefreshTokenRevoked);
        }
        if now >= self.expires_at {
            return Err(AuthError::RefreshTokenExpired);
        }
        Ok(())
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

impl fmt::Debug for RefreshTokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenRecord")
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("revoked_at", &self.revoked_at)
            .finish_non_exhaustive()
    }
}

/// A posted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chirp {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub body: String,
    pub user_id: Uuid,
}

/// Email + password pair from signup, login, create and update requests
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Both tokens minted by signup and login
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionTokens { .. }")
    }
}

/// Result of a successful signup or login
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub user: UserProfile,
    pub tokens: SessionTokens,
}

/// Payment provider webhook payload
#[derive(Debug, Clone, Deserialize)]
pub struct UpgradeEvent {
    pub event: String,
    pub data: UpgradeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpgradeEventData {
    pub user_id: String,
}

/// Event name that flips the upgrade flag; every other event is ignored
pub const USER_UPGRADED_EVENT: &str = "user.upgraded";

/// What the webhook did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied,
    Ignored,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(now: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord::new("ab".repeat(32), Uuid::new_v4(), now, now + Duration::days(60))
    }

    #[test]
    fn test_fresh_token_is_usable() {
        let now = Utc::now();
        assert!(record(now).check_usable(now).is_ok());
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let rec = record(now);
        assert!(rec.check_usable(rec.expires_at - Duration::seconds(1)).is_ok());
        assert!(matches!(
            rec.check_usable(rec.expires_at),
            Err(AuthError::RefreshTokenExpired)
        ));
    }

    #[test]
    fn test_revocation_wins_over_expiry() {
        let now = Utc::now();
        let mut rec = record(now);
        rec.revoked_at = Some(now);
        assert!(matches!(
            rec.check_usable(now + Duration::days(90)),
            Err(AuthError::RefreshTokenRevoked)
        ));
    }

    #[test]
    fn test_profile_has_no_hash() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.com".into(),
            hashed_password: "$argon2id$v=19$secret".into(),
            is_chirpy_red: false,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user.profile()).unwrap();
        assert!(json.contains("\"is_chirpy_red\":false"));
        assert!(!json.contains("argon2"));
        assert!(!format!("{user:?}").contains("argon2"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("a@b.com", "pw123456");
        assert!(!format!("{creds:?}").contains("pw123456"));
    }
}
