//! SessionService — signup, login, refresh, revoke and the account flows
//! built on them.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chirpy_core::auth::SessionService;
//! use chirpy_core::repo::MemoryRepository;
//! use chirpy_core::{AuthConfig, Credentials};
//!
//! #[tokio::main]
//! async fn main() -> chirpy_core::Result<()> {
//!     let config = Arc::new(AuthConfig::new("my-production-secret"));
//!     let service = SessionService::new(Arc::new(MemoryRepository::new()), config);
//!
//!     let grant = service.signup(Credentials::new("a@b.com", "pw123456")).await?;
//!     let access = service.refresh(&grant.tokens.refresh_token).await?;
//!     service.revoke(&grant.tokens.refresh_token).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::access;
use crate::auth::password;
use crate::auth::refresh::RefreshTokenManager;
use crate::config::{AuthConfig, Platform};
use crate::error::{AuthError, Result};
use crate::repo::CredentialStore;
use crate::types::{
    Credentials, SessionGrant, SessionTokens, USER_UPGRADED_EVENT, UpgradeEvent, User, UserProfile,
    WebhookOutcome,
};

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn CredentialStore>,
    refresh: RefreshTokenManager,
    config: Arc<AuthConfig>,
}

impl SessionService {
    pub fn new(store: Arc<dyn CredentialStore>, config: Arc<AuthConfig>) -> Self {
        let refresh = RefreshTokenManager::new(Arc::clone(&store), config.refresh_token_ttl);
        Self {
            store,
            refresh,
            config,
        }
    }

    // ─── Session Flows ───

    /// Register and open a session in one step
    pub async fn signup(&self, credentials: Credentials) -> Result<SessionGrant> {
        let user = self.register(credentials).await?;
        self.open_session(&user).await
    }

    /// Unknown email and wrong password fail identically
    pub async fn login(&self, credentials: Credentials) -> Result<SessionGrant> {
        let user = match self.store.get_user_by_email(&credentials.email).await {
            Ok(user) => user,
            Err(AuthError::UserNotFound(_)) => {
                password::verify_dummy(credentials.password).await?;
                warn!("Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        if !password::verify_password(credentials.password, user.hashed_password.clone()).await? {
            warn!(user_id = %user.id, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, "Login successful");
        self.open_session(&user).await
    }

    /// Mint a new access token from a live refresh token. The refresh token
    /// itself is left untouched.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let user_id = self.refresh.resolve_owner(refresh_token).await?;
        access::mint(user_id, &self.config.jwt_secret, self.config.access_token_ttl)
    }

    /// Revoke a refresh token (logout and explicit revoke)
    pub async fn revoke(&self, refresh_token: &str) -> Result<()> {
        self.refresh.revoke(refresh_token).await
    }

    // ─── Account Flows ───

    /// Register without opening a session
    pub async fn create_user(&self, credentials: Credentials) -> Result<UserProfile> {
        Ok(self.register(credentials).await?.profile())
    }

    /// Replace the caller's own email and password
    pub async fn update_credentials(&self, user_id: Uuid, credentials: Credentials) -> Result<UserProfile> {
        validate_email(&credentials.email)?;
        password::check_strength(&credentials.password)?;
        let hash = password::hash_password(credentials.password).await?;
        let user = self
            .store
            .update_user_credentials(user_id, &credentials.email, &hash)
            .await?;
        info!(user_id = %user.id, "Credentials updated");
        Ok(user.profile())
    }

    // ─── Webhook ───

    /// Constant-time comparison against the configured webhook key
    pub fn verify_api_key(&self, presented: &str) -> Result<()> {
        let expected = self.config.polka_key.as_str();
        if expected.is_empty() || !keys_match(presented, expected) {
            warn!("Webhook API key rejected");
            return Err(AuthError::InvalidApiKey);
        }
        Ok(())
    }

    /// Flip the upgrade flag for `user.upgraded`; every other event is a no-op
    pub async fn apply_upgrade_event(&self, event: &UpgradeEvent) -> Result<WebhookOutcome> {
        if event.event != USER_UPGRADED_EVENT {
            info!(event = %event.event, "Webhook event ignored");
            return Ok(WebhookOutcome::Ignored);
        }
        let user_id = Uuid::parse_str(&event.data.user_id)
            .map_err(|_| AuthError::UserNotFound(event.data.user_id.clone()))?;
        self.store.set_upgrade_flag(user_id).await?;
        info!(user_id = %user_id, "User upgraded to Chirpy Red");
        Ok(WebhookOutcome::Applied)
    }

    // ─── Admin ───

    /// Wipe every user. Only allowed on the dev platform.
    pub async fn reset(&self) -> Result<()> {
        if self.config.platform != Platform::Dev {
            return Err(AuthError::Forbidden(format!(
                "reset is disabled on platform {}",
                self.config.platform
            )));
        }
        self.store.reset().await
    }

    // ─── Helpers ───

    async fn register(&self, credentials: Credentials) -> Result<User> {
        validate_email(&credentials.email)?;
        password::check_strength(&credentials.password)?;
        let hash = password::hash_password(credentials.password).await?;
        let user = self.store.create_user(&credentials.email, &hash).await?;
        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    async fn open_session(&self, user: &User) -> Result<SessionGrant> {
        let access_token = access::mint(user.id, &self.config.jwt_secret, self.config.access_token_ttl)?;
        let refresh_token = self.refresh.issue(user.id).await?;
        Ok(SessionGrant {
            user: user.profile(),
            tokens: SessionTokens {
                access_token,
                refresh_token,
            },
        })
    }
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::MalformedRequest("A valid email is required".into()));
    }
    Ok(())
}

/// Compares SHA-256 digests so the work done is independent of both the
/// contents and the lengths of the keys
fn keys_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
