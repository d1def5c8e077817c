//! Refresh token manager
//!
//! Refresh tokens are 256 random bits, hex encoded. They carry no structure;
//! only the credential store gives them meaning. Resolving a token never
//! mutates it: the same token keeps minting access tokens until it expires
//! or is revoked.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::RngCore;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::repo::CredentialStore;
use crate::types::RefreshTokenRecord;

/// Raw bytes per refresh token
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Generate an opaque refresh token (64 hex characters)
pub fn generate_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct RefreshTokenManager {
    store: Arc<dyn CredentialStore>,
    ttl: Duration,
}

impl RefreshTokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Mint, persist and return a new token for `user_id`
    pub async fn issue(&self, user_id: Uuid) -> Result<String> {
        let token = generate_token();
        let now = Utc::now();
        self.store
            .create_refresh_token(RefreshTokenRecord::new(token.clone(), user_id, now, now + self.ttl))
            .await?;
        debug!(user_id = %user_id, "Refresh token issued");
        Ok(token)
    }

    /// Owner of a live token
    pub async fn resolve_owner(&self, token: &str) -> Result<Uuid> {
        let user = self
            .store
            .get_user_by_valid_refresh_token(token, Utc::now())
            .await?;
        Ok(user.id)
    }

    /// Revoke a token. Unknown and already-revoked tokens are errors.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        self.store.revoke_refresh_token(token, Utc::now()).await?;
        info!("Refresh token revoked");
        Ok(())
    }
}
