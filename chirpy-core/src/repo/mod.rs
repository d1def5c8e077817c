//! Credential and chirp stores
//!
//! Both traits are object safe and handed to the services as
//! `Arc<dyn ...>` built at process start. There is no global store: tests
//! open a fresh one each, and the server closes its one on shutdown.
//!
//! - [`MemoryRepository`]: hash maps behind a tokio mutex
//! - [`DeltaRepository`]: Delta Lake tables with a serialized writer (feature `delta`)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Chirp, RefreshTokenRecord, User};

pub mod memory;

#[cfg(feature = "delta")]
pub mod delta;

pub use memory::MemoryRepository;

#[cfg(feature = "delta")]
pub use delta::DeltaRepository;

/// Users and refresh tokens
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `UserNotFound` when no user has this email
    async fn get_user_by_email(&self, email: &str) -> Result<User>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<User>;

    /// `DuplicateEmail` when the email is taken
    async fn create_user(&self, email: &str, hashed_password: &str) -> Result<User>;

    /// Replace email and password hash. `UserNotFound` for an unknown id,
    /// `DuplicateEmail` when the new email belongs to someone else.
    async fn update_user_credentials(&self, id: Uuid, email: &str, hashed_password: &str) -> Result<User>;

    async fn set_upgrade_flag(&self, id: Uuid) -> Result<()>;

    async fn create_refresh_token(&self, record: RefreshTokenRecord) -> Result<()>;

    /// Owner of a token that is unrevoked and unexpired at `now`.
    /// `RefreshTokenNotFound`, `RefreshTokenRevoked` or `RefreshTokenExpired` otherwise.
    async fn get_user_by_valid_refresh_token(&self, token: &str, now: DateTime<Utc>) -> Result<User>;

    /// Stamp `revoked_at`. `RefreshTokenNotFound` for unknown tokens,
    /// `RefreshTokenRevoked` when already revoked (the first stamp is kept).
    async fn revoke_refresh_token(&self, token: &str, at: DateTime<Utc>) -> Result<()>;

    /// Delete every user together with their tokens and chirps
    async fn reset(&self) -> Result<()>;

    /// Release the store. Later calls fail with `Persistence` or `ActorUnavailable`.
    async fn close(&self) -> Result<()>;
}

/// Posted chirps
#[async_trait]
pub trait ChirpStore: Send + Sync {
    async fn create_chirp(&self, body: &str, user_id: Uuid) -> Result<Chirp>;

    /// `ChirpNotFound` when absent
    async fn get_chirp(&self, id: Uuid) -> Result<Chirp>;

    /// All chirps, or one author's, oldest first
    async fn list_chirps(&self, author: Option<Uuid>) -> Result<Vec<Chirp>>;

    async fn delete_chirp(&self, id: Uuid) -> Result<()>;
}
