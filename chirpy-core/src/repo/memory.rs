//! In-memory store (tests, `CHIRPY_STORE=memory`)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::types::{Chirp, RefreshTokenRecord, User};

use super::{ChirpStore, CredentialStore};

struct StoreData {
    users: HashMap<Uuid, User>,                      // id -> user
    emails: HashMap<String, Uuid>,                   // email -> id
    refresh_tokens: HashMap<String, RefreshTokenRecord>, // token -> record
    chirps: Vec<Chirp>,                              // insertion order
}

impl StoreData {
    fn new() -> Self {
        Self {
            users: HashMap::new(),
            emails: HashMap::new(),
            refresh_tokens: HashMap::new(),
            chirps: Vec::new(),
        }
    }
}

/// Hash maps behind a single async mutex. Every operation holds the lock for
/// its whole read-check-write, which gives the same atomicity the Delta
/// writer actor provides.
pub struct MemoryRepository {
    data: TokioMutex<StoreData>,
    closed: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            data: TokioMutex::new(StoreData::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AuthError::Persistence("store is closed".into()));
        }
        Ok(())
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.ensure_open()?;
        let data = self.data.lock().await;
        data.emails
            .get(email)
            .and_then(|id| data.users.get(id))
            .cloned()
            .ok_or_else(|| AuthError::UserNotFound(email.to_string()))
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<User> {
        self.ensure_open()?;
        let data = self.data.lock().await;
        data.users
            .get(&id)
            .cloned()
            .ok_or_else(|| AuthError::UserNotFound(id.to_string()))
    }

    async fn create_user(&self, email: &str, hashed_password: &str) -> Result<User> {
        self.ensure_open()?;
        let mut data = self.data.lock().await;
        if data.emails.contains_key(email) {
            return Err(AuthError::DuplicateEmail(email.to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            is_chirpy_red: false,
            created_at: now,
            updated_at: now,
        };
        data.emails.insert(user.email.clone(), user.id);
        data.users.insert(user.id, user.clone());
        debug!(user_id = %user.id, "User created");
        Ok(user)
    }

    async fn update_user_credentials(&self, id: Uuid, email: &str, hashed_password: &str) -> Result<User> {
        self.ensure_open()?;
        let mut data = self.data.lock().await;
        if let Some(owner) = data.emails.get(email) {
            if *owner != id {
                return Err(AuthError::DuplicateEmail(email.to_string()));
            }
        }

        let user = data
            .users
            .get_mut(&id)
            .ok_or_else(|| AuthError::UserNotFound(id.to_string()))?;
        let old_email = std::mem::replace(&mut user.email, email.to_string());
        user.hashed_password = hashed_password.to_string();
        user.updated_at = Utc::now();
        let updated = user.clone();

        data.emails.remove(&old_email);
        data.emails.insert(updated.email.clone(), id);
        Ok(updated)
    }

    async fn set_upgrade_flag(&self, id: Uuid) -> Result<()> {
        self.ensure_open()?;
        let mut data = self.data.lock().await;
        let user = data
            .users
            .get_mut(&id)
            .ok_or_else(|| AuthError::UserNotFound(id.to_string()))?;
        user.is_chirpy_red = true;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn create_refresh_token(&self, record: RefreshTokenRecord) -> Result<()> {
        self.ensure_open()?;
        let mut data = self.data.lock().await;
        if !data.users.contains_key(&record.user_id) {
            return Err(AuthError::UserNotFound(record.user_id.to_string()));
        }
        if data.refresh_tokens.contains_key(&record.token) {
            return Err(AuthError::Persistence("refresh token collision".into()));
        }
        data.refresh_tokens.insert(record.token.clone(), record);
        Ok(())
    }

    async fn get_user_by_valid_refresh_token(&self, token: &str, now: DateTime<Utc>) -> Result<User> {
        self.ensure_open()?;
        let data = self.data.lock().await;
        let record = data
            .refresh_tokens
            .get(token)
            .ok_or(AuthError::RefreshTokenNotFound)?;
        record.check_usable(now)?;
        data.users
            .get(&record.user_id)
            .cloned()
            .ok_or_else(|| AuthError::UserNotFound(record.user_id.to_string()))
    }

    async fn revoke_refresh_token(&self, token: &str, at: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        let mut data = self.data.lock().await;
        let record = data
            .refresh_tokens
            .get_mut(token)
            .ok_or(AuthError::RefreshTokenNotFound)?;
        if record.is_revoked() {
            return Err(AuthError::RefreshTokenRevoked);
        }
        record.revoked_at = Some(at);
        record.updated_at = at;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.ensure_open()?;
        let mut data = self.data.lock().await;
        let users = data.users.len();
        *data = StoreData::new();
        info!(users, "Memory store reset");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        info!("Memory store closed");
        Ok(())
    }
}

#[async_trait]
impl ChirpStore for MemoryRepository {
    async fn create_chirp(&self, body: &str, user_id: Uuid) -> Result<Chirp> {
        self.ensure_open()?;
        let mut data = self.data.lock().await;
        if !data.users.contains_key(&user_id) {
            return Err(AuthError::UserNotFound(user_id.to_string()));
        }
        let now = Utc::now();
        let chirp = Chirp {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            body: body.to_string(),
            user_id,
        };
        data.chirps.push(chirp.clone());
        Ok(chirp)
    }

    async fn get_chirp(&self, id: Uuid) -> Result<Chirp> {
        self.ensure_open()?;
        let data = self.data.lock().await;
        data.chirps
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| AuthError::ChirpNotFound(id.to_string()))
    }

    async fn list_chirps(&self, author: Option<Uuid>) -> Result<Vec<Chirp>> {
        self.ensure_open()?;
        let data = self.data.lock().await;
        let mut chirps: Vec<Chirp> = data
            .chirps
            .iter()
            .filter(|c| author.is_none_or(|a| c.user_id == a))
            .cloned()
            .collect();
        chirps.sort_by_key(|c| c.created_at);
        Ok(chirps)
    }

    async fn delete_chirp(&self, id: Uuid) -> Result<()> {
        self.ensure_open()?;
        let mut data = self.data.lock().await;
        let before = data.chirps.len();
        data.chirps.retain(|c| c.id != id);
        if data.chirps.len() == before {
            return Err(AuthError::ChirpNotFound(id.to_string()));
        }
        Ok(())
    }
}
