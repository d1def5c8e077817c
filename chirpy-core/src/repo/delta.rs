//! DeltaRepository — credential and chirp store on Delta Lake
//!
//! Writes go through a single writer actor over an mpsc channel, so
//! check-then-write sequences (email uniqueness, revoke-once) cannot
//! interleave. Reads query the [`DeltaStore`] directly and always see the
//! latest committed version, which makes a revoke visible to the next
//! refresh lookup.
//!
//! A changed row is rewritten with a single Delta `update` commit, so a
//! concurrent reader sees either the old row or the new one and never a gap.
//!
//! # Usage
//!
//! ```rust,no_run
//! use chirpy_core::repo::{CredentialStore, DeltaRepository};
//!
//! #[tokio::main]
//! async fn main() -> chirpy_core::Result<()> {
//!     let repo = DeltaRepository::open("/data/chirpy").await?;
//!     let user = repo.create_user("a@b.com", "$argon2id$...").await?;
//!     repo.close().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use deltalake::arrow::array::{
    Array, ArrayRef, BooleanArray, LargeStringArray, RecordBatch, StringArray, StringViewArray,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::schema;
use crate::store::DeltaStore;
use crate::types::{Chirp, RefreshTokenRecord, User};

use super::{ChirpStore, CredentialStore};

// ─── Writer Messages ───

enum WriteMsg {
    CreateUser {
        email: String,
        hashed_password: String,
        reply: oneshot::Sender<Result<User>>,
    },
    UpdateCredentials {
        id: Uuid,
        email: String,
        hashed_password: String,
        reply: oneshot::Sender<Result<User>>,
    },
    SetUpgradeFlag {
        id: Uuid,
        reply: oneshot::Sender<Result<()>>,
    },
    CreateRefreshToken {
        record: RefreshTokenRecord,
        reply: oneshot::Sender<Result<()>>,
    },
    RevokeRefreshToken {
        token: String,
        at: DateTime<Utc>,
        reply: oneshot::Sender<Result<()>>,
    },
    CreateChirp {
        body: String,
        user_id: Uuid,
        reply: oneshot::Sender<Result<Chirp>>,
    },
    DeleteChirp {
        id: Uuid,
        reply: oneshot::Sender<Result<()>>,
    },
    Reset {
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ─── Writer Actor ───

/// Applies writes one at a time against the Delta tables
struct RepoWriter {
    store: Arc<DeltaStore>,
    rx: mpsc::Receiver<WriteMsg>,
}

impl RepoWriter {
    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                WriteMsg::CreateUser { email, hashed_password, reply } => {
                    let _ = reply.send(self.handle_create_user(&email, &hashed_password).await);
                }
                WriteMsg::UpdateCredentials { id, email, hashed_password, reply } => {
                    let _ = reply.send(self.handle_update_credentials(id, &email, &hashed_password).await);
                }
                WriteMsg::SetUpgradeFlag { id, reply } => {
                    let _ = reply.send(self.handle_set_upgrade_flag(id).await);
                }
                WriteMsg::CreateRefreshToken { record, reply } => {
                    let _ = reply.send(self.handle_create_refresh_token(record).await);
                }
                WriteMsg::RevokeRefreshToken { token, at, reply } => {
                    let _ = reply.send(self.handle_revoke(&token, at).await);
                }
                WriteMsg::CreateChirp { body, user_id, reply } => {
                    let _ = reply.send(self.handle_create_chirp(body, user_id).await);
                }
                WriteMsg::DeleteChirp { id, reply } => {
                    let _ = reply.send(self.handle_delete_chirp(id).await);
                }
                WriteMsg::Reset { reply } => {
                    let _ = reply.send(self.handle_reset().await);
                }
                WriteMsg::Shutdown { reply } => {
                    let _ = reply.send(());
                    break;
                }
            }
        }
        info!("Delta writer stopped");
    }

    // ─── Handler Implementations ───

    async fn handle_create_user(&self, email: &str, hashed_password: &str) -> Result<User> {
        if find_user_by_email(&self.store, email).await?.is_some() {
            return Err(AuthError::DuplicateEmail(email.to_string()));
        }

        let now = now_micros();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            is_chirpy_red: false,
            created_at: now,
            updated_at: now,
        };
        self.store.append(schema::TABLE_USERS, user_batch(&user)?).await?;
        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    async fn handle_update_credentials(&self, id: Uuid, email: &str, hashed_password: &str) -> Result<User> {
        let mut user = find_user_by_id(&self.store, id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(id.to_string()))?;

        if user.email != email {
            if let Some(owner) = find_user_by_email(&self.store, email).await? {
                if owner.id != id {
                    return Err(AuthError::DuplicateEmail(email.to_string()));
                }
            }
        }

        user.email = email.to_string();
        user.hashed_password = hashed_password.to_string();
        user.updated_at = now_micros();
        let metrics = self
            .store
            .update(
                schema::TABLE_USERS,
                &id_predicate(id),
                &[
                    ("email", sql_quote(&user.email)),
                    ("hashed_password", sql_quote(&user.hashed_password)),
                    ("updated_at", sql_quote(&timestamp(&user.updated_at))),
                ],
            )
            .await?;
        if metrics.num_updated_rows == 0 {
            return Err(AuthError::UserNotFound(id.to_string()));
        }
        info!(user_id = %id, "User credentials updated");
        Ok(user)
    }

    async fn handle_set_upgrade_flag(&self, id: Uuid) -> Result<()> {
        let user = find_user_by_id(&self.store, id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(id.to_string()))?;
        if user.is_chirpy_red {
            return Ok(());
        }
        self.store
            .update(
                schema::TABLE_USERS,
                &id_predicate(id),
                &[
                    ("is_chirpy_red", "true".to_string()),
                    ("updated_at", sql_quote(&timestamp(&now_micros()))),
                ],
            )
            .await?;
        info!(user_id = %id, "User upgraded");
        Ok(())
    }

    async fn handle_create_refresh_token(&self, record: RefreshTokenRecord) -> Result<()> {
        if find_user_by_id(&self.store, record.user_id).await?.is_none() {
            return Err(AuthError::UserNotFound(record.user_id.to_string()));
        }
        if find_refresh_token(&self.store, &record.token).await?.is_some() {
            return Err(AuthError::Persistence("refresh token collision".into()));
        }
        self.store
            .append(schema::TABLE_REFRESH_TOKENS, refresh_token_batch(&record)?)
            .await?;
        debug!(user_id = %record.user_id, "Refresh token stored");
        Ok(())
    }

    async fn handle_revoke(&self, token: &str, at: DateTime<Utc>) -> Result<()> {
        let record = find_refresh_token(&self.store, token)
            .await?
            .ok_or(AuthError::RefreshTokenNotFound)?;
        if record.is_revoked() {
            return Err(AuthError::RefreshTokenRevoked);
        }

        let at = sql_quote(&timestamp(&at));
        let metrics = self
            .store
            .update(
                schema::TABLE_REFRESH_TOKENS,
                &format!("token = {} AND revoked_at IS NULL", sql_quote(token)),
                &[("revoked_at", at.clone()), ("updated_at", at)],
            )
            .await?;
        if metrics.num_updated_rows == 0 {
            return Err(AuthError::RefreshTokenRevoked);
        }
        info!(user_id = %record.user_id, "Refresh token revoked");
        Ok(())
    }

    async fn handle_create_chirp(&self, body: String, user_id: Uuid) -> Result<Chirp> {
        if find_user_by_id(&self.store, user_id).await?.is_none() {
            return Err(AuthError::UserNotFound(user_id.to_string()));
        }
        let now = now_micros();
        let chirp = Chirp {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            body,
            user_id,
        };
        self.store.append(schema::TABLE_CHIRPS, chirp_batch(&chirp)?).await?;
        debug!(chirp_id = %chirp.id, user_id = %user_id, "Chirp stored");
        Ok(chirp)
    }

    async fn handle_delete_chirp(&self, id: Uuid) -> Result<()> {
        let metrics = self
            .store
            .delete(schema::TABLE_CHIRPS, &id_predicate(id))
            .await?;
        if metrics.num_deleted_rows == 0 {
            return Err(AuthError::ChirpNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn handle_reset(&self) -> Result<()> {
        for table in [schema::TABLE_CHIRPS, schema::TABLE_REFRESH_TOKENS, schema::TABLE_USERS] {
            self.store.truncate(table).await?;
        }
        warn!("All users, refresh tokens and chirps deleted");
        Ok(())
    }
}

// ─── Repository (client-facing API) ───

/// Delta Lake backed [`CredentialStore`] and [`ChirpStore`]
pub struct DeltaRepository {
    store: Arc<DeltaStore>,
    tx: mpsc::Sender<WriteMsg>,
    closed: AtomicBool,
}

impl DeltaRepository {
    /// Open (or create) the tables under `data_dir` and start the writer
    pub async fn open(data_dir: impl AsRef<std::path::Path>) -> Result<Self> {
        let store = Arc::new(DeltaStore::new(data_dir).await?);
        Ok(Self::with_store(store))
    }

    /// Use an already opened [`DeltaStore`]
    pub fn with_store(store: Arc<DeltaStore>) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let writer = RepoWriter {
            store: Arc::clone(&store),
            rx,
        };
        tokio::spawn(writer.run());
        info!(path = %store.base_path().display(), "Delta repository opened");
        Self {
            store,
            tx,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AuthError::Persistence("store is closed".into()));
        }
        Ok(())
    }

    async fn request<T>(&self, msg: impl FnOnce(oneshot::Sender<Result<T>>) -> WriteMsg) -> Result<T> {
        self.ensure_open()?;
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(msg(reply))
            .await
            .map_err(|_| AuthError::ActorUnavailable("Delta writer".into()))?;
        rx.await
            .map_err(|_| AuthError::ActorUnavailable("Delta writer dropped".into()))?
    }
}

#[async_trait]
impl CredentialStore for DeltaRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.ensure_open()?;
        find_user_by_email(&self.store, email)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(email.to_string()))
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<User> {
        self.ensure_open()?;
        find_user_by_id(&self.store, id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(id.to_string()))
    }

    async fn create_user(&self, email: &str, hashed_password: &str) -> Result<User> {
        let email = email.to_string();
        let hashed_password = hashed_password.to_string();
        self.request(|reply| WriteMsg::CreateUser { email, hashed_password, reply })
            .await
    }

    async fn update_user_credentials(&self, id: Uuid, email: &str, hashed_password: &str) -> Result<User> {
        let email = email.to_string();
        let hashed_password = hashed_password.to_string();
        self.request(|reply| WriteMsg::UpdateCredentials { id, email, hashed_password, reply })
            .await
    }

    async fn set_upgrade_flag(&self, id: Uuid) -> Result<()> {
        self.request(|reply| WriteMsg::SetUpgradeFlag { id, reply }).await
    }

    async fn create_refresh_token(&self, record: RefreshTokenRecord) -> Result<()> {
        self.request(|reply| WriteMsg::CreateRefreshToken { record, reply })
            .await
    }

    async fn get_user_by_valid_refresh_token(&self, token: &str, now: DateTime<Utc>) -> Result<User> {
        self.ensure_open()?;
        let record = find_refresh_token(&self.store, token)
            .await?
            .ok_or(AuthError::RefreshTokenNotFound)?;
        record.check_usable(now)?;
        find_user_by_id(&self.store, record.user_id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(record.user_id.to_string()))
    }

    async fn revoke_refresh_token(&self, token: &str, at: DateTime<Utc>) -> Result<()> {
        let token = token.to_string();
        self.request(|reply| WriteMsg::RevokeRefreshToken { token, at, reply })
            .await
    }

    async fn reset(&self) -> Result<()> {
        self.request(|reply| WriteMsg::Reset { reply }).await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let (reply, rx) = oneshot::channel();
        if self.tx.send(WriteMsg::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
        info!("Delta repository closed");
        Ok(())
    }
}

#[async_trait]
impl ChirpStore for DeltaRepository {
    async fn create_chirp(&self, body: &str, user_id: Uuid) -> Result<Chirp> {
        let body = body.to_string();
        self.request(|reply| WriteMsg::CreateChirp { body, user_id, reply })
            .await
    }

    async fn get_chirp(&self, id: Uuid) -> Result<Chirp> {
        self.ensure_open()?;
        let batches = self
            .store
            .query(schema::TABLE_CHIRPS, &id_predicate(id))
            .await?;
        rows(&batches)
            .next()
            .map(|(batch, i)| chirp_from_row(batch, i))
            .transpose()?
            .ok_or_else(|| AuthError::ChirpNotFound(id.to_string()))
    }

    async fn list_chirps(&self, author: Option<Uuid>) -> Result<Vec<Chirp>> {
        self.ensure_open()?;
        let batches = match author {
            Some(user_id) => {
                self.store
                    .query(schema::TABLE_CHIRPS, &format!("user_id = {}", sql_quote(&user_id.to_string())))
                    .await?
            }
            None => self.store.scan(schema::TABLE_CHIRPS).await?,
        };
        let mut chirps = rows(&batches)
            .map(|(batch, i)| chirp_from_row(batch, i))
            .collect::<Result<Vec<_>>>()?;
        chirps.sort_by_key(|c| c.created_at);
        Ok(chirps)
    }

    async fn delete_chirp(&self, id: Uuid) -> Result<()> {
        self.request(|reply| WriteMsg::DeleteChirp { id, reply }).await
    }
}

// ─── Lookups ───

async fn find_user_by_email(store: &DeltaStore, email: &str) -> Result<Option<User>> {
    let batches = store
        .query(schema::TABLE_USERS, &format!("email = {}", sql_quote(email)))
        .await?;
    rows(&batches).next().map(|(b, i)| user_from_row(b, i)).transpose()
}

async fn find_user_by_id(store: &DeltaStore, id: Uuid) -> Result<Option<User>> {
    let batches = store
        .query(schema::TABLE_USERS, &id_predicate(id))
        .await?;
    rows(&batches).next().map(|(b, i)| user_from_row(b, i)).transpose()
}

async fn find_refresh_token(store: &DeltaStore, token: &str) -> Result<Option<RefreshTokenRecord>> {
    let batches = store
        .query(schema::TABLE_REFRESH_TOKENS, &format!("token = {}", sql_quote(token)))
        .await?;
    rows(&batches)
        .next()
        .map(|(b, i)| refresh_token_from_row(b, i))
        .transpose()
}

// ─── Row Encoding ───

/// Quote a value for use inside a SQL string literal
fn sql_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Current time at the precision the tables store
fn id_predicate(id: Uuid) -> String {
    format!("id = {}", sql_quote(&id.to_string()))
}

fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn user_batch(user: &User) -> Result<RecordBatch> {
    let created = timestamp(&user.created_at);
    let updated = timestamp(&user.updated_at);
    Ok(RecordBatch::try_new(
        Arc::new(schema::users_arrow_schema()),
        vec![
            Arc::new(StringArray::from(vec![user.id.to_string()])) as ArrayRef,
            Arc::new(StringArray::from(vec![user.email.as_str()])),
            Arc::new(StringArray::from(vec![user.hashed_password.as_str()])),
            Arc::new(BooleanArray::from(vec![user.is_chirpy_red])),
            Arc::new(StringArray::from(vec![created.as_str()])),
            Arc::new(StringArray::from(vec![updated.as_str()])),
        ],
    )?)
}

fn refresh_token_batch(record: &RefreshTokenRecord) -> Result<RecordBatch> {
    let revoked = record.revoked_at.as_ref().map(timestamp);
    Ok(RecordBatch::try_new(
        Arc::new(schema::refresh_tokens_arrow_schema()),
        vec![
            Arc::new(StringArray::from(vec![record.token.as_str()])) as ArrayRef,
            Arc::new(StringArray::from(vec![record.user_id.to_string()])),
            Arc::new(StringArray::from(vec![timestamp(&record.created_at)])),
            Arc::new(StringArray::from(vec![timestamp(&record.updated_at)])),
            Arc::new(StringArray::from(vec![timestamp(&record.expires_at)])),
            Arc::new(StringArray::from(vec![revoked])),
        ],
    )?)
}

fn chirp_batch(chirp: &Chirp) -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        Arc::new(schema::chirps_arrow_schema()),
        vec![
            Arc::new(StringArray::from(vec![chirp.id.to_string()])) as ArrayRef,
            Arc::new(StringArray::from(vec![chirp.body.as_str()])),
            Arc::new(StringArray::from(vec![chirp.user_id.to_string()])),
            Arc::new(StringArray::from(vec![timestamp(&chirp.created_at)])),
            Arc::new(StringArray::from(vec![timestamp(&chirp.updated_at)])),
        ],
    )?)
}

// ─── Row Decoding ───

fn rows(batches: &[RecordBatch]) -> impl Iterator<Item = (&RecordBatch, usize)> {
    batches
        .iter()
        .flat_map(|b| (0..b.num_rows()).map(move |i| (b, i)))
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AuthError::Persistence(format!("schema error: missing column {name}")))
}

/// DataFusion may hand strings back as Utf8, LargeUtf8 or Utf8View
fn opt_str(batch: &RecordBatch, name: &str, i: usize) -> Result<Option<String>> {
    let col = column(batch, name)?;
    if col.is_null(i) {
        return Ok(None);
    }
    let any = col.as_any();
    if let Some(a) = any.downcast_ref::<StringArray>() {
        return Ok(Some(a.value(i).to_string()));
    }
    if let Some(a) = any.downcast_ref::<StringViewArray>() {
        return Ok(Some(a.value(i).to_string()));
    }
    if let Some(a) = any.downcast_ref::<LargeStringArray>() {
        return Ok(Some(a.value(i).to_string()));
    }
    Err(AuthError::Persistence(format!("schema error: {name} is not a string column")))
}

fn req_str(batch: &RecordBatch, name: &str, i: usize) -> Result<String> {
    opt_str(batch, name, i)?
        .ok_or_else(|| AuthError::Persistence(format!("schema error: {name} is null")))
}

fn req_bool(batch: &RecordBatch, name: &str, i: usize) -> Result<bool> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<BooleanArray>()
        .map(|a| a.value(i))
        .ok_or_else(|| AuthError::Persistence(format!("schema error: {name} is not a boolean column")))
}

fn req_uuid(batch: &RecordBatch, name: &str, i: usize) -> Result<Uuid> {
    let raw = req_str(batch, name, i)?;
    Uuid::parse_str(&raw).map_err(|e| AuthError::Persistence(format!("bad uuid in {name}: {e}")))
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AuthError::Persistence(format!("bad timestamp {raw}: {e}")))
}

fn req_ts(batch: &RecordBatch, name: &str, i: usize) -> Result<DateTime<Utc>> {
    parse_ts(&req_str(batch, name, i)?)
}

fn user_from_row(batch: &RecordBatch, i: usize) -> Result<User> {
    Ok(User {
        id: req_uuid(batch, "id", i)?,
        email: req_str(batch, "email", i)?,
        hashed_password: req_str(batch, "hashed_password", i)?,
        is_chirpy_red: req_bool(batch, "is_chirpy_red", i)?,
        created_at: req_ts(batch, "created_at", i)?,
        updated_at: req_ts(batch, "updated_at", i)?,
    })
}

fn refresh_token_from_row(batch: &RecordBatch, i: usize) -> Result<RefreshTokenRecord> {
    Ok(RefreshTokenRecord {
        token: req_str(batch, "token", i)?,
        user_id: req_uuid(batch, "user_id", i)?,
        created_at: req_ts(batch, "created_at", i)?,
        updated_at: req_ts(batch, "updated_at", i)?,
        expires_at: req_ts(batch, "expires_at", i)?,
        revoked_at: opt_str(batch, "revoked_at", i)?
            .map(|raw| parse_ts(&raw))
            .transpose()?,
    })
}

fn chirp_from_row(batch: &RecordBatch, i: usize) -> Result<Chirp> {
    Ok(Chirp {
        id: req_uuid(batch, "id", i)?,
        body: req_str(batch, "body", i)?,
        user_id: req_uuid(batch, "user_id", i)?,
        created_at: req_ts(batch, "created_at", i)?,
        updated_at: req_ts(batch, "updated_at", i)?,
    })
}
