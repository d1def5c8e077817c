//! # Chirpy Core
//!
//! Authentication and session lifecycle for the Chirpy backend: argon2
//! password hashing, stateless HS256 access tokens, store-backed revocable
//! refresh tokens, and the transport contract that carries them.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 chirpy-core                   │
//! ├──────────────┬───────────────┬────────────────┤
//! │ AccessGate   │SessionService │  ChirpService  │
//! │ (pure, no    │(signup, login,│  (post, list,  │
//! │  store I/O)  │ refresh, ...) │   delete)      │
//! ├──────────────┴──────┬────────┴────────────────┤
//! │ SessionTransport    │  RefreshTokenManager    │
//! │ (bearer | cookie)   │  (issue, resolve, revoke)│
//! ├─────────────────────┴─────────────────────────┤
//! │   CredentialStore + ChirpStore (injected)     │
//! │   MemoryRepository | DeltaRepository          │
//! ├───────────────────────────────────────────────┤
//! │          Delta Lake (delta-rs) tables          │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chirpy_core::auth::{transport, AccessGate, SessionService};
//! use chirpy_core::repo::DeltaRepository;
//! use chirpy_core::{AuthConfig, Credentials};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(AuthConfig::from_env()?);
//!     let repo = Arc::new(DeltaRepository::open(&config.data_dir).await?);
//!
//!     let sessions = SessionService::new(repo.clone(), config.clone());
//!     let gate = AccessGate::new(transport::from_config(&config), config.jwt_secret.as_str());
//!
//!     let grant = sessions.login(Credentials::new("a@b.com", "pw123456")).await?;
//!     let new_access = sessions.refresh(&grant.tokens.refresh_token).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **delta** (default): Delta Lake backed [`repo::DeltaRepository`]
//! - **Railway Programming**: All operations return `Result<T, AuthError>`

pub mod auth;
pub mod chirp;
pub mod config;
pub mod error;
pub mod repo;
pub mod types;

#[cfg(feature = "delta")]
pub mod schema;
#[cfg(feature = "delta")]
pub mod store;

// Re-exports for convenience
pub use config::{AuthConfig, Platform, TransportKind};
pub use error::{AuthError, ErrorKind, Result};
pub use types::{Chirp, Credentials, SessionGrant, SessionTokens, UpgradeEvent, User, UserProfile};

pub use auth::{AccessGate, AuthenticatedUser, SessionService, SessionTransport};
pub use chirp::ChirpService;
pub use repo::{ChirpStore, CredentialStore, MemoryRepository};

#[cfg(feature = "delta")]
pub use repo::DeltaRepository;
#[cfg(feature = "delta")]
pub use store::DeltaStore;
