//! # Chirpy HTTP server
//!
//! Axum surface over `chirpy-core`. [`AppState`] wires the injected store,
//! the configured session transport and the access gate; [`app`] builds the
//! router. Layers (CORS, tracing) are added by the binary.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chirpy_core::auth::transport;
use chirpy_core::{AccessGate, AuthConfig, ChirpService, ChirpStore, CredentialStore, SessionService, SessionTransport};

use crate::handlers::{admin, chirps, health, polka, session, users};

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionService,
    pub chirps: ChirpService,
    pub transport: Arc<dyn SessionTransport>,
    pub gate: AccessGate,
    pub credentials: Arc<dyn CredentialStore>,
}

impl AppState {
    /// One repository backs both credentials and chirps
    pub fn new<R>(repo: Arc<R>, config: Arc<AuthConfig>) -> Self
    where
        R: CredentialStore + ChirpStore + 'static,
    {
        let credentials: Arc<dyn CredentialStore> = repo.clone();
        let chirp_store: Arc<dyn ChirpStore> = repo;
        let transport = transport::from_config(&config);
        let gate = AccessGate::new(Arc::clone(&transport), config.jwt_secret.as_str());

        Self {
            sessions: SessionService::new(Arc::clone(&credentials), config),
            chirps: ChirpService::new(chirp_store),
            transport,
            gate,
            credentials,
        }
    }

    /// Close the underlying store once the server has drained
    pub async fn shutdown(&self) -> chirpy_core::Result<()> {
        self.credentials.close().await
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/healthz", get(health::healthz))
        .route("/api/users", post(users::create).put(users::update))
        .route("/api/signup", post(session::signup))
        .route("/api/login", post(session::login))
        .route("/api/refresh", post(session::refresh))
        .route("/api/revoke", post(session::revoke))
        .route("/api/logout", post(session::revoke))
        .route("/api/chirps", get(chirps::list).post(chirps::create))
        .route("/api/chirps/:id", get(chirps::get).delete(chirps::delete))
        .route("/api/polka/webhooks", post(polka::webhook))
        .route("/admin/reset", post(admin::reset))
        .with_state(state)
}
