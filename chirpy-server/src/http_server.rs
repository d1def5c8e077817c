// Chirpy HTTP server
// Reads configuration from the environment (and `.env`), opens the store,
// serves until SIGINT/SIGTERM, then closes the store.

use std::sync::Arc;

use anyhow::Context;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chirpy_core::{AuthConfig, DeltaRepository, MemoryRepository};
use chirpy_server::config::{ServerConfig, StoreKind};
use chirpy_server::{AppState, app};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

fn cors(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = origin
        .parse()
        .with_context(|| format!("invalid CORS_ORIGIN '{origin}'"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chirpy_server=debug,chirpy_core=info,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let auth = Arc::new(AuthConfig::from_env().context("loading auth configuration")?);
    let server = ServerConfig::from_env()?;
    info!(
        platform = %auth.platform,
        transport = %auth.transport,
        store = ?server.store,
        "Configuration loaded"
    );

    let state = match server.store {
        StoreKind::Delta => {
            let repo = DeltaRepository::open(&auth.data_dir)
                .await
                .with_context(|| format!("opening Delta store at {}", auth.data_dir.display()))?;
            AppState::new(Arc::new(repo), Arc::clone(&auth))
        }
        StoreKind::Memory => AppState::new(Arc::new(MemoryRepository::new()), Arc::clone(&auth)),
    };

    let router = app(state.clone())
        .layer(cors(&server.cors_origin)?)
        .layer(TraceLayer::new_for_http());

    let addr = server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Chirpy HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.shutdown().await.context("closing store")?;
    info!("Store closed");
    Ok(())
}
