//! HTTP router and server lifecycle.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::secrets::SessionStore;
use crate::vault::{open_store, FileStore, SharedVaultService, VaultService, FILES_ROUTE_PREFIX};

use super::auth;
use super::files;
use super::types::HealthResponse;
use super::vault as vault_api;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub vault: SharedVaultService,
}

impl AppState {
    /// Open the configured store and file root and start session cleanup.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = open_store(config.store_backend, &config.data_dir)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open vault store: {}", e))?;
        let files = Arc::new(FileStore::new(
            config.files_dir(),
            &config.url_signing_secret,
            config.max_upload_bytes,
        ));
        let sessions = Arc::new(SessionStore::new(config.session_idle_ttl));
        Arc::clone(&sessions).start_cleanup_task();

        let vault = Arc::new(VaultService::new(
            store,
            files,
            sessions,
            config.signed_url_ttl,
        ));
        Ok(Self { config, vault })
    }
}

/// Build the full router for the given state.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login))
        .route(&format!("{}/*key", FILES_ROUTE_PREFIX), get(files::download));

    let protected_routes = Router::new()
        .nest(
            "/api/vault",
            vault_api::routes(state.config.max_upload_bytes),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone()).await?);
    if state.config.dev_mode {
        tracing::warn!("DEV_MODE is enabled; dashboard auth is disabled");
    } else if state.config.auth.users.is_empty() {
        tracing::warn!("No DASHBOARD_USERS or DASHBOARD_PASSWORD set; every login will be rejected");
    }

    let app = router(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Wait for SIGTERM/SIGINT, then drop every unlocked vault session.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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

    let active = state.vault.sessions().clear().await;
    tracing::info!("Shutdown signal received, locked {} vault sessions", active);
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        auth_required: state.config.auth.auth_required(state.config.dev_mode),
        persistent_store: state.vault.is_persistent(),
    })
}
