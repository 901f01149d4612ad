mod api;
mod artifact_store;
mod config;
mod error;
mod explain;
mod extract;
mod models;
mod worker;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use artifact_store::ArtifactStore;
use config::Config;
use explain::ExplainerClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: ArtifactStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deck_explain_api=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let store = ArtifactStore::new(&config);
    store.ensure_dirs().await?;

    let state = AppState {
        config: config.clone(),
        store,
    };

    let explainer = ExplainerClient::from_config(&config)?;
    worker::spawn_scan_worker(state.clone(), explainer);

    let app = Router::new()
        .route("/healthz", get(api::healthz))
        .route("/upload", post(api::upload_deck))
        .route("/status/{uid}", get(api::deck_status))
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("deck-explain-api listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
