use std::net::SocketAddr;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{services, state::AppState};
use crate::config::Config;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every route of the front end bound to `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(services::health))
        .route("/api/ping", get(services::ping))
        .route("/api/version", get(services::version))
        .route("/api/sites", get(services::sites))
        .route("/api/resource/site", get(services::resource_site))
        .route("/api/chapter/id", get(services::chapter_id))
        .route("/api/manga/id", get(services::manga_id))
        .route("/api/manga/info", get(services::manga_info))
        .route("/api/manga/cover", get(services::manga_cover))
        .route("/api/chapter/info", get(services::chapter_info))
        .route("/api/manga/chapters", get(services::manga_chapters))
        .route(
            "/api/chapter/mark",
            get(services::chapter_marks).post(services::update_chapter_marks),
        )
        .route("/api/download/chapter", post(services::download_chapter))
        .route("/api/download/chapters", post(services::download_chapters))
        .route("/api/download/{id}", get(services::get_download))
        .route("/api/download/{id}/cancel", post(services::cancel_download))
        .route("/api/downloads", get(services::list_downloads))
        .route("/api/downloads/states", post(services::download_states))
        .route("/api/downloads/cancel", post(services::cancel_downloads))
        .route("/api/downloads/history", delete(services::clear_history))
        .with_state(state)
        // gzip request bodies are inflated before the handlers see them
        .layer(RequestDecompressionLayer::new())
}

/// Serve the API until Ctrl+C or SIGTERM
///
/// `address` overrides `server.bind_addr` from the configuration.
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);
    let state = AppState::from_config(config)?;
    let marks = state.marks.clone();
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Chapterbox API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    marks.persist()?;
    info!("Mark store flushed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
