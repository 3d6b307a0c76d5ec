pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod scope_path;
pub mod services;
pub mod state;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use commands::{file_commands, upload_commands};
use config::Config;
use services::file_service::DirectoryStore;
use state::AppState;

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/files", get(file_commands::list_files))
        .route("/stat", get(file_commands::stat_file))
        .route("/directory", post(file_commands::create_directory))
        .route("/delete", delete(file_commands::delete_item))
        .route(
            "/upload",
            post(upload_commands::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/download/*path", get(file_commands::download_file))
        .with_state(state)
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let root = config.storage_root()?;
    let store = DirectoryStore::open(&root)
        .with_context(|| format!("failed to initialize storage root {}", root.display()))?;
    tracing::info!(root = %store.root().display(), "storage root initialized");

    let mut app = router(AppState::new(store), config.max_upload_bytes());
    if let Some(static_dir) = &config.static_dir {
        tracing::info!(dir = %static_dir.display(), "serving static assets");
        app = app.fallback_service(ServeDir::new(static_dir));
    }
    let app = app.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
