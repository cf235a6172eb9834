//! QuotaHub Server: device admission and daily usage quotas over WebSocket.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use quotahub_core::config::{AppConfig, LogFormat, StorageBackend};
use quotahub_core::error::AppError;
use quotahub_database::store::{SessionStore, SubscriberStore};
use quotahub_database::{
    DatabasePool, MemorySessionStore, MemorySubscriberStore, SessionRepository,
    SubscriberRepository,
};
use quotahub_realtime::RealtimeEngine;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and the environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("QUOTAHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting QuotaHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Stores ───────────────────────────────────────────
    let (subscribers, sessions, db_pool) = open_stores(&config).await?;

    // ── Step 2: Real-time engine ─────────────────────────────────
    let config = Arc::new(config);
    let engine = Arc::new(RealtimeEngine::new(&config, subscribers, sessions));
    let reaper = engine.spawn_reaper();

    // ── Step 3: HTTP server ──────────────────────────────────────
    let state = quotahub_api::AppState::new(Arc::clone(&config), Arc::clone(&engine));
    let app = quotahub_api::build_router(state);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("QuotaHub listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 4: Shutdown ─────────────────────────────────────────
    tracing::info!("Shutting down...");
    let grace = config.server.shutdown_grace();
    if tokio::time::timeout(grace, engine.shutdown()).await.is_err() {
        tracing::warn!("Real-time engine did not shut down within {:?}", grace);
    }
    reaper.abort();

    if let Some(pool) = db_pool {
        pool.close().await;
    }

    tracing::info!("QuotaHub stopped");
    Ok(())
}

type Stores = (
    Arc<dyn SubscriberStore>,
    Arc<dyn SessionStore>,
    Option<DatabasePool>,
);

/// Open the configured persistence backend
async fn open_stores(config: &AppConfig) -> Result<Stores, AppError> {
    tracing::info!("Initializing stores (backend: {})...", config.storage.backend);

    match config.storage.backend {
        StorageBackend::Postgres => {
            let db_pool = DatabasePool::connect(&config.database).await?;

            if config.database.run_migrations {
                quotahub_database::migration::run_migrations(db_pool.pool()).await?;
            }

            let subscribers: Arc<dyn SubscriberStore> =
                Arc::new(SubscriberRepository::new(db_pool.pool().clone()));
            let sessions: Arc<dyn SessionStore> =
                Arc::new(SessionRepository::new(db_pool.pool().clone()));
            Ok((subscribers, sessions, Some(db_pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory stores; state is lost on restart");
            let subscribers: Arc<dyn SubscriberStore> = Arc::new(MemorySubscriberStore::new());
            let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
            Ok((subscribers, sessions, None))
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
