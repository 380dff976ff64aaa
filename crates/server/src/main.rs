use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skillswap_server::{
    app,
    config::{Config, StorageBackend},
    db::Database,
    services::session::SessionStore,
    storage::{database::DatabaseStorage, memory::MemStorage, DynStorage},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skillswap_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    // Pick the storage backend
    let storage: DynStorage = match config.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data will not survive restarts");
            Arc::new(MemStorage::new())
        }
        StorageBackend::Database => {
            let db = Database::connect(&config).await?;
            db.run_migrations().await?;
            Arc::new(DatabaseStorage::new(db.pool))
        }
    };

    let sessions = SessionStore::new(chrono::Duration::hours(config.session_ttl_hours));

    let state = AppState {
        storage,
        sessions,
        config: config.clone(),
    };

    let app = app(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
