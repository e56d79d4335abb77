use anyhow::Result;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use upload_service::{
    config::AppConfig,
    routes,
    services::{
        download_service::DownloadAuthorizer, object_store::FsObjectStore,
        session_store::SessionStore, upload_service::UploadCoordinator,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting upload-service with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    // SQLx will not create the database file itself
    if !Path::new(db_path).exists() {
        fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(db_path)?;
    }

    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    let sessions = SessionStore::new(db);

    // --- Handle migration mode ---
    if migrate {
        sessions.migrate().await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core services ---
    let objects = Arc::new(FsObjectStore::new(cfg.storage_dir.clone()));
    let uploads = Arc::new(UploadCoordinator::new(
        sessions.clone(),
        objects.clone(),
        cfg.chunk_size,
        Duration::from_secs(cfg.store_timeout_secs),
    ));
    let downloads = Arc::new(DownloadAuthorizer::new(
        sessions.clone(),
        objects,
        Duration::from_secs(cfg.presign_ttl_secs),
    ));

    let state = AppState {
        uploads,
        downloads,
        sessions,
        storage_root: cfg.storage_dir.clone().into(),
        max_chunk_size: cfg.max_chunk_size,
    };

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
