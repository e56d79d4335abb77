use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub chunk_size: i64,
    pub max_chunk_size: usize,
    pub presign_ttl_secs: u64,
    pub store_timeout_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Chunked File Upload Coordination API")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_SERVICE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_SERVICE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where object payloads are stored (overrides UPLOAD_SERVICE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides UPLOAD_SERVICE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Chunk size in bytes used to derive total chunk counts (overrides UPLOAD_SERVICE_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<i64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("UPLOAD_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("UPLOAD_SERVICE_PORT", 3000u16)?;
        let env_storage =
            env::var("UPLOAD_SERVICE_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("UPLOAD_SERVICE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/upload_service.db".into());
        // 5 MiB chunks by default; per-request chunk bodies capped at 100 MiB.
        let env_chunk_size = parse_env("UPLOAD_SERVICE_CHUNK_SIZE", 5_242_880i64)?;
        let max_chunk_size = parse_env("UPLOAD_SERVICE_MAX_CHUNK_SIZE", 104_857_600usize)?;
        let presign_ttl_secs = parse_env("UPLOAD_SERVICE_PRESIGN_TTL_SECS", 600u64)?;
        let store_timeout_secs = parse_env("UPLOAD_SERVICE_STORE_TIMEOUT_SECS", 30u64)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            chunk_size: args.chunk_size.unwrap_or(env_chunk_size),
            max_chunk_size,
            presign_ttl_secs,
            store_timeout_secs,
        };

        if cfg.chunk_size <= 0 {
            anyhow::bail!("chunk size must be positive, got {}", cfg.chunk_size);
        }

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).context(format!("reading {}", name)),
    }
}
