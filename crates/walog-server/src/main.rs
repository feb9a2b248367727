//! # walog-server
//!
//! HTTP backend of the message log viewer.
//!
//! This binary provides:
//! - **REST API** (axum) over the message log: contacts, raw messages,
//!   per-conversation history and aggregated chatrooms
//! - **Send endpoints** that validate and store new messages and uploaded
//!   files
//! - **Pluggable media storage**: local disk, static files under `/uploads`,
//!   or a remote repository
//! - **Downloads and thumbnails** of uploaded media

mod api;
mod config;
mod error;
mod seed;
mod storage;
mod thumbnail;

use tracing::info;
use tracing_subscriber::EnvFilter;
use walog_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::storage::MediaStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,walog_server=debug")),
        )
        .init();

    info!("Starting walog server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the database and import seed files
    // -----------------------------------------------------------------------
    let mut db = Database::open_at(&config.database_path)?;

    if let Some(path) = &config.import_messages {
        seed::import_messages(&mut db, path)?;
    }
    if let Some(path) = &config.import_contacts {
        seed::import_contacts(&db, path)?;
    }

    // -----------------------------------------------------------------------
    // 4. Media storage backend
    // -----------------------------------------------------------------------
    let storage = MediaStorage::from_config(&config).await?;

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, storage, config);

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
