//! roomlog-api service entry point

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use roomlog_api::{build_router, AppState};
use roomlog_api::services::UrlSigner;
use roomlog_api::storage::LocalStore;
use roomlog_common::config;
use roomlog_common::db::init::init_database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Optional positional argument overrides every other root source
    let cli_root = std::env::args().nth(1);
    let root_folder = config::resolve_root_folder(cli_root.as_deref());
    config::ensure_root_folder(&root_folder).context("Failed to create root folder")?;
    tracing::info!(root = %root_folder.display(), "starting roomlog-api");

    let toml_config = config::load_toml_config().unwrap_or_else(|e| {
        tracing::warn!("Failed to load TOML config: {}; using defaults", e);
        Default::default()
    });
    let service_config = config::resolve_service_config(&toml_config);

    let db = init_database(&config::database_path(&root_folder))
        .await
        .context("Failed to initialize database")?;

    let objects_dir = config::objects_path(&root_folder);
    std::fs::create_dir_all(&objects_dir).context("Failed to create object store directory")?;
    let storage = Arc::new(LocalStore::new(objects_dir));

    let signer = UrlSigner::new(service_config.signing_secret.as_bytes());
    let state = AppState::new(db, storage, signer, service_config.max_upload_bytes);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&service_config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", service_config.bind))?;
    tracing::info!(bind = %service_config.bind, "listening");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
