use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod auth_middleware;
mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use auth_middleware::AdminAuth;
use config::{AppConfig, StoragePlan};
use services::{
    admin_service::AdminService,
    blob_backend::{AzureBlobBackend, BlobBackendConfig},
    cache::TtlCache,
    local_backend::LocalFileBackend,
    metadata_service::MetadataService,
    storage_service::{MetadataStore, StorageBackend},
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting seo-metadata on {} ({:?}, cache ttl {:?}, render timeout {:?})",
        cfg.addr(),
        cfg.environment,
        cfg.cache_ttl,
        cfg.render_timeout
    );
    if cfg.admin_token.is_none() {
        tracing::warn!("SEO_METADATA_ADMIN_TOKEN is not set; admin API will reject every request");
    }

    // --- Storage strategy ---
    let (store, fallback_dir) = build_store(&cfg)?;
    tracing::info!("Storage backends: {:?}", store.backend_tags());

    // --- Initialize services ---
    let cache = Arc::new(TtlCache::new(cfg.cache_ttl));
    let auth = AdminAuth::new(cfg.admin_token.clone());
    let state = AppState {
        metadata: MetadataService::new(store.clone(), cache.clone(), cfg.render_timeout),
        admin: AdminService::new(store.clone(), cache, cfg.site_base_url.clone()),
        backend_tags: store.backend_tags(),
        fallback_dir,
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(auth).with_state(state);

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

/// Construct the primary backend and optional fallback for the configured plan.
fn build_store(cfg: &AppConfig) -> Result<(MetadataStore, Option<PathBuf>)> {
    let plan = cfg.storage_plan()?;
    let remote = || -> Result<Arc<dyn StorageBackend>> {
        Ok(Arc::new(AzureBlobBackend::new(BlobBackendConfig {
            public_base_url: cfg.public_base_url.clone().unwrap_or_default(),
            container_url: cfg.container_url.clone().unwrap_or_default(),
            sas_token: cfg.sas_token.clone(),
            request_timeout: cfg.request_timeout,
            cache_ttl: cfg.cache_ttl,
        })?))
    };
    let local: Arc<dyn StorageBackend> = Arc::new(LocalFileBackend::new(cfg.fallback_dir.clone()));

    if plan == StoragePlan::LocalOnly {
        tracing::info!(
            "No blob container configured; storing documents under {}",
            cfg.fallback_dir
        );
    }
    let store = plan.assemble(remote, local)?;
    let fallback_dir = plan
        .uses_local_dir()
        .then(|| PathBuf::from(&cfg.fallback_dir));
    Ok((store, fallback_dir))
}
