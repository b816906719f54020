use crate::services::storage_service::{MetadataStore, StorageBackend};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr, sync::Arc, time::Duration};

/// Deployment context. Decides whether a local fallback backend is wired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => bail!("unknown environment `{}`", other),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub public_base_url: Option<String>,
    pub container_url: Option<String>,
    pub sas_token: Option<String>,
    pub admin_token: Option<String>,
    pub fallback_dir: String,
    pub cache_ttl: Duration,
    pub render_timeout: Duration,
    pub request_timeout: Duration,
    pub site_base_url: String,
}

/// Which storage backends to construct at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoragePlan {
    /// Blob container only; failures propagate.
    Blob,
    /// Blob container, with the local directory absorbing transport failures.
    BlobWithLocalFallback,
    /// Local directory only.
    LocalOnly,
}

impl StoragePlan {
    /// Wire backends into a store. `remote` is only built for blob plans and
    /// `local` is only attached when the plan names it.
    pub fn assemble(
        &self,
        remote: impl FnOnce() -> Result<Arc<dyn StorageBackend>>,
        local: Arc<dyn StorageBackend>,
    ) -> Result<MetadataStore> {
        Ok(match self {
            StoragePlan::Blob => MetadataStore::new(remote()?),
            StoragePlan::BlobWithLocalFallback => MetadataStore::new(remote()?).with_fallback(local),
            StoragePlan::LocalOnly => MetadataStore::new(local),
        })
    }

    pub fn uses_local_dir(&self) -> bool {
        !matches!(self, StoragePlan::Blob)
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "SEO metadata resolution service")]
pub struct Args {
    /// Host to bind to (overrides SEO_METADATA_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SEO_METADATA_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Deployment environment (overrides SEO_METADATA_ENV)
    #[arg(long, value_enum)]
    pub env: Option<Environment>,

    /// Anonymous read URL of the blob container (overrides SEO_METADATA_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Authenticated blob container URL (overrides SEO_METADATA_CONTAINER_URL)
    #[arg(long)]
    pub container_url: Option<String>,

    /// Directory for locally stored documents (overrides SEO_METADATA_FALLBACK_DIR)
    #[arg(long)]
    pub fallback_dir: Option<String>,

    /// Cache lifetime in seconds (overrides SEO_METADATA_CACHE_TTL_SECS)
    #[arg(long)]
    pub cache_ttl_secs: Option<u64>,

    /// Render-path storage timeout in milliseconds (overrides SEO_METADATA_RENDER_TIMEOUT_MS)
    #[arg(long)]
    pub render_timeout_ms: Option<u64>,

    /// Base URL of the public site, for preview links (overrides SEO_METADATA_SITE_BASE_URL)
    #[arg(long)]
    pub site_base_url: Option<String>,
}

/// Reads `SEO_METADATA_<name>`, treating empty values as unset.
fn env_opt(name: &str) -> Option<String> {
    env::var(format!("SEO_METADATA_{}", name))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        Some(value) => value
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("parsing SEO_METADATA_{} value `{}`", name, value)),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse())
    }

    fn merge(args: Args) -> Result<Self> {
        let env_environment = env_parse("ENV", Environment::Development)?;
        let env_port = env_parse("PORT", 3000u16)?;
        let env_ttl = env_parse("CACHE_TTL_SECS", 300u64)?;
        let env_render_timeout = env_parse("RENDER_TIMEOUT_MS", 1500u64)?;
        let request_timeout = env_parse("REQUEST_TIMEOUT_SECS", 10u64)?;

        let cfg = Self {
            host: args
                .host
                .or_else(|| env_opt("HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: args.port.unwrap_or(env_port),
            environment: args.env.unwrap_or(env_environment),
            public_base_url: args.public_base_url.or_else(|| env_opt("PUBLIC_BASE_URL")),
            container_url: args.container_url.or_else(|| env_opt("CONTAINER_URL")),
            sas_token: env_opt("SAS_TOKEN"),
            admin_token: env_opt("ADMIN_TOKEN"),
            fallback_dir: args
                .fallback_dir
                .or_else(|| env_opt("FALLBACK_DIR"))
                .unwrap_or_else(|| "./data/seo-metadata".into()),
            cache_ttl: Duration::from_secs(args.cache_ttl_secs.unwrap_or(env_ttl)),
            render_timeout: Duration::from_millis(
                args.render_timeout_ms.unwrap_or(env_render_timeout),
            ),
            request_timeout: Duration::from_secs(request_timeout),
            site_base_url: args
                .site_base_url
                .or_else(|| env_opt("SITE_BASE_URL"))
                .unwrap_or_else(|| "http://localhost:3000".into()),
        };

        cfg.storage_plan()?;
        Ok(cfg)
    }

    /// Pick backends from the environment and the blob settings present.
    pub fn storage_plan(&self) -> Result<StoragePlan> {
        let blob_configured = self.public_base_url.is_some() && self.container_url.is_some();
        match (self.environment, blob_configured) {
            (Environment::Production, true) => Ok(StoragePlan::Blob),
            (Environment::Production, false) => bail!(
                "production requires SEO_METADATA_PUBLIC_BASE_URL and SEO_METADATA_CONTAINER_URL"
            ),
            (Environment::Development, true) => Ok(StoragePlan::BlobWithLocalFallback),
            (Environment::Development, false) => Ok(StoragePlan::LocalOnly),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
