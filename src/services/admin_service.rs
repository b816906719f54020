//! Operator-facing CRUD over stored metadata documents.
//!
//! Reads bypass the render cache so operators always edit the durable state.
//! Every mutation goes to storage first and invalidates the cache second.

use crate::models::metadata::MetadataDocument;
use crate::services::{
    cache::TtlCache,
    defaults::resolve_default,
    storage_service::{MetadataStore, StoreError, ensure_identifier_safe},
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Recorded as `updatedBy` when the caller does not identify itself.
pub const DEFAULT_EDITOR: &str = "admin";

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no metadata stored for `{0}`")]
    NotFound(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AdminError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidIdentifier { .. } => AdminError::Validation(err.to_string()),
            StoreError::NotFound(id) | StoreError::InvalidDocument { id, .. } => {
                AdminError::NotFound(id)
            }
            other => AdminError::Store(other),
        }
    }
}

pub type AdminResult<T> = Result<T, AdminError>;

/// A document opened for editing.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub document: MetadataDocument,
    /// False when `document` is a synthesized starting point, not a stored one.
    pub persisted: bool,
    pub preview_url: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub document: MetadataDocument,
    pub warnings: Vec<String>,
    pub preview_url: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdminView {
    pub page_identifiers: Vec<String>,
    pub selection: Option<Selection>,
}

#[derive(Clone)]
pub struct AdminService {
    store: MetadataStore,
    cache: Arc<TtlCache>,
    site_base_url: String,
}

impl AdminService {
    pub fn new(store: MetadataStore, cache: Arc<TtlCache>, site_base_url: impl Into<String>) -> Self {
        Self {
            store,
            cache,
            site_base_url: site_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Live page URL for `id`. `home` and `index` map to the site root.
    pub fn preview_url(&self, id: &str) -> String {
        match id {
            "home" | "index" => format!("{}/", self.site_base_url),
            _ => format!("{}/{}", self.site_base_url, id),
        }
    }

    /// Identifiers with a stored document. Defaults are not included.
    pub async fn list(&self) -> AdminResult<Vec<String>> {
        Ok(self.store.list().await?.collect())
    }

    /// Open `id` for editing, offering the synthesized default when nothing is stored.
    pub async fn select(&self, id: &str) -> AdminResult<Selection> {
        ensure_identifier_safe(id)?;
        match self.store.read(id).await {
            Ok(document) => Ok(Selection {
                document,
                persisted: true,
                preview_url: self.preview_url(id),
            }),
            Err(err) if err.is_not_found() => Ok(Selection {
                document: resolve_default(id),
                persisted: false,
                preview_url: self.preview_url(id),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Validate, overwrite, invalidate, then re-read what was persisted.
    ///
    /// Validation happens before any storage call. There is no version check:
    /// concurrent saves of the same page resolve as last writer wins.
    pub async fn save(
        &self,
        id: &str,
        mut document: MetadataDocument,
        editor: Option<&str>,
    ) -> AdminResult<SaveOutcome> {
        ensure_identifier_safe(id)?;
        document
            .check_required()
            .map_err(|field| AdminError::Validation(format!("{} is required", field)))?;

        let mut warnings = document.length_warnings();
        document.page_identifier = id.to_string();
        document.last_updated = Some(Utc::now());
        document.updated_by = Some(
            editor
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .unwrap_or(DEFAULT_EDITOR)
                .to_string(),
        );
        document.version = Some(document.version.unwrap_or(0) + 1);

        self.store.write(id, &document).await?;
        self.cache.invalidate(id);
        info!(
            "saved metadata for `{}` (version {})",
            id,
            document.version.unwrap_or_default()
        );

        let persisted = match self.store.read(id).await {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!("re-read of `{}` after save failed: {}", id, err);
                warnings.push(format!("saved, but re-reading the document failed: {}", err));
                document
            }
        };

        Ok(SaveOutcome {
            document: persisted,
            warnings,
            preview_url: self.preview_url(id),
        })
    }

    /// Delete `id` and drop it from the cache. Absent documents are not an error.
    pub async fn delete(&self, id: &str) -> AdminResult<()> {
        ensure_identifier_safe(id)?;
        self.store.delete(id).await?;
        self.cache.invalidate(id);
        info!("deleted metadata for `{}`", id);
        Ok(())
    }

    /// Re-fetch the list and, optionally, the selected document.
    pub async fn refresh(&self, selected: Option<&str>) -> AdminResult<AdminView> {
        let page_identifiers = self.list().await?;
        let selection = match selected {
            Some(id) => Some(self.select(id).await?),
            None => None,
        };
        Ok(AdminView {
            page_identifiers,
            selection,
        })
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("metadata cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::DEFAULT_TTL;
    use crate::services::testing::{MemoryBackend, sample_document};

    fn admin_with(backend: Arc<MemoryBackend>) -> (AdminService, Arc<TtlCache>) {
        let cache = Arc::new(TtlCache::new(DEFAULT_TTL));
        (
            AdminService::new(
                MetadataStore::new(backend),
                cache.clone(),
                "https://www.example.com/",
            ),
            cache,
        )
    }

    #[tokio::test]
    async fn save_with_empty_title_makes_no_storage_call() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert(sample_document("about"));
        let (admin, _cache) = admin_with(backend.clone());

        let mut document = sample_document("about");
        document.title = String::new();
        let err = admin.save("about", document, None).await.unwrap_err();

        assert!(matches!(err, AdminError::Validation(_)));
        assert_eq!(backend.write_calls(), 0);
        assert_eq!(backend.get("about"), Some(sample_document("about")));
    }

    #[tokio::test]
    async fn save_stamps_provenance_and_invalidates_cache() {
        let backend = Arc::new(MemoryBackend::default());
        let (admin, cache) = admin_with(backend.clone());
        cache.set("about", sample_document("about"));

        let mut document = sample_document("ignored-body-id");
        document.title = "About Us".into();
        document.version = Some(4);
        let outcome = admin
            .save("about", document, Some("maria@example.com"))
            .await
            .unwrap();

        assert_eq!(outcome.document.page_identifier, "about");
        assert_eq!(outcome.document.title, "About Us");
        assert_eq!(outcome.document.version, Some(5));
        assert_eq!(outcome.document.updated_by.as_deref(), Some("maria@example.com"));
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.preview_url, "https://www.example.com/about");
        assert_eq!(cache.get("about"), None);
        assert_eq!(backend.read_calls(), 1);
    }

    #[tokio::test]
    async fn long_title_saves_with_warning() {
        let backend = Arc::new(MemoryBackend::default());
        let (admin, _cache) = admin_with(backend.clone());

        let mut document = sample_document("about");
        document.title = "A".repeat(75);
        let outcome = admin.save("about", document, None).await.unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.document.updated_by.as_deref(), Some(DEFAULT_EDITOR));
        assert_eq!(backend.write_calls(), 1);
    }

    #[tokio::test]
    async fn failed_save_surfaces_error_and_keeps_cache() {
        let backend = Arc::new(MemoryBackend::default());
        backend.fail_transport(true);
        let (admin, cache) = admin_with(backend);
        cache.set("about", sample_document("about"));

        let err = admin
            .save("about", sample_document("about"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Store(StoreError::Transport(_))));
        assert!(cache.get("about").is_some());
    }

    #[tokio::test]
    async fn select_missing_offers_unpersisted_default() {
        let backend = Arc::new(MemoryBackend::default());
        let (admin, _cache) = admin_with(backend);

        let selection = admin.select("study-in-canada/cost").await.unwrap();
        assert!(!selection.persisted);
        assert!(selection.document.title.contains("Canada"));
    }

    #[tokio::test]
    async fn select_bypasses_cache() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert(sample_document("about"));
        let (admin, cache) = admin_with(backend.clone());
        let mut stale = sample_document("about");
        stale.title = "Stale".into();
        cache.set("about", stale);

        let selection = admin.select("about").await.unwrap();
        assert!(selection.persisted);
        assert_eq!(selection.document, sample_document("about"));
        assert_eq!(backend.read_calls(), 1);
    }

    #[tokio::test]
    async fn delete_invalidates_and_is_idempotent() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert(sample_document("about"));
        let (admin, cache) = admin_with(backend.clone());
        cache.set("about", sample_document("about"));

        admin.delete("about").await.unwrap();
        assert_eq!(cache.get("about"), None);
        assert_eq!(backend.get("about"), None);

        admin.delete("about").await.unwrap();
        assert_eq!(backend.delete_calls(), 2);
    }

    #[tokio::test]
    async fn refresh_lists_and_selects() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert(sample_document("contact"));
        backend.insert(sample_document("about"));
        let (admin, _cache) = admin_with(backend);

        let view = admin.refresh(Some("contact")).await.unwrap();
        assert_eq!(view.page_identifiers, vec!["about", "contact"]);
        assert!(view.selection.unwrap().persisted);
    }

    #[test]
    fn home_previews_site_root() {
        let backend = Arc::new(MemoryBackend::default());
        let (admin, _cache) = admin_with(backend);
        assert_eq!(admin.preview_url("home"), "https://www.example.com/");
        assert_eq!(
            admin.preview_url("study-in-uk/careers"),
            "https://www.example.com/study-in-uk/careers"
        );
    }
}
