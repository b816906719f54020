//! Render-time metadata lookup: cache, then store, then synthesized default.
//!
//! Nothing on this path can fail a page render. Store errors and timeouts
//! degrade to the default document, which is never cached.

use crate::models::metadata::{MetadataDocument, PageMeta};
use crate::services::{
    cache::TtlCache,
    defaults::{DEFAULT_OG_IMAGE, resolve_default},
    storage_service::{MetadataStore, ensure_identifier_safe},
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    Cache,
    Store,
    Default,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMetadata {
    pub document: MetadataDocument,
    pub source: MetadataSource,
}

impl ResolvedMetadata {
    pub fn page_meta(&self) -> PageMeta {
        self.document.page_meta(DEFAULT_OG_IMAGE)
    }
}

#[derive(Clone)]
pub struct MetadataService {
    store: MetadataStore,
    cache: Arc<TtlCache>,
    render_timeout: Duration,
}

impl MetadataService {
    pub fn new(store: MetadataStore, cache: Arc<TtlCache>, render_timeout: Duration) -> Self {
        Self {
            store,
            cache,
            render_timeout,
        }
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Metadata for `id`, never failing.
    pub async fn resolve(&self, id: &str) -> ResolvedMetadata {
        if ensure_identifier_safe(id).is_err() {
            debug!("identifier `{}` is not storable; using default", id);
            return Self::synthesized(id);
        }

        if let Some(document) = self.cache.get(id) {
            debug!("cache hit for `{}`", id);
            return ResolvedMetadata {
                document,
                source: MetadataSource::Cache,
            };
        }

        let ticket = self.cache.ticket();
        match tokio::time::timeout(self.render_timeout, self.store.read(id)).await {
            Ok(Ok(document)) => {
                if !self.cache.fill(ticket, id, document.clone()) {
                    debug!("`{}` was invalidated during read; not caching", id);
                }
                ResolvedMetadata {
                    document,
                    source: MetadataSource::Store,
                }
            }
            Ok(Err(err)) if err.is_not_found() => {
                debug!("no stored metadata for `{}`: {}", id, err);
                Self::synthesized(id)
            }
            Ok(Err(err)) => {
                warn!("metadata read for `{}` failed, using default: {}", id, err);
                Self::synthesized(id)
            }
            Err(_) => {
                warn!(
                    "metadata read for `{}` exceeded {:?}, using default",
                    id, self.render_timeout
                );
                Self::synthesized(id)
            }
        }
    }

    fn synthesized(id: &str) -> ResolvedMetadata {
        ResolvedMetadata {
            document: resolve_default(id),
            source: MetadataSource::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::DEFAULT_TTL;
    use crate::services::testing::{ManualClock, MemoryBackend, sample_document};

    fn service_with(backend: Arc<MemoryBackend>) -> (MetadataService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(TtlCache::with_clock(DEFAULT_TTL, clock.clone()));
        (
            MetadataService::new(
                MetadataStore::new(backend),
                cache,
                Duration::from_millis(200),
            ),
            clock,
        )
    }

    #[tokio::test]
    async fn second_read_within_ttl_is_served_from_cache() {
        let backend = Arc::new(MemoryBackend::default());
        let mut about = sample_document("about");
        about.title = "About Us".into();
        about.description = "Who we are and how we help students.".into();
        backend.insert(about.clone());
        let (service, clock) = service_with(backend.clone());

        let first = service.resolve("about").await;
        assert_eq!(first.source, MetadataSource::Store);
        assert_eq!(first.document, about);

        clock.advance(Duration::from_secs(120));
        let second = service.resolve("about").await;
        assert_eq!(second.source, MetadataSource::Cache);
        assert_eq!(second.document, about);
        assert_eq!(backend.read_calls(), 1);

        clock.advance(Duration::from_secs(300));
        let third = service.resolve("about").await;
        assert_eq!(third.source, MetadataSource::Store);
        assert_eq!(backend.read_calls(), 2);
    }

    #[tokio::test]
    async fn missing_document_is_synthesized_and_not_cached() {
        let backend = Arc::new(MemoryBackend::default());
        let (service, _clock) = service_with(backend.clone());

        let resolved = service.resolve("study-in-canada/careers").await;
        assert_eq!(resolved.source, MetadataSource::Default);
        assert!(resolved.document.title.contains("Canada"));

        service.resolve("study-in-canada/careers").await;
        assert_eq!(backend.read_calls(), 2);
        assert_eq!(backend.write_calls(), 0);
        assert_eq!(service.cache().len(), 0);
    }

    #[tokio::test]
    async fn transport_failure_degrades_to_default() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert(sample_document("about"));
        backend.fail_transport(true);
        let (service, _clock) = service_with(backend);

        let resolved = service.resolve("about").await;
        assert_eq!(resolved.source, MetadataSource::Default);
        assert!(resolved.document.check_required().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out_to_default() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert(sample_document("about"));
        backend.delay_reads(Duration::from_secs(10));
        let (service, _clock) = service_with(backend);

        let resolved = service.resolve("about").await;
        assert_eq!(resolved.source, MetadataSource::Default);
    }

    #[tokio::test]
    async fn malformed_identifier_skips_storage() {
        let backend = Arc::new(MemoryBackend::default());
        let (service, _clock) = service_with(backend.clone());

        let resolved = service.resolve("../../etc").await;
        assert_eq!(resolved.source, MetadataSource::Default);
        assert_eq!(backend.read_calls(), 0);
    }

    #[tokio::test]
    async fn page_meta_applies_social_fallbacks() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert(sample_document("contact"));
        let (service, _clock) = service_with(backend);

        let meta = service.resolve("contact").await.page_meta();
        assert_eq!(meta.og_title, "contact | Study Abroad");
        assert_eq!(meta.og_image, DEFAULT_OG_IMAGE);
    }
}
