//! Test doubles shared by the service and handler tests.

use crate::models::metadata::MetadataDocument;
use crate::services::cache::Clock;
use crate::services::storage_service::{StorageBackend, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::{Duration, Instant},
};

pub fn sample_document(id: &str) -> MetadataDocument {
    MetadataDocument {
        page_identifier: id.to_string(),
        title: format!("{} | Study Abroad", id),
        description: format!("Everything you need to know about {}.", id),
        keywords: vec!["study abroad".into(), id.to_string()],
        last_updated: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).single(),
        updated_by: Some("editor@example.com".into()),
        version: Some(1),
        ..Default::default()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// In-memory backend with call counters, failure injection and optional latency.
pub struct MemoryBackend {
    label: &'static str,
    documents: Mutex<BTreeMap<String, MetadataDocument>>,
    fail: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::labelled("memory backend")
    }
}

impl MemoryBackend {
    pub fn labelled(label: &'static str) -> Self {
        Self {
            label,
            documents: Mutex::new(BTreeMap::new()),
            fail: AtomicBool::new(false),
            read_delay: Mutex::new(None),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, document: MetadataDocument) {
        self.documents
            .lock()
            .insert(document.page_identifier.clone(), document);
    }

    pub fn get(&self, id: &str) -> Option<MetadataDocument> {
        self.documents.lock().get(id).cloned()
    }

    pub fn fail_transport(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock() = Some(delay);
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Transport(format!("{} unavailable", self.label)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, id: &str) -> StoreResult<MetadataDocument> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;
        self.get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn write(&self, id: &str, document: &MetadataDocument) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.documents.lock().insert(id.to_string(), document.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        match self.documents.lock().remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn list(&self) -> StoreResult<Vec<String>> {
        self.check_available()?;
        Ok(self.documents.lock().keys().cloned().collect())
    }
}
