//! In-process TTL cache in front of the metadata store's read path.
//!
//! Each process holds its own instance. There is no cross-process
//! invalidation, so an admin write served by one instance can leave other
//! instances stale for up to one TTL.

use crate::models::metadata::MetadataDocument;
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

/// Default lifetime of a cached document.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    document: MetadataDocument,
    captured_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Bumped by every invalidation so in-flight fills can detect they raced one.
    generation: u64,
}

/// Permission to populate the cache with the result of a storage read.
///
/// Taken before the read starts. [`TtlCache::fill`] refuses it if any
/// invalidation happened in between.
#[derive(Debug, Clone, Copy)]
pub struct FillTicket {
    generation: u64,
}

pub struct TtlCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: RwLock<CacheState>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.captured_at) < self.ttl
    }

    /// Cached document if younger than the TTL; expired entries are evicted.
    pub fn get(&self, id: &str) -> Option<MetadataDocument> {
        let now = self.clock.now();
        {
            let state = self.state.read();
            match state.entries.get(id) {
                None => return None,
                Some(entry) if self.is_fresh(entry, now) => return Some(entry.document.clone()),
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a concurrent `set` may have replaced
        // the expired entry since the read lock was released.
        let mut state = self.state.write();
        if let Some(entry) = state.entries.get(id) {
            if self.is_fresh(entry, now) {
                return Some(entry.document.clone());
            }
            state.entries.remove(id);
        }
        None
    }

    /// Unconditionally replace the entry with a fresh timestamp.
    pub fn set(&self, id: &str, document: MetadataDocument) {
        let captured_at = self.clock.now();
        self.state.write().entries.insert(
            id.to_string(),
            CacheEntry {
                document,
                captured_at,
            },
        );
    }

    pub fn ticket(&self) -> FillTicket {
        FillTicket {
            generation: self.state.read().generation,
        }
    }

    /// Like [`set`](Self::set), but only if nothing was invalidated since `ticket` was taken.
    ///
    /// Returns whether the entry was stored.
    pub fn fill(&self, ticket: FillTicket, id: &str, document: MetadataDocument) -> bool {
        let captured_at = self.clock.now();
        let mut state = self.state.write();
        if state.generation != ticket.generation {
            return false;
        }
        state.entries.insert(
            id.to_string(),
            CacheEntry {
                document,
                captured_at,
            },
        );
        true
    }

    /// Remove the entry if present.
    pub fn invalidate(&self, id: &str) {
        let mut state = self.state.write();
        state.entries.remove(id);
        state.generation = state.generation.wrapping_add(1);
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.generation = state.generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{ManualClock, sample_document};

    fn cache_with_clock() -> (TtlCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (TtlCache::with_clock(DEFAULT_TTL, clock.clone()), clock)
    }

    #[test]
    fn entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock();
        let doc = sample_document("about");
        cache.set("about", doc.clone());
        assert_eq!(cache.get("about"), Some(doc.clone()));

        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get("about"), Some(doc));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("about"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn set_refreshes_timestamp() {
        let (cache, clock) = cache_with_clock();
        cache.set("about", sample_document("about"));
        clock.advance(Duration::from_secs(200));

        let mut newer = sample_document("about");
        newer.title = "About the team".into();
        cache.set("about", newer.clone());
        clock.advance(Duration::from_secs(200));

        assert_eq!(cache.get("about"), Some(newer));
    }

    #[test]
    fn invalidate_removes_entry() {
        let (cache, _clock) = cache_with_clock();
        cache.set("about", sample_document("about"));
        cache.invalidate("about");
        assert_eq!(cache.get("about"), None);

        cache.invalidate("never-cached");
    }

    #[test]
    fn clear_drops_everything() {
        let (cache, _clock) = cache_with_clock();
        cache.set("about", sample_document("about"));
        cache.set("contact", sample_document("contact"));
        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn fill_is_refused_after_invalidation() {
        let (cache, _clock) = cache_with_clock();
        let ticket = cache.ticket();

        // An admin write lands while the storage read is in flight.
        cache.invalidate("about");

        assert!(!cache.fill(ticket, "about", sample_document("about")));
        assert_eq!(cache.get("about"), None);

        let fresh = cache.ticket();
        assert!(cache.fill(fresh, "about", sample_document("about")));
        assert!(cache.get("about").is_some());
    }

    #[test]
    fn concurrent_set_and_expired_get_never_lose_newest_value() {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(TtlCache::with_clock(Duration::from_secs(1), clock.clone()));
        cache.set("about", sample_document("about"));
        clock.advance(Duration::from_secs(5));

        let mut newest = sample_document("about");
        newest.title = "Newest".into();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let cache = cache.clone();
                scope.spawn(move || {
                    for _ in 0..1000 {
                        let _ = cache.get("about");
                    }
                });
            }
            let cache = cache.clone();
            let newest = newest.clone();
            scope.spawn(move || cache.set("about", newest));
        });

        assert_eq!(cache.get("about"), Some(newest));
    }
}
