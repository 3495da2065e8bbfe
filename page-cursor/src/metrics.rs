use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

#[derive(Default)]
struct CursorMetricsInner {
    fetches_issued: AtomicU64,
    fetches_coalesced: AtomicU64,
    fetch_errors: AtomicU64,
    stale_discarded: AtomicU64,
    cache_hits: AtomicU64,
}

/// Cheap operation counters, shared by handle.
#[derive(Clone, Default)]
pub struct CursorMetrics {
    inner: Arc<CursorMetricsInner>,
}

pub struct CursorMetricsSnapshot {
    pub fetches_issued: u64,
    pub fetches_coalesced: u64,
    pub fetch_errors: u64,
    pub stale_discarded: u64,
    pub cache_hits: u64,
}

impl CursorMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CursorMetricsInner::default()),
        }
    }

    pub fn record_fetch_issued(&self) {
        self.inner.fetches_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_coalesced(&self) {
        self.inner.fetches_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_error(&self) {
        self.inner.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_discarded(&self) {
        self.inner.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CursorMetricsSnapshot {
        CursorMetricsSnapshot {
            fetches_issued: self.inner.fetches_issued.load(Ordering::Relaxed),
            fetches_coalesced: self.inner.fetches_coalesced.load(Ordering::Relaxed),
            fetch_errors: self.inner.fetch_errors.load(Ordering::Relaxed),
            stale_discarded: self.inner.stale_discarded.load(Ordering::Relaxed),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
        }
    }
}
