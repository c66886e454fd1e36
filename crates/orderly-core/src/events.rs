use std::sync::atomic::{AtomicU64, Ordering};

/// Receiver for engine events.
///
/// This is the boundary with whatever observability layer sits above the
/// engine; transport and aggregation live there. All methods have no-op
/// defaults.
pub trait EventSink: Send + Sync {
    fn on_cache_hit(&self, _path: &str) {}
    fn on_cache_miss(&self, _path: &str) {}
    /// A file was sampled; `bytes_read` out of `file_size` were read.
    fn on_bytes_saved(&self, _bytes_read: u64, _file_size: u64) {}
    fn on_safety_block(&self, _path: &str, _reason: &str) {}
    fn on_do_nothing(&self, _path: &str) {}
    fn on_file_planned(&self, _files_done: usize, _total_files: usize) {}
    fn on_item_executed(&self, _items_done: usize, _total_items: usize) {}
}

/// No-op sink for silent operation.
pub struct SilentSink;

impl EventSink for SilentSink {}

/// Sink that only counts, for tests and for callers that poll totals.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_saved: AtomicU64,
    pub safety_blocks: AtomicU64,
    pub do_nothing: AtomicU64,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

impl EventSink for CountingSink {
    fn on_cache_hit(&self, _path: &str) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn on_cache_miss(&self, _path: &str) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn on_bytes_saved(&self, bytes_read: u64, file_size: u64) {
        self.bytes_read.fetch_add(bytes_read, Ordering::Relaxed);
        self.bytes_saved
            .fetch_add(file_size.saturating_sub(bytes_read), Ordering::Relaxed);
    }

    fn on_safety_block(&self, _path: &str, _reason: &str) {
        self.safety_blocks.fetch_add(1, Ordering::Relaxed);
    }

    fn on_do_nothing(&self, _path: &str) {
        self.do_nothing.fetch_add(1, Ordering::Relaxed);
    }
}
