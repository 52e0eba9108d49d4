use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing upload and question activity.
#[derive(Default)]
pub struct QnaMetrics {
    files_processed: AtomicU64,
    files_skipped: AtomicU64,
    files_failed: AtomicU64,
    chunks_summarized: AtomicU64,
    questions_answered: AtomicU64,
    relevance_fallbacks: AtomicU64,
}

impl QnaMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stored file and the number of chunks summarized for it.
    pub fn record_file(&self, chunk_count: u64) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_summarized
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record an upload skipped because the file was already stored.
    pub fn record_skip(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload that failed extraction, chunking, or summarization.
    pub fn record_failure(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered question and whether relevance parsing fell back.
    pub fn record_question(&self, fallback: bool) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
        if fallback {
            self.relevance_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            chunks_summarized: self.chunks_summarized.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            relevance_fallbacks: self.relevance_fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Files stored since startup.
    pub files_processed: u64,
    /// Uploads skipped as already stored.
    pub files_skipped: u64,
    /// Uploads that failed.
    pub files_failed: u64,
    /// Chunks summarized across all stored files.
    pub chunks_summarized: u64,
    /// Questions answered.
    pub questions_answered: u64,
    /// Questions where relevance scores could not be parsed.
    pub relevance_fallbacks: u64,
}
