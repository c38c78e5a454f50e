use crate::documents::SummaryStatus;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity since startup.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_ingested: AtomicU64,
    summaries_generated: AtomicU64,
    summaries_skipped: AtomicU64,
    summaries_failed: AtomicU64,
    extraction_failures: AtomicU64,
    questions_answered: AtomicU64,
    documents_deleted: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a persisted document together with its summary outcome.
    pub fn record_ingest(&self, status: SummaryStatus, extraction_failed: bool) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        let counter = match status {
            SummaryStatus::Generated => &self.summaries_generated,
            SummaryStatus::Skipped => &self.summaries_skipped,
            SummaryStatus::Failed => &self.summaries_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if extraction_failed {
            self.extraction_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a successfully answered question.
    pub fn record_answer(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed delete.
    pub fn record_delete(&self) {
        self.documents_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            summaries_skipped: self.summaries_skipped.load(Ordering::Relaxed),
            summaries_failed: self.summaries_failed.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents persisted since startup.
    pub documents_ingested: u64,
    /// Summaries produced by the provider.
    pub summaries_generated: u64,
    /// Summaries replaced by the skip sentinel.
    pub summaries_skipped: u64,
    /// Summaries replaced by a failure sentinel.
    pub summaries_failed: u64,
    /// Uploads whose text extraction failed.
    pub extraction_failures: u64,
    /// Questions answered by the provider.
    pub questions_answered: u64,
    /// Documents removed by their owner.
    pub documents_deleted: u64,
}
