//! Batching queue: producers append from any thread, a timer task commits
//! the batch every `despatch_interval`.
//!
//! Commit swaps the pending list out under the lock and forwards the items
//! with the lock released, so producers are only ever blocked for the swap.
//! Two commits racing (timer and explicit) each drain whatever was pending
//! when they swapped; no item is drained twice.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use notiq_core::{
    Alert, ContentFilter, DeliveryError, ErrorReport, FilterSet, FilterStage, ItemKind, Message,
    Payload, QueueConfig, QueueItem,
};

use crate::arbiter::PresentationArbiter;

/// Tally of one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    /// Items taken from the pending list.
    pub drained: usize,
    pub shown: usize,
    /// Suppressed by the queue filter, duplicate collapsing, or the arbiter filter.
    pub filtered: usize,
    /// Now held by the arbiter for a later retry.
    pub deferred: usize,
    pub failed: usize,
    pub ignored: usize,
    /// Previously deferred items delivered by this commit's retry pass.
    pub redelivered: usize,
}

struct QueueInner {
    pending: Mutex<Vec<QueueItem>>,
    next_id: AtomicU64,
    interval_ms: AtomicU64,
    collapse_duplicates: AtomicBool,
    filters: FilterSet,
    arbiter: Arc<PresentationArbiter>,
}

impl QueueInner {
    fn lock_pending(&self) -> MutexGuard<'_, Vec<QueueItem>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn despatch_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    fn enqueue(&self, payload: Payload, modal: bool) {
        let mut item = QueueItem::new(0, payload, modal, Utc::now());
        if item.is_empty() {
            tracing::trace!(kind = %item.kind(), "empty item ignored at enqueue");
            return;
        }
        item.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_pending().push(item);
    }

    async fn commit(&self) -> CommitReport {
        let retried = self.arbiter.retry_deferred().await;

        let batch = std::mem::take(&mut *self.lock_pending());
        let mut report = CommitReport {
            drained: batch.len(),
            redelivered: retried.delivered,
            ..CommitReport::default()
        };
        if batch.is_empty() {
            return report;
        }

        let filter = ContentFilter::new(&self.filters);
        let collapse = self.collapse_duplicates.load(Ordering::Relaxed);
        let mut seen: HashSet<(ItemKind, String)> = HashSet::new();

        for item in batch {
            if filter.should_suppress(&item) {
                report.filtered += 1;
                tracing::debug!(item_id = item.id, stage = ?FilterStage::Queue, "item filtered out");
                continue;
            }
            if collapse && !seen.insert((item.kind(), item.signature().to_owned())) {
                report.filtered += 1;
                tracing::debug!(item_id = item.id, stage = ?FilterStage::Duplicate, "item filtered out");
                continue;
            }

            let modal = item.modal;
            match self.arbiter.show_alert(item, modal).await {
                Ok(()) => report.shown += 1,
                Err(DeliveryError::InputIgnored) => report.ignored += 1,
                Err(DeliveryError::FilteredOut { .. }) => report.filtered += 1,
                Err(err) if err.is_deferred() => report.deferred += 1,
                Err(_) => report.failed += 1,
            }
        }

        tracing::debug!(
            drained = report.drained,
            shown = report.shown,
            filtered = report.filtered,
            deferred = report.deferred,
            failed = report.failed,
            "batch committed"
        );
        report
    }
}

/// Buffers notifications and commits them to a [`PresentationArbiter`].
///
/// `add_*` never fail: `None` or empty payloads are dropped silently.
/// Dropping the queue stops its timer and spawns a final best-effort commit
/// if a runtime is available; [`Self::shutdown`] does the same but waits.
pub struct BatchQueue {
    inner: Arc<QueueInner>,
    cancel: CancellationToken,
}

impl BatchQueue {
    /// Queue with the default 2s despatch interval.
    ///
    /// The timer task is spawned on the current tokio runtime. Outside one
    /// the queue only commits explicitly.
    pub fn new(arbiter: Arc<PresentationArbiter>, filters: FilterSet) -> Self {
        Self::with_config(arbiter, filters, QueueConfig::default())
    }

    pub fn with_config(
        arbiter: Arc<PresentationArbiter>,
        filters: FilterSet,
        config: QueueConfig,
    ) -> Self {
        let inner = Arc::new(QueueInner {
            pending: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            interval_ms: AtomicU64::new(config.despatch_interval_ms.max(1)),
            collapse_duplicates: AtomicBool::new(config.collapse_duplicates),
            filters,
            arbiter,
        });
        let cancel = CancellationToken::new();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(run_despatch_timer(Arc::downgrade(&inner), cancel.clone()));
            }
            Err(_) => {
                tracing::warn!("batch queue created outside a runtime, despatch timer disabled");
            }
        }
        tracing::debug!(
            interval_ms = config.despatch_interval_ms,
            "batch queue created"
        );
        Self { inner, cancel }
    }

    pub fn add_message(&self, message: impl Into<Option<Message>>) {
        if let Some(message) = message.into() {
            self.inner.enqueue(Payload::Message(message), false);
        }
    }

    pub fn add_alert(&self, alert: impl Into<Option<Alert>>, modal: bool) {
        if let Some(alert) = alert.into() {
            self.inner.enqueue(Payload::Alert(alert), modal);
        }
    }

    pub fn add_error(&self, error: impl Into<Option<ErrorReport>>) {
        if let Some(error) = error.into() {
            self.inner.enqueue(Payload::Error(error), false);
        }
    }

    pub fn add_parse_error(&self, error: impl Into<Option<ErrorReport>>) {
        if let Some(error) = error.into() {
            self.inner.enqueue(Payload::ParseError(error), false);
        }
    }

    /// Drain and deliver everything pending. A no-op on an empty queue,
    /// apart from the arbiter's deferred retry pass.
    pub async fn commit(&self) -> CommitReport {
        self.inner.commit().await
    }

    /// Pending (not yet committed) items.
    pub fn len(&self) -> usize {
        self.inner.lock_pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn despatch_interval(&self) -> Duration {
        self.inner.despatch_interval()
    }

    /// Takes effect from the next timer tick.
    pub fn set_despatch_interval(&self, interval: Duration) {
        let ms = u64::try_from(interval.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self.inner.interval_ms.store(ms, Ordering::Relaxed);
    }

    pub fn set_collapse_duplicates(&self, collapse: bool) {
        self.inner
            .collapse_duplicates
            .store(collapse, Ordering::Relaxed);
    }

    /// The queue's own filter. Shared with whoever else holds a clone.
    pub fn filters(&self) -> &FilterSet {
        &self.inner.filters
    }

    pub fn arbiter(&self) -> &Arc<PresentationArbiter> {
        &self.inner.arbiter
    }

    /// Stop the timer and commit what is left.
    pub async fn shutdown(self) -> CommitReport {
        self.cancel.cancel();
        self.inner.commit().await
    }
}

impl Drop for BatchQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
        let pending = self.len();
        if pending == 0 {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    inner.commit().await;
                });
            }
            Err(_) => {
                tracing::warn!(pending, "queue dropped outside a runtime, pending items lost");
            }
        }
    }
}

async fn run_despatch_timer(queue: Weak<QueueInner>, cancel: CancellationToken) {
    loop {
        let Some(period) = queue.upgrade().map(|q| q.despatch_interval()) else {
            break;
        };
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(period) => {}
        }
        let Some(inner) = queue.upgrade() else {
            break;
        };
        inner.commit().await;
    }
    tracing::debug!("despatch timer stopped");
}
