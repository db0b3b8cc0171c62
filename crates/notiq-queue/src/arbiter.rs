//! Presentation arbiter: the one place that decides whether and when an
//! item reaches the screen.
//!
//! Delivery stages, in order:
//!
//! 1. empty items are ignored;
//! 2. the arbiter-wide `filter_out_messages` list;
//! 3. connectivity gate: network errors are deferred while unreachable;
//! 4. modal lane: one modal at a time, FIFO, bounded wait;
//! 5. the [`Presenter`].
//!
//! Deferred items live in a [`DeferredSet`] owned by the arbiter and are
//! retried at every commit and whenever reachability comes back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, Weak};

use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use notiq_core::{
    Admission, ArbiterConfig, ConnectivityOracle, ContentFilter, DeferReason, DeferredEntry,
    DeferredSet, DeliveryError, Eviction, FilterSet, FilterStage, ItemKind, ModalLane, ModalState,
    Presenter, QueueItem, Reachability, Ticket,
};

use crate::presenter::TracingPresenter;
use crate::queue::BatchQueue;

static SHARED: OnceLock<Arc<PresentationArbiter>> = OnceLock::new();

// ─── Stats ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Counters {
    shown: AtomicU64,
    ignored: AtomicU64,
    filtered: AtomicU64,
    deferred: AtomicU64,
    failed: AtomicU64,
    modal_timeouts: AtomicU64,
    dropped: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Point-in-time copy of the arbiter's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArbiterStats {
    pub shown: u64,
    pub ignored: u64,
    pub filtered: u64,
    /// Items that entered the deferred set.
    pub deferred: u64,
    pub failed: u64,
    pub modal_timeouts: u64,
    /// Deferred items dropped by TTL, attempt limit, or capacity.
    pub dropped: u64,
}

/// Result of one [`PresentationArbiter::retry_deferred`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub still_deferred: usize,
    pub dropped: usize,
}

// ─── Modal Slots ─────────────────────────────────────────────────

/// Modal lane plus the wakeup channel of every queued ticket.
#[derive(Debug, Default)]
struct ModalSlots {
    lane: ModalLane,
    wakers: HashMap<Ticket, oneshot::Sender<()>>,
}

impl ModalSlots {
    /// Hand the slot to the next live waiter, or go idle.
    fn pass_on(&mut self) {
        while let Some(next) = self.lane.dismiss() {
            if let Some(tx) = self.wakers.remove(&next) {
                if tx.send(()).is_ok() {
                    return;
                }
            }
            // Waiter went away without withdrawing: skip it.
            tracing::debug!(ticket = next, "modal waiter gone, passing slot on");
        }
    }
}

// ─── Arbiter ─────────────────────────────────────────────────────

pub struct PresentationArbiter {
    config: ArbiterConfig,
    presenter: RwLock<Arc<dyn Presenter>>,
    reachability: RwLock<Option<Weak<dyn ConnectivityOracle>>>,
    /// Arbiter-wide suppression list, applied after each queue's own filter.
    filter_out: FilterSet,
    /// Filter handed to every queue from [`Self::detach_queue`].
    queue_filters: FilterSet,
    modal: Mutex<ModalSlots>,
    deferred: Mutex<DeferredSet>,
    next_ticket: AtomicU64,
    epoch: Instant,
    counters: Counters,
}

impl std::fmt::Debug for PresentationArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationArbiter")
            .field("config", &self.config)
            .field("modal_state", &self.modal_state())
            .field("deferred", &self.deferred_len())
            .finish_non_exhaustive()
    }
}

impl PresentationArbiter {
    pub fn new(presenter: Arc<dyn Presenter>, config: ArbiterConfig) -> Self {
        let deferred = DeferredSet::new(config.defer.clone());
        Self {
            config,
            presenter: RwLock::new(presenter),
            reachability: RwLock::new(None),
            filter_out: FilterSet::new(),
            queue_filters: FilterSet::new(),
            modal: Mutex::new(ModalSlots::default()),
            deferred: Mutex::new(deferred),
            next_ticket: AtomicU64::new(1),
            epoch: Instant::now(),
            counters: Counters::default(),
        }
    }

    /// The process-wide arbiter, created on first use and never torn down.
    ///
    /// Starts with a [`TracingPresenter`]; install the real surface with
    /// [`Self::set_presenter`].
    pub fn shared() -> Arc<Self> {
        let arbiter = SHARED.get_or_init(|| {
            tracing::debug!("creating shared presentation arbiter");
            Arc::new(Self::new(
                Arc::new(TracingPresenter),
                ArbiterConfig::default(),
            ))
        });
        Arc::clone(arbiter)
    }

    /// Create the process-wide arbiter with an explicit presenter and config.
    ///
    /// If it already exists the config is ignored and only the presenter is
    /// replaced.
    pub fn init_shared(presenter: Arc<dyn Presenter>, config: ArbiterConfig) -> Arc<Self> {
        let candidate = Arc::new(Self::new(Arc::clone(&presenter), config));
        if SHARED.set(candidate).is_err() {
            tracing::warn!("shared arbiter already initialised, keeping its config");
            let shared = Self::shared();
            shared.set_presenter(presenter);
            return shared;
        }
        Self::shared()
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn set_presenter(&self, presenter: Arc<dyn Presenter>) {
        *self
            .presenter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = presenter;
    }

    /// Observe `oracle` without keeping it alive.
    pub fn set_reachability<O: ConnectivityOracle + 'static>(&self, oracle: &Arc<O>) {
        let oracle: Arc<dyn ConnectivityOracle> = oracle.clone();
        let weak: Weak<dyn ConnectivityOracle> = Arc::downgrade(&oracle);
        *self
            .reachability
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(weak);
    }

    pub fn clear_reachability(&self) {
        *self
            .reachability
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Current reachability; `Unknown` if no oracle is set or it was dropped.
    pub fn reachability(&self) -> Reachability {
        let oracle = self
            .reachability
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade);
        oracle.map_or(Reachability::Unknown, |o| o.reachability())
    }

    pub fn filter_out_messages(&self) -> Vec<String> {
        self.filter_out.snapshot().to_vec()
    }

    pub fn set_filter_out_messages(&self, signatures: Vec<String>) {
        self.filter_out.replace(signatures);
    }

    /// Filter shared by all queues from [`Self::detach_queue`].
    pub fn queue_filters(&self) -> &FilterSet {
        &self.queue_filters
    }

    /// New queue feeding this arbiter, wired to the shared queue filters.
    ///
    /// Must be called inside a tokio runtime.
    pub fn detach_queue(self: &Arc<Self>) -> BatchQueue {
        BatchQueue::new(Arc::clone(self), self.queue_filters.clone())
    }

    pub fn modal_state(&self) -> ModalState {
        self.lock_modal().lane.state()
    }

    pub fn deferred_len(&self) -> usize {
        self.lock_deferred().len()
    }

    pub fn stats(&self) -> ArbiterStats {
        let c = &self.counters;
        ArbiterStats {
            shown: c.shown.load(Ordering::Relaxed),
            ignored: c.ignored.load(Ordering::Relaxed),
            filtered: c.filtered.load(Ordering::Relaxed),
            deferred: c.deferred.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            modal_timeouts: c.modal_timeouts.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
        }
    }

    /// Present `item`, or explain why not.
    ///
    /// A modal request waits (up to `modal_wait_timeout_ms`) for the
    /// visible modal to be dismissed. `modal` is ignored for anything but
    /// alerts. Deferred outcomes mean the arbiter kept the item and will
    /// retry it.
    pub async fn show_alert(&self, item: QueueItem, modal: bool) -> Result<(), DeliveryError> {
        let modal = modal && item.kind() == ItemKind::Alert;
        let result = self.deliver(&item, modal).await;
        self.record(&item, modal, &result);
        if let Err(err) = &result {
            if let Some(reason) = defer_reason(err) {
                self.defer(item, modal, reason);
            }
        }
        result
    }

    /// The visible modal was closed. Grants the slot to the next waiter.
    pub fn dismiss_modal(&self) {
        let mut slots = self.lock_modal();
        if !slots.lane.is_showing() {
            tracing::debug!("dismiss with no modal visible");
            return;
        }
        slots.pass_on();
        tracing::debug!(state = ?slots.lane.state(), "modal dismissed");
    }

    /// Drop expired entries, then re-attempt every deferred item.
    ///
    /// Never waits: a modal entry is only re-attempted when the lane is
    /// idle, otherwise it stays deferred without spending an attempt.
    pub async fn retry_deferred(&self) -> RetryReport {
        let now_ms = self.now_ms();
        let (expired, entries) = {
            let mut set = self.lock_deferred();
            let expired = set.evict_expired(now_ms);
            (expired, set.take_all())
        };

        let mut report = RetryReport {
            dropped: expired.len(),
            ..RetryReport::default()
        };
        for entry in &expired {
            self.log_eviction(entry, Eviction::Expired);
        }
        if entries.is_empty() {
            return report;
        }

        let reachability = self.reachability();
        tracing::debug!(count = entries.len(), %reachability, "retrying deferred items");

        for entry in entries {
            if entry.item.requires_connectivity() && reachability.blocks_delivery() {
                if self.requeue(entry, DeferReason::Unreachable) {
                    report.still_deferred += 1;
                } else {
                    report.dropped += 1;
                }
                continue;
            }

            let admitted = self.admit(&entry.item);
            if admitted.is_ok() && entry.modal && !self.try_acquire_modal() {
                self.restore(entry);
                report.still_deferred += 1;
                continue;
            }

            report.attempted += 1;
            let result = admitted.and_then(|()| self.present(&entry.item, entry.modal));
            match &result {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    if let Some(reason) = defer_reason(err) {
                        if self.requeue(entry, reason) {
                            report.still_deferred += 1;
                        } else {
                            report.dropped += 1;
                        }
                        continue;
                    }
                }
            }
            self.record(&entry.item, entry.modal, &result);
        }

        tracing::debug!(
            delivered = report.delivered,
            still_deferred = report.still_deferred,
            dropped = report.dropped,
            "deferred retry finished"
        );
        report
    }

    /// Retry deferred items every time `rx` turns `Reachable`.
    ///
    /// The task only holds a weak handle and exits once the arbiter or the
    /// sender is gone.
    pub fn watch_reachability(
        self: &Arc<Self>,
        mut rx: watch::Receiver<Reachability>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        // Read before spawning: a change made before the task first runs
        // must still count as a transition.
        let mut last = *rx.borrow_and_update();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let current = *rx.borrow_and_update();
                let restored = current == Reachability::Reachable && last != Reachability::Reachable;
                last = current;
                if !restored {
                    continue;
                }
                let Some(arbiter) = weak.upgrade() else {
                    break;
                };
                tracing::info!("network reachable, retrying deferred items");
                arbiter.retry_deferred().await;
            }
            tracing::debug!("reachability watcher stopped");
        })
    }

    // ─── Internals ───────────────────────────────────────────────

    async fn deliver(&self, item: &QueueItem, modal: bool) -> Result<(), DeliveryError> {
        self.admit(item)?;
        if modal {
            self.acquire_modal().await?;
        }
        self.present(item, modal)
    }

    /// Stages before the modal lane: emptiness, arbiter filter, connectivity.
    fn admit(&self, item: &QueueItem) -> Result<(), DeliveryError> {
        if item.is_empty() {
            return Err(DeliveryError::InputIgnored);
        }
        if ContentFilter::new(&self.filter_out).should_suppress(item) {
            return Err(DeliveryError::FilteredOut {
                stage: FilterStage::Arbiter,
            });
        }
        if item.requires_connectivity() && self.reachability().blocks_delivery() {
            return Err(DeliveryError::DeferredUnreachable);
        }
        Ok(())
    }

    /// Hand `item` to the presenter. A modal caller must already own the slot.
    fn present(&self, item: &QueueItem, modal: bool) -> Result<(), DeliveryError> {
        let presenter = Arc::clone(
            &self
                .presenter
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        );

        if !modal {
            return presenter.present(item, false).map_err(DeliveryError::from);
        }
        if let Err(err) = presenter.present(item, true) {
            // Nothing is on screen, so nobody will dismiss it.
            self.lock_modal().pass_on();
            return Err(err.into());
        }
        Ok(())
    }

    /// Take the modal slot only if nothing is showing or queued.
    fn try_acquire_modal(&self) -> bool {
        let mut slots = self.lock_modal();
        if slots.lane.state() != ModalState::Idle {
            return false;
        }
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        matches!(slots.lane.request(ticket), Admission::Granted)
    }

    /// Wait for the modal slot, bounded by `modal_wait_timeout_ms`.
    async fn acquire_modal(&self) -> Result<(), DeliveryError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let mut rx = {
            let mut slots = self.lock_modal();
            match slots.lane.request(ticket) {
                Admission::Granted => return Ok(()),
                Admission::Queued(position) => {
                    tracing::debug!(ticket, position, "modal busy, waiting");
                    let (tx, rx) = oneshot::channel();
                    slots.wakers.insert(ticket, tx);
                    rx
                }
            }
        };

        let wait = self.config.modal_wait_timeout();
        let started = Instant::now();
        if let Ok(Ok(())) = tokio::time::timeout(wait, &mut rx).await {
            return Ok(());
        }

        // Timed out. The slot may have been granted right after the timer
        // fired; `rx` is still alive, so a grant cannot have been skipped.
        let mut slots = self.lock_modal();
        if slots.lane.withdraw(ticket) {
            slots.wakers.remove(&ticket);
            let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            return Err(DeliveryError::ModalWaitTimedOut { waited_ms });
        }
        Ok(())
    }

    fn defer(&self, item: QueueItem, modal: bool, reason: DeferReason) {
        let now_ms = self.now_ms();
        let victim = self.lock_deferred().push(item, modal, reason, now_ms);
        if let Some(victim) = victim {
            self.log_eviction(&victim, Eviction::Overflow);
        }
    }

    /// Put back an entry that was not attempted.
    fn restore(&self, entry: DeferredEntry) {
        let victim = self.lock_deferred().restore(entry);
        if let Some(victim) = victim {
            self.log_eviction(&victim, Eviction::Overflow);
        }
    }

    /// Returns `false` if the entry itself was dropped.
    fn requeue(&self, entry: DeferredEntry, reason: DeferReason) -> bool {
        let evicted = self.lock_deferred().requeue(entry, reason);
        match evicted {
            Some((victim, why)) => {
                self.log_eviction(&victim, why);
                why != Eviction::Exhausted
            }
            None => true,
        }
    }

    fn record(&self, item: &QueueItem, modal: bool, result: &Result<(), DeliveryError>) {
        let kind = item.kind();
        match result {
            Ok(()) => {
                bump(&self.counters.shown);
                tracing::debug!(item_id = item.id, %kind, modal, "presented");
            }
            Err(DeliveryError::InputIgnored) => {
                bump(&self.counters.ignored);
                tracing::debug!(item_id = item.id, %kind, "empty item ignored");
            }
            Err(DeliveryError::FilteredOut { stage }) => {
                bump(&self.counters.filtered);
                tracing::debug!(item_id = item.id, %kind, ?stage, "item filtered out");
            }
            Err(DeliveryError::DeferredUnreachable) => {
                bump(&self.counters.deferred);
                tracing::info!(item_id = item.id, %kind, "network unreachable, item deferred");
            }
            Err(DeliveryError::ModalWaitTimedOut { waited_ms }) => {
                bump(&self.counters.modal_timeouts);
                bump(&self.counters.deferred);
                tracing::warn!(item_id = item.id, %kind, waited_ms, "modal wait timed out, item deferred");
            }
            Err(DeliveryError::PresentationFailed(e)) => {
                bump(&self.counters.failed);
                tracing::warn!(item_id = item.id, %kind, modal, error = %e, "presentation failed");
            }
        }
    }

    fn log_eviction(&self, entry: &DeferredEntry, why: Eviction) {
        bump(&self.counters.dropped);
        tracing::warn!(
            item_id = entry.item.id,
            kind = %entry.item.kind(),
            attempts = entry.attempts,
            reason = ?why,
            "deferred item dropped"
        );
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn lock_modal(&self) -> MutexGuard<'_, ModalSlots> {
        self.modal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_deferred(&self) -> MutexGuard<'_, DeferredSet> {
        self.deferred.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn defer_reason(err: &DeliveryError) -> Option<DeferReason> {
    match err {
        DeliveryError::DeferredUnreachable => Some(DeferReason::Unreachable),
        DeliveryError::ModalWaitTimedOut { .. } => Some(DeferReason::ModalBusy),
        _ => None,
    }
}
