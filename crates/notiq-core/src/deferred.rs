//! Ledger of items the arbiter could not deliver yet.
//!
//! Pure, deterministic: all time values are epoch-relative milliseconds
//! supplied by the caller.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::DeferPolicy;
use crate::types::QueueItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferReason {
    /// Needs the network and the oracle said unreachable.
    Unreachable,
    /// Gave up waiting for the modal slot.
    ModalBusy,
}

/// Why an entry left the ledger without being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eviction {
    /// Older than `ttl_ms`.
    Expired,
    /// Blocked for `max_attempts` retry cycles.
    Exhausted,
    /// Pushed out by a newer entry at capacity.
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredEntry {
    pub item: QueueItem,
    pub modal: bool,
    pub reason: DeferReason,
    pub deferred_at_ms: u64,
    /// Retry cycles that found the entry still blocked.
    pub attempts: u32,
}

#[derive(Debug)]
pub struct DeferredSet {
    policy: DeferPolicy,
    entries: VecDeque<DeferredEntry>,
}

impl DeferredSet {
    pub fn new(policy: DeferPolicy) -> Self {
        Self {
            policy,
            entries: VecDeque::new(),
        }
    }

    pub fn policy(&self) -> &DeferPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a freshly deferred item.
    ///
    /// Returns the entry evicted to make room, if the set was full.
    pub fn push(
        &mut self,
        item: QueueItem,
        modal: bool,
        reason: DeferReason,
        now_ms: u64,
    ) -> Option<DeferredEntry> {
        self.admit(DeferredEntry {
            item,
            modal,
            reason,
            deferred_at_ms: now_ms,
            attempts: 0,
        })
    }

    /// Put back an entry whose retry was still blocked.
    ///
    /// Counts the attempt; returns the entry with [`Eviction::Exhausted`]
    /// once it reaches `max_attempts`, or the overflow victim if the set
    /// filled up meanwhile.
    pub fn requeue(
        &mut self,
        mut entry: DeferredEntry,
        reason: DeferReason,
    ) -> Option<(DeferredEntry, Eviction)> {
        entry.attempts = entry.attempts.saturating_add(1);
        entry.reason = reason;
        if self.policy.max_attempts > 0 && entry.attempts >= self.policy.max_attempts {
            return Some((entry, Eviction::Exhausted));
        }
        self.admit(entry).map(|victim| (victim, Eviction::Overflow))
    }

    /// Put back an entry that was never re-attempted, keeping its attempt
    /// count. Returns the overflow victim, if any.
    pub fn restore(&mut self, entry: DeferredEntry) -> Option<DeferredEntry> {
        self.admit(entry)
    }

    /// Drop entries older than the TTL.
    pub fn evict_expired(&mut self, now_ms: u64) -> Vec<DeferredEntry> {
        let ttl = self.policy.ttl_ms;
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|e| now_ms.saturating_sub(e.deferred_at_ms) > ttl);
        self.entries = kept.into();
        expired
    }

    /// Take every entry, oldest first, for a retry cycle.
    pub fn take_all(&mut self) -> Vec<DeferredEntry> {
        self.entries.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeferredEntry> {
        self.entries.iter()
    }

    fn admit(&mut self, entry: DeferredEntry) -> Option<DeferredEntry> {
        let victim = if self.entries.len() >= self.policy.capacity.max(1) {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        victim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorReport, Payload};
    use chrono::Utc;

    fn net_err(id: u64) -> QueueItem {
        QueueItem::new(
            id,
            Payload::Error(ErrorReport::network(-1009, format!("offline {id}"))),
            false,
            Utc::now(),
        )
    }

    fn policy(ttl_ms: u64, max_attempts: u32, capacity: usize) -> DeferPolicy {
        DeferPolicy {
            ttl_ms,
            max_attempts,
            capacity,
        }
    }

    #[test]
    fn push_and_take_in_order() {
        let mut set = DeferredSet::new(DeferPolicy::default());
        for id in 1..=3 {
            assert!(set.push(net_err(id), false, DeferReason::Unreachable, 0).is_none());
        }
        let ids: Vec<u64> = set.take_all().into_iter().map(|e| e.item.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(set.is_empty());
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut set = DeferredSet::new(policy(1_000, 5, 2));
        set.push(net_err(1), false, DeferReason::Unreachable, 0);
        set.push(net_err(2), false, DeferReason::Unreachable, 0);
        let victim = set
            .push(net_err(3), false, DeferReason::Unreachable, 0)
            .expect("oldest evicted");
        assert_eq!(victim.item.id, 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn expired_entries_removed() {
        let mut set = DeferredSet::new(policy(1_000, 5, 10));
        set.push(net_err(1), false, DeferReason::Unreachable, 0);
        set.push(net_err(2), false, DeferReason::Unreachable, 800);

        // Exactly at the TTL boundary is still kept.
        assert!(set.evict_expired(1_000).is_empty());

        let expired = set.evict_expired(1_500);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].item.id, 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn requeue_counts_attempts_until_exhausted() {
        let mut set = DeferredSet::new(policy(10_000, 3, 10));
        set.push(net_err(1), false, DeferReason::Unreachable, 0);

        for expected in 1..3 {
            let entry = set.take_all().pop().expect("entry");
            assert!(set.requeue(entry, DeferReason::Unreachable).is_none());
            assert_eq!(set.iter().next().map(|e| e.attempts), Some(expected));
        }

        let entry = set.take_all().pop().expect("entry");
        let (dropped, why) = set
            .requeue(entry, DeferReason::Unreachable)
            .expect("exhausted");
        assert_eq!(why, Eviction::Exhausted);
        assert_eq!(dropped.attempts, 3);
        assert!(set.is_empty());
    }

    #[test]
    fn zero_max_attempts_means_unbounded() {
        let mut set = DeferredSet::new(policy(10_000, 0, 10));
        set.push(net_err(1), false, DeferReason::Unreachable, 0);
        for _ in 0..100 {
            let entry = set.take_all().pop().expect("entry");
            assert!(set.requeue(entry, DeferReason::Unreachable).is_none());
        }
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn requeue_keeps_original_timestamp_and_updates_reason() {
        let mut set = DeferredSet::new(DeferPolicy::default());
        set.push(net_err(1), true, DeferReason::ModalBusy, 42);
        let entry = set.take_all().pop().expect("entry");
        set.requeue(entry, DeferReason::Unreachable);
        let entry = set.iter().next().expect("entry");
        assert_eq!(entry.deferred_at_ms, 42);
        assert_eq!(entry.reason, DeferReason::Unreachable);
        assert!(entry.modal);
    }

    #[test]
    fn restore_does_not_count_an_attempt() {
        let mut set = DeferredSet::new(policy(10_000, 1, 10));
        set.push(net_err(1), true, DeferReason::ModalBusy, 0);
        for _ in 0..5 {
            let entry = set.take_all().pop().expect("entry");
            assert!(set.restore(entry).is_none());
        }
        assert_eq!(set.iter().next().map(|e| e.attempts), Some(0));
    }
}
